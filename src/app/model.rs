//! Application model: the track list, selection, filter and the latest
//! playback snapshot used by the UI and runtime.

use crate::audio::PlaybackState;
use crate::library::Track;

/// Lists longer than this get precomputed lowercase titles for filtering.
const LOWER_TITLES_THRESHOLD: usize = 100;

/// The main application model.
pub struct App {
    pub tracks: Vec<Track>,
    pub selected: usize,
    /// Last state published by the playback engine.
    pub playback: PlaybackState,

    lower_titles: Option<Vec<String>>,

    pub follow_playback: bool,
    pub filter_mode: bool,
    pub filter_query: String,
    /// Where the list came from, e.g. `"library + popular"`.
    pub source_label: String,
    /// One-line message shown in the status bar (import results and such).
    pub status: Option<String>,
    pub metadata_window: bool,
}

impl App {
    /// Create a new `App` with the provided list of `tracks`.
    pub fn new(tracks: Vec<Track>) -> Self {
        let lower_titles = (tracks.len() > LOWER_TITLES_THRESHOLD).then(|| {
            tracks
                .iter()
                .map(|t| t.display().to_ascii_lowercase())
                .collect()
        });

        Self {
            tracks,
            selected: 0,
            playback: PlaybackState::default(),
            lower_titles,
            follow_playback: true,
            filter_mode: false,
            filter_query: String::new(),
            source_label: String::new(),
            status: None,
            metadata_window: false,
        }
    }

    pub fn toggle_metadata_window(&mut self) {
        self.metadata_window = !self.metadata_window;
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    /// Take a new playback snapshot. While following playback the cursor
    /// jumps to the current track when it is visible.
    pub fn set_playback(&mut self, state: PlaybackState) {
        self.playback = state;
        if !self.follow_playback {
            return;
        }
        if let Some(idx) = self.now_playing_index() {
            if self.display_indices().contains(&idx) {
                self.selected = idx;
            }
        }
    }

    /// Index in `tracks` of the track the engine currently holds.
    pub fn now_playing_index(&self) -> Option<usize> {
        let current = self.playback.current_track.as_ref()?;
        self.tracks.iter().position(|t| t.id == current.id)
    }

    pub fn follow_playback_on(&mut self) {
        self.follow_playback = true;
    }

    pub fn follow_playback_off(&mut self) {
        self.follow_playback = false;
    }

    /// Track indices in display order, with the filter applied.
    pub fn display_indices(&self) -> Vec<usize> {
        let base = 0..self.tracks.len();

        let query = self.filter_query.trim();
        if query.is_empty() {
            return base.collect();
        }
        match self.lower_titles.as_deref() {
            Some(lower_titles) => {
                let query_lower = query.to_ascii_lowercase();
                base.filter(|&i| {
                    Self::fuzzy_match_positions_lower(&lower_titles[i], &query_lower).is_some()
                })
                .collect()
            }
            None => base
                .filter(|&i| Self::fuzzy_match_positions(&self.tracks[i].display(), query).is_some())
                .collect(),
        }
    }

    pub fn uses_lower_titles(&self) -> bool {
        self.lower_titles.is_some()
    }

    /// Fuzzy-match `query_lower` against a specific track by index.
    pub fn fuzzy_match_positions_for_track_lower(
        &self,
        track_index: usize,
        query_lower: &str,
    ) -> Option<Vec<usize>> {
        if query_lower.is_empty() {
            return Some(Vec::new());
        }

        match self.lower_titles.as_deref() {
            Some(lower_titles) => {
                Self::fuzzy_match_positions_lower(&lower_titles[track_index], query_lower)
            }
            None => Self::fuzzy_match_positions(&self.tracks[track_index].display(), query_lower),
        }
    }

    /// The next visible index after `current`, wrapping to the first.
    pub fn next_in_view_from(&self, current: usize) -> Option<usize> {
        let display = self.display_indices();
        if display.is_empty() {
            return None;
        }

        match display.iter().position(|&i| i == current) {
            Some(p) => Some(display[(p + 1) % display.len()]),
            None => Some(display[0]),
        }
    }

    /// The previous visible index before `current`, wrapping to the last.
    pub fn prev_in_view_from(&self, current: usize) -> Option<usize> {
        let display = self.display_indices();
        if display.is_empty() {
            return None;
        }

        match display.iter().position(|&i| i == current) {
            Some(0) | None => Some(display[display.len() - 1]),
            Some(p) => Some(display[p - 1]),
        }
    }

    pub fn set_selected(&mut self, idx: usize) {
        self.selected = idx;
        self.ensure_selected_visible();
    }

    pub fn has_tracks(&self) -> bool {
        !self.tracks.is_empty()
    }

    /// Drop the track with `id` from the list, keeping the cursor in place.
    pub fn remove_track(&mut self, id: &str) -> Option<Track> {
        let idx = self.tracks.iter().position(|t| t.id == id)?;
        let removed = self.tracks.remove(idx);
        if let Some(lower) = self.lower_titles.as_mut() {
            lower.remove(idx);
        }
        let selected = if self.selected > idx {
            self.selected - 1
        } else {
            self.selected
        };
        self.set_selected(selected.min(self.tracks.len().saturating_sub(1)));
        Some(removed)
    }

    pub fn selected_track(&self) -> Option<&Track> {
        self.display_indices()
            .contains(&self.selected)
            .then(|| self.tracks.get(self.selected))
            .flatten()
    }

    /// The visible tracks as a play queue, starting at the selection.
    pub fn queue_from_selection(&self) -> Option<(Vec<Track>, usize)> {
        let display = self.display_indices();
        let start = display.iter().position(|&i| i == self.selected)?;
        let tracks = display.iter().map(|&i| self.tracks[i].clone()).collect();
        Some((tracks, start))
    }

    /// Character positions in `title` matching `query` as a subsequence
    /// (ASCII case-insensitive), or `None` if it does not match.
    pub fn fuzzy_match_positions(title: &str, query: &str) -> Option<Vec<usize>> {
        subsequence_positions(title, query, |c| c.to_ascii_lowercase())
    }

    fn fuzzy_match_positions_lower(title_lower: &str, query_lower: &str) -> Option<Vec<usize>> {
        subsequence_positions(title_lower, query_lower, |c| c)
    }

    pub fn enter_filter_mode(&mut self) {
        self.filter_mode = true;
        self.follow_playback_off();
        self.ensure_selected_visible();
    }

    pub fn exit_filter_mode(&mut self) {
        self.filter_mode = false;
    }

    /// Drop the filter and leave filter mode.
    pub fn clear_filter(&mut self) {
        self.filter_query.clear();
        self.filter_mode = false;
        self.ensure_selected_visible();
    }

    pub fn push_filter_char(&mut self, c: char) {
        self.filter_query.push(c);
        self.ensure_selected_visible();
    }

    pub fn pop_filter_char(&mut self) {
        self.filter_query.pop();
        self.ensure_selected_visible();
    }

    /// Keep `selected` inside the filtered view, else move to its first track.
    fn ensure_selected_visible(&mut self) {
        let display = self.display_indices();
        match display.first() {
            None => self.selected = 0,
            Some(&first) if !display.contains(&self.selected) => self.selected = first,
            Some(_) => {}
        }
    }

    pub fn next(&mut self) {
        if let Some(next) = self.next_in_view_from(self.selected) {
            self.selected = next;
        }
    }

    pub fn prev(&mut self) {
        if let Some(prev) = self.prev_in_view_from(self.selected) {
            self.selected = prev;
        }
    }

    pub fn select_first(&mut self) {
        if let Some(&first) = self.display_indices().first() {
            self.selected = first;
        }
    }

    pub fn select_last(&mut self) {
        if let Some(&last) = self.display_indices().last() {
            self.selected = last;
        }
    }
}

/// Greedy left-to-right subsequence match after folding both sides.
fn subsequence_positions(
    haystack: &str,
    needle: &str,
    fold: impl Fn(char) -> char,
) -> Option<Vec<usize>> {
    let mut hay = haystack.chars().map(&fold).enumerate();
    needle
        .chars()
        .map(&fold)
        .map(|nc| hay.find(|&(_, hc)| hc == nc).map(|(i, _)| i))
        .collect()
}
