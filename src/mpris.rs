//! MPRIS2 bridge so desktop media keys and `playerctl` can drive the player.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_io::{Timer, block_on};
use tracing::{debug, warn};
use zbus::object_server::SignalEmitter;
use zbus::{Connection, interface};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::audio::{PlaybackState, RepeatMode, Transport};
use crate::library::PlayableRef;

const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";
const BUS_NAME: &str = "org.mpris.MediaPlayer2.loopify";
const TRACK_PATH_PREFIX: &str = "/org/mpris/MediaPlayer2/track/";
const NOTIFY_POLL: Duration = Duration::from_millis(200);

/// Requests coming in from the bus, handled by the event loop.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlCmd {
    Quit,
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Prev,
    SetShuffle(bool),
    SetLoop(RepeatMode),
    SetVolume(f64),
}

#[derive(Debug, Default, Clone, PartialEq)]
struct SharedState {
    transport: Transport,
    repeat_mode: RepeatMode,
    shuffle: bool,
    volume: f64,
    position_micros: i64,
    title: Option<String>,
    artist: Vec<String>,
    album: Option<String>,
    art_url: Option<String>,
    url: Option<String>,
    length_micros: Option<i64>,
    track_id: Option<OwnedObjectPath>,
}

impl SharedState {
    fn from_playback(state: &PlaybackState) -> Self {
        let track = state.current_track.as_ref();
        Self {
            transport: state.transport,
            repeat_mode: state.repeat_mode,
            shuffle: state.shuffle,
            volume: f64::from(state.volume),
            position_micros: seconds_to_micros(state.position_seconds),
            title: track.map(|t| t.title.clone()),
            artist: track
                .map(|t| t.artist.trim())
                .filter(|a| !a.is_empty())
                .map(|a| vec![a.to_string()])
                .unwrap_or_default(),
            album: track.map(|t| t.album.clone()).filter(|a| !a.is_empty()),
            art_url: track.map(|t| t.cover.clone()).filter(|c| !c.is_empty()),
            url: track.and_then(|t| match &t.playable {
                PlayableRef::Url(url) => Some(url.clone()),
                _ => None,
            }),
            length_micros: track
                .map(|t| seconds_to_micros(t.duration_seconds))
                .filter(|l| *l > 0),
            track_id: track.and_then(|t| track_object_path(&t.id)),
        }
    }

    /// Equal apart from the position, which clients poll rather than watch.
    fn same_signals(&self, other: &Self) -> bool {
        Self {
            position_micros: 0,
            ..self.clone()
        } == Self {
            position_micros: 0,
            ..other.clone()
        }
    }
}

pub struct MprisHandle {
    state: Arc<Mutex<SharedState>>,
    notify: Sender<()>,
}

impl MprisHandle {
    /// Mirror the player state onto the bus, signalling property changes.
    pub fn update(&self, playback: &PlaybackState) {
        let next = SharedState::from_playback(playback);
        let changed = match self.state.lock() {
            Ok(mut s) => {
                let changed = !s.same_signals(&next);
                *s = next;
                changed
            }
            Err(_) => false,
        };
        if changed {
            let _ = self.notify.send(());
        }
    }
}

/// MPRIS `PlaybackStatus` for a transport phase.
pub fn playback_status(transport: Transport) -> &'static str {
    match transport {
        Transport::Playing => "Playing",
        Transport::Paused | Transport::Ready | Transport::Loading => "Paused",
        Transport::Empty | Transport::Ended | Transport::Errored => "Stopped",
    }
}

/// MPRIS `LoopStatus` for a repeat mode.
pub fn loop_status(mode: RepeatMode) -> &'static str {
    match mode {
        RepeatMode::Off => "None",
        RepeatMode::All => "Playlist",
        RepeatMode::One => "Track",
    }
}

pub fn parse_loop_status(status: &str) -> Option<RepeatMode> {
    match status {
        "None" => Some(RepeatMode::Off),
        "Playlist" => Some(RepeatMode::All),
        "Track" => Some(RepeatMode::One),
        _ => None,
    }
}

/// D-Bus object path for a track id. Path elements only allow `[A-Za-z0-9_]`.
pub fn track_object_path(id: &str) -> Option<OwnedObjectPath> {
    let element: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if element.is_empty() {
        return None;
    }
    ObjectPath::try_from(format!("{TRACK_PATH_PREFIX}{element}"))
        .ok()
        .map(OwnedObjectPath::from)
}

fn seconds_to_micros(seconds: f64) -> i64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1_000_000.0) as i64
    } else {
        0
    }
}

fn owned(value: Value<'_>) -> Option<OwnedValue> {
    OwnedValue::try_from(value).ok()
}

struct RootIface {
    tx: Sender<ControlCmd>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {
        // No window to raise.
    }

    fn quit(&self) {
        let _ = self.tx.send(ControlCmd::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "loopify"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec!["file".to_string(), "https".to_string()]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec![]
    }
}

struct PlayerIface {
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
}

impl PlayerIface {
    fn read<T>(&self, f: impl FnOnce(&SharedState) -> T) -> T {
        match self.state.lock() {
            Ok(s) => f(&s),
            Err(e) => f(&e.into_inner()),
        }
    }
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        let _ = self.tx.send(ControlCmd::Next);
    }

    fn previous(&self) {
        let _ = self.tx.send(ControlCmd::Prev);
    }

    fn play(&self) {
        let _ = self.tx.send(ControlCmd::Play);
    }

    fn pause(&self) {
        let _ = self.tx.send(ControlCmd::Pause);
    }

    fn play_pause(&self) {
        let _ = self.tx.send(ControlCmd::PlayPause);
    }

    fn stop(&self) {
        let _ = self.tx.send(ControlCmd::Stop);
    }

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        playback_status(self.read(|s| s.transport))
    }

    #[zbus(property)]
    fn loop_status(&self) -> &str {
        loop_status(self.read(|s| s.repeat_mode))
    }

    #[zbus(property)]
    fn set_loop_status(&mut self, value: String) {
        match parse_loop_status(&value) {
            Some(mode) => {
                let _ = self.tx.send(ControlCmd::SetLoop(mode));
            }
            None => debug!(%value, "ignoring unknown loop status"),
        }
    }

    #[zbus(property)]
    fn shuffle(&self) -> bool {
        self.read(|s| s.shuffle)
    }

    #[zbus(property)]
    fn set_shuffle(&mut self, value: bool) {
        let _ = self.tx.send(ControlCmd::SetShuffle(value));
    }

    #[zbus(property)]
    fn volume(&self) -> f64 {
        self.read(|s| s.volume)
    }

    #[zbus(property)]
    fn set_volume(&mut self, value: f64) {
        let _ = self.tx.send(ControlCmd::SetVolume(value));
    }

    #[zbus(property(emits_changed_signal = "false"))]
    fn position(&self) -> i64 {
        self.read(|s| s.position_micros)
    }

    #[zbus(property)]
    fn rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn minimum_rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn maximum_rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        let s = self.read(SharedState::clone);
        let mut map = HashMap::new();

        let mut put = |key: &str, value: Option<OwnedValue>| {
            if let Some(v) = value {
                map.insert(key.to_string(), v);
            }
        };

        put(
            "mpris:trackid",
            s.track_id
                .as_ref()
                .and_then(|p| owned(Value::from(p.clone().into_inner()))),
        );
        put("xesam:title", s.title.and_then(|t| owned(Value::from(t))));
        if !s.artist.is_empty() {
            put("xesam:artist", owned(Value::from(s.artist)));
        }
        put("xesam:album", s.album.and_then(|a| owned(Value::from(a))));
        put("mpris:artUrl", s.art_url.and_then(|u| owned(Value::from(u))));
        put("xesam:url", s.url.and_then(|u| owned(Value::from(u))));
        put(
            "mpris:length",
            s.length_micros.and_then(|l| owned(Value::from(l))),
        );
        map
    }
}

/// Start the MPRIS service on its own thread. Bus failures are logged and
/// leave the player running without it.
pub fn spawn_mpris(tx: Sender<ControlCmd>) -> MprisHandle {
    let state = Arc::new(Mutex::new(SharedState {
        volume: 1.0,
        ..SharedState::default()
    }));
    let (notify_tx, notify_rx) = mpsc::channel::<()>();

    let state_for_thread = state.clone();
    let spawned = std::thread::Builder::new()
        .name("mpris".to_string())
        .spawn(move || {
            block_on(async move {
                if let Err(e) = serve(tx, state_for_thread, notify_rx).await {
                    warn!("MPRIS unavailable: {e}");
                }
            });
        });
    if let Err(e) = spawned {
        warn!("failed to start MPRIS thread: {e}");
    }

    MprisHandle {
        state,
        notify: notify_tx,
    }
}

async fn serve(
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
    notify: Receiver<()>,
) -> zbus::Result<()> {
    let connection = Connection::session().await?;
    connection.request_name(BUS_NAME).await?;

    let object_server = connection.object_server();
    object_server
        .at(OBJECT_PATH, RootIface { tx: tx.clone() })
        .await?;
    object_server
        .at(OBJECT_PATH, PlayerIface { tx, state })
        .await?;
    debug!(bus = BUS_NAME, "MPRIS service registered");

    let player = object_server
        .interface::<_, PlayerIface>(OBJECT_PATH)
        .await?;

    loop {
        Timer::after(NOTIFY_POLL).await;

        let mut dirty = false;
        loop {
            match notify.try_recv() {
                Ok(()) => dirty = true,
                Err(mpsc::TryRecvError::Empty) => break,
                // Handle dropped: the player is shutting down.
                Err(mpsc::TryRecvError::Disconnected) => return Ok(()),
            }
        }
        if dirty {
            let iface = player.get().await;
            emit_changes(&iface, player.signal_emitter()).await;
        }
    }
}

async fn emit_changes(iface: &PlayerIface, emitter: &SignalEmitter<'_>) {
    let results = [
        iface.playback_status_changed(emitter).await,
        iface.metadata_changed(emitter).await,
        iface.loop_status_changed(emitter).await,
        iface.shuffle_changed(emitter).await,
        iface.volume_changed(emitter).await,
    ];
    for e in results.into_iter().filter_map(Result::err) {
        debug!("MPRIS property signal failed: {e}");
    }
}
