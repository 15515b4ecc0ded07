//! One-shot subcommands: library maintenance and catalog browsing.

use std::error::Error;
use std::path::PathBuf;

use tracing::info;

use crate::catalog::{Album, CatalogClient, JamendoClient};
use crate::cli::Command;
use crate::config::{Settings, resolve_config_path};
use crate::library::{
    Importer, LibrarySummary, LocalTrackRecord, SessionHandles, Track, format_duration,
    format_file_size, format_total_time,
};

use super::startup;

pub fn run(command: Command, settings: &Settings) -> Result<(), Box<dyn Error>> {
    match command {
        // The player is started by the caller.
        Command::Play(_) => Ok(()),
        Command::Import { files } => import(&files, settings),
        Command::Discover { dir } => import(&[dir], settings),
        Command::List => list(settings),
        Command::Remove { id } => remove(&id, settings),
        Command::Search { query, limit } => {
            let client = JamendoClient::new(&settings.catalog)?;
            let tracks = client.search_tracks(&query, limit.unwrap_or(settings.catalog.limit))?;
            print_tracks(&tracks);
            Ok(())
        }
        Command::Popular { genre, limit } => {
            let client = JamendoClient::new(&settings.catalog)?;
            let limit = limit.unwrap_or(settings.catalog.limit);
            let tracks = match genre {
                Some(genre) => client.tracks_by_genre(&genre, limit)?,
                None => client.popular_tracks(limit)?,
            };
            print_tracks(&tracks);
            Ok(())
        }
        Command::Albums { limit } => {
            let client = JamendoClient::new(&settings.catalog)?;
            let albums = client.featured_albums(limit.unwrap_or(settings.catalog.limit))?;
            for album in &albums {
                println!("{}", album_line(album));
            }
            Ok(())
        }
        Command::Config => {
            match resolve_config_path() {
                Some(path) => println!("# config file: {}", path.display()),
                None => println!("# config file: none"),
            }
            print!("{}", toml::to_string_pretty(settings)?);
            Ok(())
        }
    }
}

fn import(paths: &[PathBuf], settings: &Settings) -> Result<(), Box<dyn Error>> {
    let mut store = startup::open_store(settings);
    let importer = Importer::new(settings.library.extensions.clone(), SessionHandles::new());

    let report = startup::import_paths(&importer, &settings.library, paths);
    startup::persist(&mut store, &report)?;

    for track in report.tracks() {
        println!("{}", track_line(track));
    }
    println!("{}", startup::import_summary(&report));
    info!(path = %store.path().display(), "library updated");
    Ok(())
}

fn list(settings: &Settings) -> Result<(), Box<dyn Error>> {
    let store = startup::open_store(settings);
    for record in store.records() {
        println!("{}", record_line(record));
    }
    println!("{}", summary_line(&store.summary()));
    Ok(())
}

fn remove(id: &str, settings: &Settings) -> Result<(), Box<dyn Error>> {
    let mut library = startup::LibrarySession::open(settings, SessionHandles::new());
    if library.remove(id)? {
        println!("removed {id}");
        Ok(())
    } else {
        Err(format!("no library track with id {id}").into())
    }
}

fn print_tracks(tracks: &[Track]) {
    if tracks.is_empty() {
        println!("no tracks found");
    }
    for track in tracks {
        println!("{}", track_line(track));
    }
}

pub fn track_line(track: &Track) -> String {
    format!(
        "{:<12} {} ({})",
        track.id,
        track.display(),
        format_duration(track.duration_seconds)
    )
}

pub fn record_line(record: &LocalTrackRecord) -> String {
    format!(
        "{:<24} {} - {} ({}, {})",
        record.id,
        record.artist,
        record.title,
        format_duration(record.duration_seconds),
        format_file_size(record.size_bytes)
    )
}

pub fn summary_line(summary: &LibrarySummary) -> String {
    format!(
        "{} track{} • {} • {}",
        summary.count,
        if summary.count == 1 { "" } else { "s" },
        format_total_time(summary.total_seconds),
        format_file_size(summary.total_bytes)
    )
}

pub fn album_line(album: &Album) -> String {
    let year = album
        .year
        .map(|y| format!(" ({y})"))
        .unwrap_or_default();
    format!(
        "{:<8} {} - {}{} • {} tracks",
        album.id, album.artist, album.title, year, album.track_count
    )
}
