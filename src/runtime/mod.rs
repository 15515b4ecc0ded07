use std::sync::mpsc;

use clap::Parser;
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::app::App;
use crate::audio::AudioPlayer;
use crate::catalog::{CatalogClient, JamendoClient};
use crate::cli::{Cli, Command, PlayArgs};
use crate::config::Settings;
use crate::library::{Importer, SessionHandles};
use crate::logging;
use crate::mpris::ControlCmd;

mod commands;
mod event_loop;
mod settings;
mod startup;

#[cfg(test)]
mod tests;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let command = Cli::parse().command();
    let (settings, config_warning) = settings::load_settings();

    match command {
        Command::Play(args) => {
            // The terminal belongs to the UI, so logs go to a file.
            let log_path = settings.log_file();
            if let Err(e) = logging::init_file(&settings.logging, &log_path) {
                eprintln!("loopify: cannot open log file {}: {e}", log_path.display());
            }
            if let Some(msg) = config_warning {
                warn!("{msg}");
            }
            play(args, &settings)
        }
        other => {
            logging::init_stderr(&settings.logging);
            if let Some(msg) = config_warning {
                warn!("{msg}");
            }
            commands::run(other, &settings)
        }
    }
}

fn play(args: PlayArgs, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let mut library = startup::LibrarySession::open(settings, SessionHandles::new());
    let importer = Importer::new(settings.library.extensions.clone(), library.handles.clone());

    let report = startup::import_paths(&importer, &settings.library, &args.paths);
    // Unsaved imports still play this session.
    let _ = startup::persist(&mut library.store, &report);

    let catalog = if args.wants_catalog() {
        match JamendoClient::new(&settings.catalog) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("catalog unavailable: {e}");
                None
            }
        }
    } else {
        None
    };
    let initial = startup::assemble(
        &library.store,
        &library.handles,
        &report,
        &args,
        catalog.as_ref().map(|c| c as &dyn CatalogClient),
        settings.catalog.limit,
    );

    let audio_player = AudioPlayer::new(library.handles.clone(), settings);
    let mut app = App::new(initial.tracks);
    app.source_label = initial.label;
    app.status = initial.status;
    app.set_playback(audio_player.snapshot());
    let updates = audio_player.subscribe();

    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    let mpris = crate::mpris::spawn_mpris(control_tx.clone());
    mpris.update(&app.playback);

    info!(tracks = app.tracks.len(), "starting player");

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result: Result<(), Box<dyn std::error::Error>> = (|| {
        let mut state = event_loop::EventLoopState::default();
        event_loop::run(
            &mut terminal,
            settings,
            &mut app,
            &mut library,
            &audio_player,
            updates.as_ref(),
            &mpris,
            &control_tx,
            &control_rx,
            &mut state,
        )
    })();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    run_result
}
