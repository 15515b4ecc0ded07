//! Command-line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "loopify")]
#[command(about = "Terminal music player for local files and the Jamendo catalog", long_about = None)]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
    /// Player options when no subcommand is given.
    #[command(flatten)]
    pub play: PlayArgs,
}

impl Cli {
    /// The subcommand to run; without one, `loopify [PATHS...]` opens the player.
    pub fn command(self) -> Command {
        self.command.unwrap_or(Command::Play(self.play))
    }
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Open the player (default)
    Play(PlayArgs),
    /// Import audio files into the library
    Import {
        /// Files to import
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Scan a music directory and import every audio file in it
    Discover {
        /// Directory to scan
        dir: PathBuf,
    },
    /// List the tracks in the library
    List,
    /// Remove a track from the library
    Remove {
        /// Track id, as shown by `list`
        id: String,
    },
    /// Search the catalog
    Search {
        query: String,
        /// Maximum number of results
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },
    /// Show popular catalog tracks
    Popular {
        /// Restrict to a genre tag, e.g. `jazz`
        #[arg(long, short = 'g')]
        genre: Option<String>,
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },
    /// Show featured catalog albums
    Albums {
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug, Default, PartialEq)]
pub struct PlayArgs {
    /// Files or directories to import and play
    pub paths: Vec<PathBuf>,
    /// Add popular catalog tracks to the list
    #[arg(long, short = 'c')]
    pub catalog: bool,
    /// Add catalog tracks matching a query
    #[arg(long, short = 's', value_name = "QUERY")]
    pub search: Option<String>,
    /// Add catalog tracks for a genre tag
    #[arg(long, short = 'g')]
    pub genre: Option<String>,
    /// Leave out library tracks from earlier sessions
    #[arg(long)]
    pub no_library: bool,
}

impl PlayArgs {
    pub fn wants_catalog(&self) -> bool {
        self.catalog || self.search.is_some() || self.genre.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(args).unwrap().command()
    }

    #[test]
    fn no_subcommand_opens_the_player() {
        assert_eq!(parse(&["loopify"]), Command::Play(PlayArgs::default()));
    }

    #[test]
    fn play_takes_paths_and_catalog_flags() {
        let Command::Play(args) = parse(&["loopify", "play", "a.mp3", "music/", "--search", "lofi"])
        else {
            panic!("expected play");
        };
        assert_eq!(args.paths, vec![PathBuf::from("a.mp3"), PathBuf::from("music/")]);
        assert_eq!(args.search.as_deref(), Some("lofi"));
        assert!(args.wants_catalog());
        assert!(!PlayArgs::default().wants_catalog());
    }

    #[test]
    fn bare_paths_open_the_player() {
        let Command::Play(args) = parse(&["loopify", "song.mp3", "--catalog"]) else {
            panic!("expected play");
        };
        assert_eq!(args.paths, vec![PathBuf::from("song.mp3")]);
        assert!(args.catalog);
    }

    #[test]
    fn import_requires_files() {
        assert!(Cli::try_parse_from(["loopify", "import"]).is_err());
        assert_eq!(
            parse(&["loopify", "import", "x.wav"]),
            Command::Import {
                files: vec![PathBuf::from("x.wav")]
            }
        );
    }

    #[test]
    fn catalog_commands_take_limits() {
        assert_eq!(
            parse(&["loopify", "popular", "-g", "jazz", "-n", "3"]),
            Command::Popular {
                genre: Some("jazz".to_string()),
                limit: Some(3)
            }
        );
        assert_eq!(
            parse(&["loopify", "search", "night drive"]),
            Command::Search {
                query: "night drive".to_string(),
                limit: None
            }
        );
    }
}
