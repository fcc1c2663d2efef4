// src/main.rs

mod cache;
mod constants;
mod eval;
mod explore;
mod filter;
mod game;
mod import;
mod server;
mod storage;
mod top_positions;
mod trie;
mod worker;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::constants::{
    DEFAULT_EVAL_CACHE_FILE, DEFAULT_EVAL_CACHE_TTL_SECS, DEFAULT_FRONTEND_DIR, DEFAULT_GAMES_DIR,
    DEFAULT_GAMES_FILE,
};
use crate::eval::{EvalCache, LichessEvalProvider};
use crate::import::lichess::LichessOptions;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server for the move explorer
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = 8000)]
        port: u16,

        /// Directory holding the per-player game stores
        #[arg(long, default_value = DEFAULT_GAMES_DIR)]
        games_dir: PathBuf,

        /// Explicit path to a single-player legacy store
        #[arg(long)]
        legacy_games: Option<PathBuf>,

        /// Directory with the static frontend; omit to serve the API only
        #[arg(long)]
        frontend: Option<PathBuf>,

        /// Do not serve static files even if the frontend directory exists
        #[arg(long)]
        no_frontend: bool,
    },

    /// Download a player's games from chess.com or lichess
    Import {
        /// Account name on the source site
        username: String,

        /// Store the games under this player name (defaults to the username)
        #[arg(long)]
        player: Option<String>,

        /// Game source: "chess.com" or "lichess"
        #[arg(long, default_value = "chess.com")]
        source: String,

        /// Directory holding the per-player game stores
        #[arg(long, default_value = DEFAULT_GAMES_DIR)]
        games_dir: PathBuf,

        /// Stop after this many games (lichess only)
        #[arg(long)]
        max_games: Option<u32>,

        /// Only rated games (lichess only)
        #[arg(long)]
        rated: bool,

        /// Restrict to one perf type, e.g. "blitz" (lichess only)
        #[arg(long)]
        perf_type: Option<String>,
    },

    /// Import games for a player from local PGN files or directories
    ImportPgn {
        /// Player name the games belong to
        username: String,

        /// PGN files or directories to scan
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory holding the per-player game stores
        #[arg(long, default_value = DEFAULT_GAMES_DIR)]
        games_dir: PathBuf,

        /// Subdirectory (source label) to store the games under
        #[arg(long)]
        source: Option<String>,
    },

    /// Walk a player's move trie interactively from the terminal
    Explore {
        /// Player whose store to explore; omit when using --input
        player: Option<String>,

        /// Directory holding the per-player game stores
        #[arg(long, default_value = DEFAULT_GAMES_DIR)]
        games_dir: PathBuf,

        /// Explicit games file to load instead of a player store
        #[arg(long)]
        input: Option<PathBuf>,

        /// How many continuations to list per position
        #[arg(long, default_value_t = 20)]
        top: usize,

        /// Only games played as this color
        #[arg(long, value_parser = parse_color)]
        color: Option<game::Color>,

        /// Only games with this result, e.g. "1-0"
        #[arg(long)]
        result: Option<String>,

        /// Only games against this opponent
        #[arg(long)]
        opponent: Option<String>,

        /// Only games in this time-control bucket
        #[arg(long, value_parser = parse_time_control)]
        time_control: Option<game::TimeControl>,

        /// Only games with this exact raw time-control string
        #[arg(long)]
        time_control_raw: Option<String>,

        /// Earliest game date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        date_from: Option<chrono::NaiveDate>,

        /// Latest game date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        date_to: Option<chrono::NaiveDate>,

        #[arg(long)]
        min_my_rating: Option<u32>,

        #[arg(long)]
        max_my_rating: Option<u32>,

        #[arg(long)]
        min_opponent_rating: Option<u32>,

        #[arg(long)]
        max_opponent_rating: Option<u32>,

        /// First ply of the move window, inclusive
        #[arg(long)]
        moves_start: Option<usize>,

        /// End of the move window, exclusive
        #[arg(long)]
        moves_end: Option<usize>,
    },

    /// List the players with a game store on disk
    Players {
        /// Directory holding the per-player game stores
        #[arg(long, default_value = DEFAULT_GAMES_DIR)]
        games_dir: PathBuf,
    },

    /// Rank the positions a player reaches most often at a fixed depth
    TopPositions {
        /// Player whose store to analyze
        player: String,

        /// Directory holding the per-player game stores
        #[arg(long, default_value = DEFAULT_GAMES_DIR)]
        games_dir: PathBuf,

        /// Number of plies (half-moves) to replay before counting
        #[arg(long, default_value_t = 10)]
        plies: usize,

        /// How many positions to report
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Only games played as this color
        #[arg(long, value_parser = parse_color)]
        color: Option<game::Color>,

        /// Only games in this time-control bucket
        #[arg(long, value_parser = parse_time_control)]
        time_control: Option<game::TimeControl>,

        /// Skip cloud evaluation lookups
        #[arg(long)]
        skip_eval: bool,

        /// Path of the evaluation cache file
        #[arg(long, default_value = DEFAULT_EVAL_CACHE_FILE)]
        eval_cache: PathBuf,

        /// Evaluation cache lifetime in seconds
        #[arg(long, default_value_t = DEFAULT_EVAL_CACHE_TTL_SECS)]
        eval_ttl: u64,
    },
}

fn parse_color(s: &str) -> Result<game::Color, String> {
    s.parse().map_err(|_| format!("unknown color: {s}"))
}

fn parse_time_control(s: &str) -> Result<game::TimeControl, String> {
    s.parse().map_err(|_| format!("unknown time control: {s}"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    match args.command {
        Command::Serve {
            port,
            games_dir,
            legacy_games,
            frontend,
            no_frontend,
        } => {
            // A bare games.json next to the binary keeps working as the
            // single-player store from before multi-player directories.
            let legacy_path = legacy_games.or_else(|| {
                let default = PathBuf::from(DEFAULT_GAMES_FILE);
                default.is_file().then_some(default)
            });
            let frontend_dir = if no_frontend {
                None
            } else {
                frontend.or_else(|| {
                    let default = PathBuf::from(DEFAULT_FRONTEND_DIR);
                    default.is_dir().then_some(default)
                })
            };
            actix_rt::System::new().block_on(server::start_server(
                port,
                games_dir,
                legacy_path,
                frontend_dir,
            ))?;
        }

        Command::Import {
            username,
            player,
            source,
            games_dir,
            max_games,
            rated,
            perf_type,
        } => {
            let player = player.unwrap_or_else(|| username.clone());
            let out_path = storage::path_for_player(&player, &games_dir, Some(&source));
            let summary = match source.as_str() {
                "chess.com" => import::chesscom::import_games(&username, &out_path)?,
                "lichess" => {
                    let options = LichessOptions {
                        max_games,
                        rated: rated.then_some(true),
                        perf_type,
                    };
                    import::lichess::import_games(&username, &out_path, &options)?
                }
                other => return Err(format!("unknown source: {other}").into()),
            };
            info!(
                imported = summary.imported,
                total = summary.total,
                path = %out_path.display(),
                "import finished"
            );
            println!(
                "Imported {} new games ({} total) into {}",
                summary.imported,
                summary.total,
                out_path.display()
            );
        }

        Command::ImportPgn {
            username,
            inputs,
            games_dir,
            source,
        } => {
            let out_path = storage::path_for_player(&username, &games_dir, source.as_deref());
            let summary = import::pgn::import_files(&username, &inputs, &out_path)?;
            println!(
                "Imported {} new games ({} total) into {}",
                summary.imported,
                summary.total,
                out_path.display()
            );
        }

        Command::Explore {
            player,
            games_dir,
            input,
            top,
            color,
            result,
            opponent,
            time_control,
            time_control_raw,
            date_from,
            date_to,
            min_my_rating,
            max_my_rating,
            min_opponent_rating,
            max_opponent_rating,
            moves_start,
            moves_end,
        } => {
            let path = match (input, player) {
                (Some(path), _) => path,
                (None, Some(player)) => storage::find_player_path(&player, &games_dir)
                    .ok_or_else(|| format!("no game store found for player: {player}"))?,
                (None, None) => return Err("give a player name or --input".into()),
            };
            let games = storage::load_games(&path)?;
            let criteria = filter::FilterCriteria {
                color,
                result,
                opponent,
                time_control,
                time_control_raw,
                date_from,
                date_to,
                min_my_rating,
                max_my_rating,
                min_opponent_rating,
                max_opponent_rating,
                moves_start,
                moves_end,
            };
            let stdin = std::io::stdin();
            explore::run(
                &games,
                &criteria,
                top,
                &mut stdin.lock(),
                &mut std::io::stdout(),
            )?;
        }

        Command::Players { games_dir } => {
            let players = storage::available_players(&games_dir);
            if players.is_empty() {
                println!("No player stores found in {}", games_dir.display());
            }
            for player in players {
                println!("{} ({})", player.name, player.source);
            }
        }

        Command::TopPositions {
            player,
            games_dir,
            plies,
            limit,
            color,
            time_control,
            skip_eval,
            eval_cache,
            eval_ttl,
        } => {
            let path = storage::find_player_path(&player, &games_dir)
                .ok_or_else(|| format!("no game store found for player: {player}"))?;
            let criteria = filter::FilterCriteria {
                color,
                time_control,
                ..filter::FilterCriteria::default()
            };
            let games = filter::filter_games(&storage::load_games(&path)?, &criteria);
            info!(games = games.len(), plies, "ranking positions");

            let positions = top_positions::most_common_positions(&games, plies, limit);
            if positions.is_empty() {
                println!("No games reach ply {plies}");
                return Ok(());
            }

            let cache = if skip_eval {
                None
            } else {
                let provider = LichessEvalProvider::new()?;
                Some(EvalCache::new(
                    eval_cache,
                    Duration::from_secs(eval_ttl),
                    Box::new(provider),
                ))
            };
            print!(
                "{}",
                top_positions::render_report(&positions, cache.as_ref())
            );
        }
    }

    Ok(())
}
