// src/import/lichess.rs

use crate::constants::{LICHESS_STREAM_TIMEOUT_SECS, USER_AGENT};
use crate::game::GameRecord;
use crate::import::{build_record, GameVisitor, ImportError, ImportSummary};
use pgn_reader::Reader;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Optional narrowing parameters for the Lichess export endpoint.
#[derive(Clone, Debug, Default)]
pub struct LichessOptions {
    pub max_games: Option<u32>,
    pub rated: Option<bool>,
    pub perf_type: Option<String>,
}

/// Import a Lichess user's games into the store at `out_path`.
///
/// The export endpoint streams PGN; games are parsed incrementally off the
/// response body instead of buffering the whole export.
pub fn import_games(
    username: &str,
    out_path: &Path,
    options: &LichessOptions,
) -> Result<ImportSummary, ImportError> {
    let username = username.trim();
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(LICHESS_STREAM_TIMEOUT_SECS))
        // The stream can legitimately run for minutes on a large export;
        // only the connection itself is bounded.
        .timeout(None)
        .build()
        .map_err(|e| ImportError::Network(e.to_string()))?;

    let mut query: Vec<(&str, String)> = vec![
        ("pgnInJson", "false".to_string()),
        ("clocks", "false".to_string()),
        ("evals", "false".to_string()),
        ("opening", "false".to_string()),
        ("literate", "false".to_string()),
    ];
    if let Some(max) = options.max_games {
        query.push(("max", max.to_string()));
    }
    if let Some(rated) = options.rated {
        query.push(("rated", rated.to_string()));
    }
    if let Some(perf) = &options.perf_type {
        query.push(("perfType", perf.clone()));
    }

    let url = format!("https://lichess.org/api/games/user/{username}");
    info!(username, "streaming games from lichess");
    let response = client
        .get(&url)
        .header("Accept", "application/x-chess-pgn")
        .query(&query)
        .send()
        .map_err(|e| ImportError::Network(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ImportError::Http(status.as_u16()));
    }

    let mut reader = Reader::new(std::io::BufReader::new(response));
    let mut parsed: Vec<GameRecord> = Vec::new();
    let mut errors = 0usize;
    loop {
        match reader.read_game(&mut GameVisitor) {
            Ok(Some(raw)) => parsed.push(build_record(&raw, username, None)),
            Ok(None) => break,
            Err(err) => {
                // One broken game should not abort the rest of the stream,
                // but an I/O error mid-stream is not recoverable either way.
                warn!(%err, "aborting PGN stream");
                errors += 1;
                break;
            }
        }
    }
    info!(games = parsed.len(), errors, "lichess stream finished");

    crate::import::merge_into_store(parsed, out_path)
}
