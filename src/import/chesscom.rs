// src/import/chesscom.rs

use crate::constants::{ARCHIVE_LIST_TIMEOUT_SECS, ARCHIVE_MONTH_TIMEOUT_SECS, USER_AGENT};
use crate::game::GameRecord;
use crate::import::{build_record, parse_pgn, ImportError, ImportSummary};
use crate::worker::FetchPool;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Deserialize)]
struct ArchivesResponse {
    #[serde(default)]
    archives: Vec<String>,
}

#[derive(Deserialize)]
struct MonthResponse {
    #[serde(default)]
    games: Vec<RawMonthlyGame>,
}

/// One game as delivered by a monthly archive page. Only the PGN payload and
/// the site's own time classification matter here.
#[derive(Clone, Deserialize)]
pub struct RawMonthlyGame {
    #[serde(default)]
    pub pgn: Option<String>,
    #[serde(default)]
    pub time_class: Option<String>,
}

fn client() -> Result<reqwest::blocking::Client, ImportError> {
    reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ImportError::Network(e.to_string()))
}

fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::blocking::Client,
    url: &str,
    timeout: Duration,
) -> Result<T, ImportError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .map_err(|e| ImportError::Network(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ImportError::Http(status.as_u16()));
    }
    response
        .json()
        .map_err(|e| ImportError::Network(e.to_string()))
}

/// Fetch every monthly archive for a chess.com user, newest month first.
///
/// Months are fetched through a bounded worker pool over indexed work items
/// and flattened strictly in index order, so the merged list is independent
/// of completion order. Within one month the site returns oldest-first, so
/// each page is reversed before flattening.
pub fn fetch_all_archives(username: &str) -> Result<Vec<RawMonthlyGame>, ImportError> {
    let client = client()?;
    let archives_url = format!("https://api.chess.com/pub/player/{username}/games/archives");
    let archives: ArchivesResponse = get_json(
        &client,
        &archives_url,
        Duration::from_secs(ARCHIVE_LIST_TIMEOUT_SECS),
    )?;
    if archives.archives.is_empty() {
        return Ok(Vec::new());
    }

    let urls: Vec<String> = archives.archives.into_iter().rev().collect();
    let total = urls.len();
    info!(months = total, "fetching chess.com archives");

    let pool: FetchPool<Result<Vec<RawMonthlyGame>, ImportError>> = FetchPool::new(total);
    for (index, url) in urls.into_iter().enumerate() {
        let client = client.clone();
        pool.submit(
            index,
            Box::new(move || {
                let month: MonthResponse = get_json(
                    &client,
                    &url,
                    Duration::from_secs(ARCHIVE_MONTH_TIMEOUT_SECS),
                )?;
                Ok(month.games.into_iter().rev().collect())
            }),
        );
    }

    let mut all_games = Vec::new();
    for month in pool.collect(total) {
        all_games.extend(month?);
    }
    Ok(all_games)
}

/// Import all of a chess.com user's games into the store at `out_path`.
pub fn import_games(username: &str, out_path: &Path) -> Result<ImportSummary, ImportError> {
    let username = username.trim();
    let raw_games = fetch_all_archives(username)?;
    if raw_games.is_empty() {
        info!(username, "no games found");
        return crate::import::merge_into_store(Vec::new(), out_path);
    }

    let mut parsed: Vec<GameRecord> = Vec::with_capacity(raw_games.len());
    let mut skipped = 0usize;
    for raw in &raw_games {
        let pgn = match raw.pgn.as_deref() {
            Some(pgn) if !pgn.is_empty() => pgn,
            _ => continue,
        };
        match parse_pgn(pgn) {
            Some(game) => parsed.push(build_record(&game, username, raw.time_class.as_deref())),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, "unparseable PGN payloads skipped");
    }

    crate::import::merge_into_store(parsed, out_path)
}
