// src/import/mod.rs

pub mod chesscom;
pub mod lichess;
pub mod pgn;

use crate::game::{Color, GameRecord, TimeControl};
use crate::storage::{self, StorageError};
use chrono::NaiveDate;
use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};
use serde::Serialize;
use std::ops::ControlFlow;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("http status {0}")]
    Http(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of one import run, as reported to the CLI and the HTTP layer.
#[derive(Clone, Debug, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub total: usize,
}

/// Collects the tags and mainline SAN moves of a single PGN game.
///
/// The visitor itself knows nothing about the tracked player; `end_game`
/// hands back the raw pieces and `build_record` turns them into a
/// `GameRecord` from the player's perspective.
#[derive(Default)]
pub struct GameVisitor;

/// Tags plus mainline moves of one parsed game.
pub struct RawPgnGame {
    pub tags: Vec<(String, String)>,
    pub moves: Vec<String>,
}

impl RawPgnGame {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the given username played either side.
    pub fn involves(&self, username: &str) -> bool {
        let matches = |side: &str| {
            self.tag(side)
                .map(|name| name.eq_ignore_ascii_case(username))
                .unwrap_or(false)
        };
        matches("White") || matches("Black")
    }
}

impl Visitor for GameVisitor {
    type Tags = Vec<(String, String)>;
    type Movetext = RawPgnGame;
    type Output = RawPgnGame;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(Vec::with_capacity(16))
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        key: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        tags.push((
            String::from_utf8_lossy(key).into_owned(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        ));
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        ControlFlow::Continue(RawPgnGame {
            tags,
            moves: Vec::new(),
        })
    }

    fn san(&mut self, movetext: &mut Self::Movetext, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        movetext.moves.push(san_plus.to_string());
        ControlFlow::Continue(())
    }

    fn begin_variation(
        &mut self,
        _movetext: &mut Self::Movetext,
    ) -> ControlFlow<Self::Output, Skip> {
        // Mainline only; sidelines never reached the board.
        ControlFlow::Continue(Skip(true))
    }

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        movetext
    }
}

/// Parse the first game out of a PGN string.
pub fn parse_pgn(pgn: &str) -> Option<RawPgnGame> {
    let mut reader = Reader::new(std::io::Cursor::new(pgn));
    reader.read_game(&mut GameVisitor).ok().flatten()
}

/// Turn a parsed PGN into a store record from `username`'s perspective.
///
/// The result token is re-oriented so that "1-0" always means the tracked
/// player won; dates prefer EndDate over UTCDate over Date; the game id is
/// the last segment of the game URL. Records without a URL get no id here;
/// the local-PGN importer synthesizes one (the Event tag is not unique
/// enough to dedupe on).
pub fn build_record(
    raw: &RawPgnGame,
    username: &str,
    time_class: Option<&str>,
) -> GameRecord {
    let white = raw.tag("White").unwrap_or("");
    let color = if white.eq_ignore_ascii_case(username) {
        Color::White
    } else {
        Color::Black
    };
    let opponent = match color {
        Color::White => raw.tag("Black"),
        Color::Black => raw.tag("White"),
    };

    let raw_result = raw.tag("Result").unwrap_or("*");
    let result = match raw_result {
        "1-0" => match color {
            Color::White => "1-0",
            Color::Black => "0-1",
        },
        "0-1" => match color {
            Color::White => "0-1",
            Color::Black => "1-0",
        },
        "1/2-1/2" | "½-½" => "1/2-1/2",
        other => other,
    };

    let date = ["EndDate", "UTCDate", "Date"]
        .iter()
        .filter_map(|key| raw.tag(key))
        .find_map(|value| NaiveDate::parse_from_str(value, "%Y.%m.%d").ok())
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let time_control_raw = raw.tag("TimeControl").map(|s| s.to_string());
    let time_control = time_class
        .and_then(|label| label.parse::<TimeControl>().ok())
        .unwrap_or_else(|| TimeControl::classify(time_control_raw.as_deref().unwrap_or("")));

    let url = raw
        .tag("Link")
        .or_else(|| raw.tag("Site"))
        .map(|s| s.to_string());
    let game_id = url
        .as_deref()
        .map(|u| u.trim_end_matches('/'))
        .and_then(|u| u.rsplit('/').next())
        .filter(|id| !id.is_empty())
        .map(|s| s.to_string());

    let (my_rating, opponent_rating) = match color {
        Color::White => (raw.tag("WhiteElo"), raw.tag("BlackElo")),
        Color::Black => (raw.tag("BlackElo"), raw.tag("WhiteElo")),
    };

    GameRecord {
        game_id,
        moves: raw.moves.clone(),
        result: Some(result.to_string()),
        color: Some(color),
        date: Some(date),
        opponent: opponent.map(|s| s.to_string()),
        my_rating: my_rating.and_then(|r| r.parse().ok()),
        opponent_rating: opponent_rating.and_then(|r| r.parse().ok()),
        time_control: Some(time_control),
        time_control_raw,
        termination: raw.tag("Termination").map(|s| s.to_string()),
        url,
    }
}

/// Merge freshly imported games into the store at `path`, deduplicating by
/// game id, and save sorted newest-first by (date, game id). Re-importing an
/// identical set is a no-op.
pub fn merge_into_store(
    new_games: Vec<GameRecord>,
    path: &Path,
) -> Result<ImportSummary, ImportError> {
    let mut store = storage::load_store(path)?;
    let mut existing: std::collections::HashSet<String> = store
        .games
        .iter()
        .filter_map(|g| g.game_id.clone())
        .collect();

    let mut imported = 0;
    for game in new_games {
        if let Some(id) = &game.game_id {
            if !existing.insert(id.clone()) {
                continue;
            }
        }
        store.games.push(game);
        imported += 1;
    }

    if imported > 0 {
        store.games.sort_by(|a, b| {
            let key_a = (a.date, a.game_id.as_deref().unwrap_or(""));
            let key_b = (b.date, b.game_id.as_deref().unwrap_or(""));
            key_b.cmp(&key_a)
        });
        storage::save_store(&store, path)?;
    }

    let total = store.games.len();
    info!(imported, total, path = %path.display(), "import merged");
    Ok(ImportSummary { imported, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE_PGN: &str = r#"[Event "Live Chess"]
[Site "Chess.com"]
[White "anna"]
[Black "rival"]
[Result "0-1"]
[UTCDate "2024.05.01"]
[WhiteElo "1500"]
[BlackElo "1520"]
[TimeControl "600"]
[Termination "rival won by resignation"]
[Link "https://www.chess.com/game/live/987654"]

1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 0-1"#;

    #[test]
    fn test_parse_and_build_record_as_white() {
        let raw = parse_pgn(SAMPLE_PGN).unwrap();
        let record = build_record(&raw, "anna", None);
        assert_eq!(record.color, Some(Color::White));
        // Raw 0-1 is a loss from white's perspective.
        assert_eq!(record.result.as_deref(), Some("0-1"));
        assert_eq!(record.opponent.as_deref(), Some("rival"));
        assert_eq!(record.my_rating, Some(1500));
        assert_eq!(record.opponent_rating, Some(1520));
        assert_eq!(record.game_id.as_deref(), Some("987654"));
        assert_eq!(record.time_control, Some(TimeControl::Rapid));
        assert_eq!(
            record.moves,
            vec!["e4", "e5", "Nf3", "Nc6", "Bb5", "a6"]
        );
        assert_eq!(
            record.date,
            NaiveDate::from_ymd_opt(2024, 5, 1)
        );
    }

    #[test]
    fn test_build_record_reorients_result_for_black() {
        let raw = parse_pgn(SAMPLE_PGN).unwrap();
        let record = build_record(&raw, "rival", None);
        assert_eq!(record.color, Some(Color::Black));
        // rival won with black, so from their perspective it's a win.
        assert_eq!(record.result.as_deref(), Some("1-0"));
        assert_eq!(record.my_rating, Some(1520));
    }

    #[test]
    fn test_time_class_override_wins() {
        let raw = parse_pgn(SAMPLE_PGN).unwrap();
        let record = build_record(&raw, "anna", Some("blitz"));
        assert_eq!(record.time_control, Some(TimeControl::Blitz));
    }

    #[test]
    fn test_involves_is_case_insensitive() {
        let raw = parse_pgn(SAMPLE_PGN).unwrap();
        assert!(raw.involves("ANNA"));
        assert!(raw.involves("Rival"));
        assert!(!raw.involves("nobody"));
    }

    #[test]
    fn test_merge_dedupes_and_sorts_newest_first() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("games.json");

        let old = GameRecord {
            game_id: Some("a".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..GameRecord::default()
        };
        let new = GameRecord {
            game_id: Some("b".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 6, 1),
            ..GameRecord::default()
        };

        let first = merge_into_store(vec![old.clone(), new.clone()], &path).unwrap();
        assert_eq!(first.imported, 2);
        assert_eq!(first.total, 2);

        // Idempotent re-import: the same ids add nothing.
        let second = merge_into_store(vec![old, new], &path).unwrap();
        assert_eq!(second.imported, 0);
        assert_eq!(second.total, 2);

        let games = storage::load_games(&path).unwrap();
        assert_eq!(games[0].game_id.as_deref(), Some("b"));
        assert_eq!(games[1].game_id.as_deref(), Some("a"));
    }
}
