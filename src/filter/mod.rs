// src/filter/mod.rs

use crate::game::{Color, GameRecord, TimeControl};
use chrono::NaiveDate;
use serde::Deserialize;

/// Filter configuration. Every field is optional; `None` means "no
/// constraint". The struct derives `Hash`/`Eq` and, with its fixed field
/// order and `None` as the absent-field sentinel, doubles as the canonical
/// filter component of the derived-view cache key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub color: Option<Color>,
    pub result: Option<String>,
    pub opponent: Option<String>,
    pub time_control: Option<TimeControl>,
    pub time_control_raw: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub min_my_rating: Option<u32>,
    pub max_my_rating: Option<u32>,
    pub min_opponent_rating: Option<u32>,
    pub max_opponent_rating: Option<u32>,
    pub moves_start: Option<usize>,
    pub moves_end: Option<usize>,
}

impl FilterCriteria {
    /// Whether a record passes every active predicate. An active predicate
    /// over a field the record does not carry excludes the record.
    fn matches(&self, game: &GameRecord) -> bool {
        if let Some(color) = self.color {
            if game.color != Some(color) {
                return false;
            }
        }
        if let Some(result) = &self.result {
            if game.result.as_deref() != Some(result.as_str()) {
                return false;
            }
        }
        if let Some(opponent) = &self.opponent {
            match &game.opponent {
                Some(o) if o.eq_ignore_ascii_case(opponent) => {}
                _ => return false,
            }
        }
        if let Some(tc) = self.time_control {
            if game.time_control != Some(tc) {
                return false;
            }
        }
        if let Some(raw) = &self.time_control_raw {
            if game.time_control_raw.as_deref() != Some(raw.as_str()) {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            match game.date {
                Some(d) if d >= from => {}
                _ => return false,
            }
        }
        if let Some(to) = self.date_to {
            match game.date {
                Some(d) if d <= to => {}
                _ => return false,
            }
        }
        if let Some(min) = self.min_my_rating {
            match game.my_rating {
                Some(r) if r >= min => {}
                _ => return false,
            }
        }
        if let Some(max) = self.max_my_rating {
            match game.my_rating {
                Some(r) if r <= max => {}
                _ => return false,
            }
        }
        if let Some(min) = self.min_opponent_rating {
            match game.opponent_rating {
                Some(r) if r >= min => {}
                _ => return false,
            }
        }
        if let Some(max) = self.max_opponent_rating {
            match game.opponent_rating {
                Some(r) if r <= max => {}
                _ => return false,
            }
        }
        true
    }

    fn has_move_window(&self) -> bool {
        self.moves_start.is_some() || self.moves_end.is_some()
    }
}

/// Return filtered games without mutating the originals. Predicates apply
/// conjunctively; the optional ply window `[moves_start, moves_end)` is
/// applied to the cloned move list afterwards, clamped to its length.
pub fn filter_games(games: &[GameRecord], criteria: &FilterCriteria) -> Vec<GameRecord> {
    games
        .iter()
        .filter(|g| criteria.matches(g))
        .map(|g| {
            let mut game = g.clone();
            if criteria.has_move_window() {
                let start = criteria.moves_start.unwrap_or(0).min(game.moves.len());
                let end = criteria
                    .moves_end
                    .unwrap_or(game.moves.len())
                    .min(game.moves.len())
                    .max(start);
                game.moves = game.moves[start..end].to_vec();
            }
            game
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(color: Color, opponent: &str, rating: u32, date: &str, moves: &[&str]) -> GameRecord {
        GameRecord {
            moves: moves.iter().map(|m| m.to_string()).collect(),
            result: Some("1-0".to_string()),
            color: Some(color),
            opponent: Some(opponent.to_string()),
            my_rating: Some(rating),
            opponent_rating: Some(rating),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
            time_control: Some(TimeControl::Blitz),
            ..GameRecord::default()
        }
    }

    fn sample_games() -> Vec<GameRecord> {
        vec![
            game(Color::White, "anna", 1500, "2024-01-10", &["e4", "e5", "Nf3", "Nc6"]),
            game(Color::White, "bela", 1550, "2024-02-10", &["d4", "d5", "c4"]),
            game(Color::White, "anna", 1600, "2024-03-10", &["e4", "c5"]),
            game(Color::Black, "carl", 1450, "2024-01-20", &["e4", "e5"]),
            game(Color::Black, "anna", 1500, "2024-02-20", &["d4", "Nf6"]),
        ]
    }

    #[test]
    fn test_filter_by_color() {
        let games = sample_games();
        let criteria = FilterCriteria {
            color: Some(Color::White),
            ..FilterCriteria::default()
        };
        let white_only = filter_games(&games, &criteria);
        assert_eq!(white_only.len(), 3);
        assert!(white_only.iter().all(|g| g.color == Some(Color::White)));
        // No ply window: records keep their original move lists.
        assert_eq!(white_only[0].moves, games[0].moves);
    }

    #[test]
    fn test_filter_is_pure() {
        let games = sample_games();
        let criteria = FilterCriteria {
            moves_start: Some(1),
            moves_end: Some(3),
            ..FilterCriteria::default()
        };
        let first = filter_games(&games, &criteria);
        let second = filter_games(&games, &criteria);
        assert_eq!(first, second);
        assert_eq!(games, sample_games());
    }

    #[test]
    fn test_moves_slicing_half_open_and_clamped() {
        let games = sample_games();
        let criteria = FilterCriteria {
            moves_start: Some(2),
            moves_end: Some(4),
            ..FilterCriteria::default()
        };
        let sliced = filter_games(&games, &criteria);
        assert_eq!(sliced[0].moves, vec!["Nf3", "Nc6"]);
        // Shorter games clamp rather than error.
        assert_eq!(sliced[2].moves, Vec::<String>::new());

        let out_of_range = FilterCriteria {
            moves_start: Some(50),
            moves_end: Some(60),
            ..FilterCriteria::default()
        };
        for g in filter_games(&games, &out_of_range) {
            assert!(g.moves.is_empty());
        }
    }

    #[test]
    fn test_opponent_match_is_case_insensitive() {
        let games = sample_games();
        let criteria = FilterCriteria {
            opponent: Some("ANNA".to_string()),
            ..FilterCriteria::default()
        };
        assert_eq!(filter_games(&games, &criteria).len(), 3);
    }

    #[test]
    fn test_date_range_inclusive() {
        let games = sample_games();
        let criteria = FilterCriteria {
            date_from: NaiveDate::from_ymd_opt(2024, 1, 20),
            date_to: NaiveDate::from_ymd_opt(2024, 2, 20),
            ..FilterCriteria::default()
        };
        let filtered = filter_games(&games, &criteria);
        assert_eq!(filtered.len(), 3);
    }

    #[test]
    fn test_rating_bounds() {
        let games = sample_games();
        let criteria = FilterCriteria {
            min_my_rating: Some(1500),
            max_my_rating: Some(1550),
            ..FilterCriteria::default()
        };
        assert_eq!(filter_games(&games, &criteria).len(), 3);
    }

    #[test]
    fn test_active_predicate_excludes_absent_field() {
        let mut games = sample_games();
        games[0].my_rating = None;
        let criteria = FilterCriteria {
            min_my_rating: Some(1000),
            ..FilterCriteria::default()
        };
        let filtered = filter_games(&games, &criteria);
        assert_eq!(filtered.len(), 4);

        // Inactive predicate keeps the game.
        let all = filter_games(&games, &FilterCriteria::default());
        assert_eq!(all.len(), 5);
    }
}
