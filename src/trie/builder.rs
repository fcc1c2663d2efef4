// src/trie/builder.rs

use crate::game::{Color, GameRecord};
use crate::trie::Trie;
use tracing::debug;

/// White and black tries built from one filtered game list, with per-color
/// game counts taken from the same fold.
#[derive(Clone, Debug, Default)]
pub struct ColorTries {
    pub white: Trie,
    pub black: Trie,
    pub white_games: u64,
    pub black_games: u64,
}

impl ColorTries {
    pub fn trie(&self, color: Color) -> &Trie {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    pub fn games(&self, color: Color) -> u64 {
        match color {
            Color::White => self.white_games,
            Color::Black => self.black_games,
        }
    }
}

/// Fold all games into a single color-agnostic trie. A game whose result
/// token does not normalize is skipped rather than failing the build.
pub fn build_trie(games: &[GameRecord]) -> Trie {
    let mut trie = Trie::new();
    for game in games {
        let result = game.result.as_deref().unwrap_or("*");
        if let Err(err) = trie.add_game(&game.moves, result) {
            debug!(game_id = ?game.game_id, %err, "skipping game with unrecognized result");
        }
    }
    trie
}

/// Partition games by the tracked player's color and build one trie per
/// side. Games with an unrecognized color are skipped; the per-color counts
/// only include games that made it into a trie.
pub fn build_color_tries(games: &[GameRecord]) -> ColorTries {
    let mut tries = ColorTries::default();
    for game in games {
        let color = match game.color {
            Some(c) => c,
            None => continue,
        };
        let result = game.result.as_deref().unwrap_or("*");
        let (trie, count) = match color {
            Color::White => (&mut tries.white, &mut tries.white_games),
            Color::Black => (&mut tries.black, &mut tries.black_games),
        };
        match trie.add_game(&game.moves, result) {
            Ok(()) => *count += 1,
            Err(err) => {
                debug!(game_id = ?game.game_id, %err, "skipping game with unrecognized result");
            }
        }
    }
    tries
}
