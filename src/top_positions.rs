// src/top_positions.rs

use crate::eval::EvalCache;
use crate::game::GameRecord;
use shakmaty::{fen::Fen, san::SanPlus, Chess, EnPassantMode, Position};
use std::collections::HashMap;
use tracing::debug;

/// One position reached after a fixed number of plies, with how many games
/// reached it and the move sequence of the first game that did.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionCount {
    pub fen: String,
    pub count: usize,
    pub sample_line: Vec<String>,
}

/// FEN of the position after the first `plies` moves, or `None` when the
/// game is shorter than that or contains a move that does not replay.
pub fn fen_after_plies(moves: &[String], plies: usize) -> Option<String> {
    if moves.len() < plies {
        return None;
    }
    let mut board = Chess::default();
    for token in &moves[..plies] {
        let san: SanPlus = token.parse().ok()?;
        let m = san.san.to_move(&board).ok()?;
        board.play_unchecked(m);
    }
    Some(Fen::from_position(&board, EnPassantMode::Legal).to_string())
}

/// The `limit` most frequently reached positions after `plies` plies. Games
/// too short to reach the target depth, and games whose moves fail to
/// replay, are skipped. Ties are broken by FEN so the ranking is stable.
pub fn most_common_positions(
    games: &[GameRecord],
    plies: usize,
    limit: usize,
) -> Vec<PositionCount> {
    let mut counts: HashMap<String, (usize, Vec<String>)> = HashMap::new();
    let mut skipped = 0usize;

    for game in games {
        match fen_after_plies(&game.moves, plies) {
            Some(fen) => {
                let entry = counts
                    .entry(fen)
                    .or_insert_with(|| (0, game.moves[..plies].to_vec()));
                entry.0 += 1;
            }
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, plies, "games too short or unreplayable at target depth");
    }

    let mut ranked: Vec<PositionCount> = counts
        .into_iter()
        .map(|(fen, (count, sample_line))| PositionCount {
            fen,
            count,
            sample_line,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.fen.cmp(&b.fen)));
    ranked.truncate(limit);
    ranked
}

/// Render a ranked position report, annotating each line with a cloud
/// evaluation when a cache is supplied.
pub fn render_report(positions: &[PositionCount], evals: Option<&EvalCache>) -> String {
    let mut out = String::new();
    for (rank, position) in positions.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} games: {}\n   line: {}\n",
            rank + 1,
            position.count,
            position.fen,
            position.sample_line.join(" ")
        ));
        if let Some(cache) = evals {
            out.push_str(&format!("   eval: {}\n", cache.fetch_and_cache(&position.fen)));
        }
    }
    out
}
