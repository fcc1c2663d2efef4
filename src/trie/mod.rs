// src/trie/mod.rs

pub mod builder;

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown result token: {0}")]
pub struct UnknownResultError(pub String);

/// A game result normalized to the tracked player's perspective.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameOutcome {
    Win,
    Loss,
    Draw,
}

impl GameOutcome {
    /// Normalize a result token. Accepts the score-style tokens stored in the
    /// games files ("1-0" means the tracked player won, regardless of color)
    /// as well as a few word forms.
    pub fn from_token(token: &str) -> Result<GameOutcome, UnknownResultError> {
        match token.trim().to_lowercase().as_str() {
            "1-0" | "w" | "white" | "win" | "wins" => Ok(GameOutcome::Win),
            "0-1" | "b" | "black" | "loss" | "lose" | "loses" => Ok(GameOutcome::Loss),
            "1/2-1/2" | "draw" | "d" | "=" | "½" => Ok(GameOutcome::Draw),
            _ => Err(UnknownResultError(token.to_string())),
        }
    }
}

/// Aggregated stats for one node, with rates precomputed for the UI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct NodeStats {
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    pub total: u64,
    #[serde(rename = "winRate")]
    pub win_rate: f64,
    #[serde(rename = "drawRate")]
    pub draw_rate: f64,
    #[serde(rename = "lossRate")]
    pub loss_rate: f64,
}

impl NodeStats {
    pub fn empty() -> NodeStats {
        NodeStats::default()
    }
}

/// A node in the move trie with aggregated results. The node is identified
/// implicitly by the move path leading to it from the root.
#[derive(Clone, Debug, Default)]
pub struct TrieNode {
    wins: u64,
    losses: u64,
    draws: u64,
    children: HashMap<String, TrieNode>,
}

impl TrieNode {
    fn increment(&mut self, outcome: GameOutcome) {
        match outcome {
            GameOutcome::Win => self.wins += 1,
            GameOutcome::Loss => self.losses += 1,
            GameOutcome::Draw => self.draws += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.wins + self.losses + self.draws
    }

    pub fn stats(&self) -> NodeStats {
        let total = self.total();
        if total == 0 {
            return NodeStats::empty();
        }
        NodeStats {
            wins: self.wins,
            losses: self.losses,
            draws: self.draws,
            total,
            win_rate: self.wins as f64 / total as f64,
            draw_rate: self.draws as f64 / total as f64,
            loss_rate: self.losses as f64 / total as f64,
        }
    }

    /// Snapshot of the immediate children's stats. Iteration order is
    /// unspecified; callers sort by their own key.
    pub fn next_moves(&self) -> HashMap<String, NodeStats> {
        self.children
            .iter()
            .map(|(mv, child)| (mv.clone(), child.stats()))
            .collect()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Container for move trie operations. Append-only: games are added one at a
/// time and nodes are never removed short of rebuilding the whole trie.
#[derive(Clone, Debug, Default)]
pub struct Trie {
    root: TrieNode,
}

impl Trie {
    pub fn new() -> Trie {
        Trie::default()
    }

    pub fn root(&self) -> &TrieNode {
        &self.root
    }

    /// Add one game. The root and every move prefix are incremented by the
    /// normalized result. The result is normalized before any node is
    /// touched, so a rejected call leaves the trie unchanged.
    pub fn add_game<I, S>(&mut self, moves: I, result: &str) -> Result<(), UnknownResultError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let outcome = GameOutcome::from_token(result)?;
        let mut node = &mut self.root;
        node.increment(outcome);
        for mv in moves {
            node = node.children.entry(mv.as_ref().to_string()).or_default();
            node.increment(outcome);
        }
        Ok(())
    }

    /// Follow `path` from the root, returning `None` if any prefix is missing.
    pub fn find<I, S>(&self, path: I) -> Option<&TrieNode>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut node = &self.root;
        for mv in path {
            node = node.children.get(mv.as_ref())?;
        }
        Some(node)
    }

    /// Stats at `path`, or empty stats when the path was never played.
    pub fn stats<I, S>(&self, path: I) -> NodeStats
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.find(path).map(TrieNode::stats).unwrap_or_default()
    }

    pub fn next_moves<I, S>(&self, path: I) -> HashMap<String, NodeStats>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.find(path)
            .map(TrieNode::next_moves)
            .unwrap_or_default()
    }
}

/// Sort a (move, stats) listing by total descending, breaking ties by move
/// token ascending. This ordering is part of the query contract.
pub fn sort_continuations(moves: &mut Vec<(String, NodeStats)>) {
    moves.sort_by(|a, b| b.1.total.cmp(&a.1.total).then_with(|| a.0.cmp(&b.0)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trie() -> Trie {
        // Two games starting e4 e5 (win, draw), one d4 d5 (win).
        let mut trie = Trie::new();
        trie.add_game(["e4", "e5", "Nf3"], "1-0").unwrap();
        trie.add_game(["e4", "e5", "Bc4"], "1/2-1/2").unwrap();
        trie.add_game(["d4", "d5"], "1-0").unwrap();
        trie
    }

    #[test]
    fn test_root_total_equals_game_count() {
        let trie = sample_trie();
        assert_eq!(trie.root().stats().total, 3);
    }

    #[test]
    fn test_next_moves_from_root() {
        let trie = sample_trie();
        let next = trie.next_moves(Vec::<&str>::new());
        assert_eq!(next.len(), 2);
        assert_eq!(next["e4"].total, 2);
        assert_eq!(next["d4"].total, 1);
    }

    #[test]
    fn test_find_path_stats() {
        let trie = sample_trie();
        let stats = trie.stats(["e4"]);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.draws, 1);
        assert_eq!(stats.losses, 0);
        assert_eq!(stats.total, 2);
    }

    #[test]
    fn test_find_missing_path_is_absent() {
        let trie = sample_trie();
        assert!(trie.find(["c4"]).is_none());
        assert!(trie.find(["e4", "c5"]).is_none());
        assert_eq!(trie.stats(["e4", "c5"]).total, 0);
    }

    #[test]
    fn test_prefix_monotonicity() {
        let trie = sample_trie();
        fn check(node: &TrieNode) {
            for child in node.children.values() {
                assert!(child.total() <= node.total());
                check(child);
            }
        }
        check(trie.root());
    }

    #[test]
    fn test_rates_well_formed() {
        let trie = sample_trie();
        let stats = trie.stats(["e4"]);
        let sum = stats.win_rate + stats.draw_rate + stats.loss_rate;
        assert!((sum - 1.0).abs() < 1e-9);

        let empty = NodeStats::empty();
        assert_eq!(empty.win_rate, 0.0);
        assert_eq!(empty.draw_rate, 0.0);
        assert_eq!(empty.loss_rate, 0.0);
    }

    #[test]
    fn test_unknown_result_rejected_without_mutation() {
        let mut trie = sample_trie();
        let err = trie.add_game(["e4", "e5"], "*").unwrap_err();
        assert_eq!(err, UnknownResultError("*".to_string()));
        // Nothing was committed for the rejected game.
        assert_eq!(trie.root().stats().total, 3);
        assert_eq!(trie.stats(["e4"]).total, 2);
    }

    #[test]
    fn test_result_token_normalization() {
        assert_eq!(GameOutcome::from_token(" WIN "), Ok(GameOutcome::Win));
        assert_eq!(GameOutcome::from_token("0-1"), Ok(GameOutcome::Loss));
        assert_eq!(GameOutcome::from_token("="), Ok(GameOutcome::Draw));
        assert!(GameOutcome::from_token("2-0").is_err());
    }

    #[test]
    fn test_sort_continuations_orders_by_total_then_token() {
        let mut trie = Trie::new();
        trie.add_game(["e4"], "1-0").unwrap();
        trie.add_game(["e4"], "0-1").unwrap();
        trie.add_game(["d4"], "1-0").unwrap();
        trie.add_game(["c4"], "1-0").unwrap();

        let mut moves: Vec<(String, NodeStats)> =
            trie.next_moves(Vec::<&str>::new()).into_iter().collect();
        sort_continuations(&mut moves);
        let order: Vec<&str> = moves.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(order, vec!["e4", "c4", "d4"]);
    }
}
