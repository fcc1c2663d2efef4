// src/cache/mod.rs

use crate::filter::{filter_games, FilterCriteria};
use crate::game::GameRecord;
use crate::storage::{self, StorageError};
use crate::trie::builder::{build_color_tries, ColorTries};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime};
use tracing::{info, warn};

/// Which players' games a query is asked over.
#[derive(Clone, Debug, Default)]
pub enum PlayerSelection {
    /// All known players, falling back to the legacy single file.
    #[default]
    All,
    One(String),
    Many(Vec<String>),
}

impl PlayerSelection {
    pub fn from_names(names: Vec<String>) -> PlayerSelection {
        match names.len() {
            0 => PlayerSelection::All,
            1 => PlayerSelection::One(names.into_iter().next().unwrap_or_default()),
            _ => PlayerSelection::Many(names),
        }
    }
}

/// A derived cache entry: the tries, per-color game counts and the filtered
/// game list for one (player key, filter) pair. Shared out behind an `Arc` so
/// hits never clone the games.
#[derive(Debug)]
pub struct FilteredView {
    pub tries: ColorTries,
    pub games: Vec<GameRecord>,
}

impl FilteredView {
    pub fn empty() -> FilteredView {
        FilteredView {
            tries: ColorTries::default(),
            games: Vec::new(),
        }
    }
}

/// Composite staleness fingerprint for one player key: the modification time
/// of each backing file, in path order. A missing file contributes `None`,
/// which is a real fingerprint value and not "unchanged".
type Fingerprint = Vec<Option<SystemTime>>;

#[derive(Default)]
struct CacheState {
    fingerprints: HashMap<String, Fingerprint>,
    raw_games: HashMap<String, Vec<GameRecord>>,
    derived: HashMap<(String, FilterCriteria), Arc<FilteredView>>,
}

impl CacheState {
    fn evict_key(&mut self, player_key: &str) {
        self.derived.retain(|(key, _), _| key != player_key);
    }
}

/// Memoizes filtered games and their tries keyed by player + filter.
///
/// All state lives behind one mutex: the fingerprint comparison, the raw-game
/// reload and the derived-entry eviction for a key happen as a single locked
/// step, so a concurrent reader can never see a new fingerprint paired with
/// pre-reload derived entries.
pub struct GameCache {
    games_dir: PathBuf,
    legacy_path: Option<PathBuf>,
    state: Mutex<CacheState>,
}

impl GameCache {
    pub fn new(games_dir: PathBuf, legacy_path: Option<PathBuf>) -> GameCache {
        let legacy_path = legacy_path.filter(|p| p.exists());
        GameCache {
            games_dir,
            legacy_path,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn games_dir(&self) -> &Path {
        &self.games_dir
    }

    pub fn legacy_path(&self) -> Option<&Path> {
        self.legacy_path.as_deref()
    }

    /// Resolve a selection to a canonical cache key and the backing files to
    /// load. An unknown player resolves to a key with no paths, which yields
    /// an empty result rather than an error.
    fn player_key_and_paths(&self, selection: &PlayerSelection) -> (String, Vec<PathBuf>) {
        let names = match selection {
            PlayerSelection::All => {
                let all = storage::list_players(&self.games_dir);
                if all.is_empty() {
                    return match &self.legacy_path {
                        Some(legacy) => ("default".to_string(), vec![legacy.clone()]),
                        None => ("default".to_string(), Vec::new()),
                    };
                }
                return ("all".to_string(), self.paths_for(&all));
            }
            PlayerSelection::One(name) => vec![name.clone()],
            PlayerSelection::Many(names) => {
                if names.is_empty() {
                    return ("default".to_string(), Vec::new());
                }
                let mut sorted = names.clone();
                sorted.sort();
                // A name listed twice must not load (and count) its store twice.
                sorted.dedup();
                sorted
            }
        };
        let key = names.join("+");
        let paths = self.paths_for(&names);
        (key, paths)
    }

    fn paths_for(&self, names: &[String]) -> Vec<PathBuf> {
        names
            .iter()
            .filter_map(|name| storage::find_player_path(name, &self.games_dir))
            .collect()
    }

    /// Serve the filtered view for `(criteria, selection)`, rebuilding only
    /// when the backing files changed or the pair was never seen.
    pub fn get_filtered(
        &self,
        criteria: &FilterCriteria,
        selection: &PlayerSelection,
    ) -> Result<(String, Arc<FilteredView>), StorageError> {
        let started = Instant::now();
        let (player_key, paths) = self.player_key_and_paths(selection);

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.reload_if_stale(&mut state, &player_key, &paths)?;

        let cache_key = (player_key.clone(), criteria.clone());
        if let Some(view) = state.derived.get(&cache_key) {
            info!(
                player = %player_key,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "cache hit"
            );
            return Ok((player_key, Arc::clone(view)));
        }

        let raw = state.raw_games.get(&player_key).map(Vec::as_slice).unwrap_or(&[]);
        let raw_len = raw.len();
        let games = filter_games(raw, criteria);
        let filtered_len = games.len();
        let tries = build_color_tries(&games);
        let view = Arc::new(FilteredView { tries, games });
        state.derived.insert(cache_key, Arc::clone(&view));
        info!(
            player = %player_key,
            games = raw_len,
            filtered = filtered_len,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cache miss, rebuilt"
        );
        Ok((player_key, view))
    }

    /// Reload the raw game list for a key when its composite fingerprint
    /// changed, evicting every derived entry for that key in the same locked
    /// step. Caller holds the state lock.
    fn reload_if_stale(
        &self,
        state: &mut CacheState,
        player_key: &str,
        paths: &[PathBuf],
    ) -> Result<(), StorageError> {
        if paths.is_empty() {
            state.raw_games.insert(player_key.to_string(), Vec::new());
            state.fingerprints.insert(player_key.to_string(), Vec::new());
            state.evict_key(player_key);
            return Ok(());
        }

        let fingerprint: Fingerprint =
            paths.iter().map(|p| storage::modified_fingerprint(p)).collect();
        if state.fingerprints.get(player_key) == Some(&fingerprint) {
            return Ok(());
        }

        let mut merged = Vec::new();
        for path in paths {
            match storage::load_games(path) {
                Ok(mut games) => merged.append(&mut games),
                Err(err @ StorageError::Io { .. }) => {
                    // A file can disappear between the stat and the read;
                    // treat it like a missing backing file.
                    warn!(%err, "skipping unreadable games file");
                }
                Err(err) => return Err(err),
            }
        }

        info!(player = %player_key, games = merged.len(), "reloaded corpus");
        state.raw_games.insert(player_key.to_string(), merged);
        state.evict_key(player_key);
        state.fingerprints.insert(player_key.to_string(), fingerprint);
        Ok(())
    }

    /// Drop every fingerprint, raw list and derived entry. Called after any
    /// corpus mutation so the next query is forced through a full reload even
    /// if a rewrite kept the same modification time.
    pub fn invalidate(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.fingerprints.clear();
        state.raw_games.clear();
        state.derived.clear();
        info!("game cache invalidated");
    }
}
