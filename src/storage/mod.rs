// src/storage/mod.rs

use crate::constants::SCHEMA_VERSION;
use crate::game::GameRecord;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed games file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The on-disk store: `{"version": 1, "games": [...]}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameStore {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub games: Vec<GameRecord>,
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for GameStore {
    fn default() -> Self {
        GameStore {
            version: SCHEMA_VERSION,
            games: Vec::new(),
        }
    }
}

/// A player store together with the platform subdirectory it lives in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayerInfo {
    pub name: String,
    pub source: String,
}

/// Replace anything outside [A-Za-z0-9-_] so a player name is a safe file
/// stem. Empty names collapse to "default".
pub fn sanitize_player_name(name: &str) -> String {
    let cleaned = name.trim();
    if cleaned.is_empty() {
        return "default".to_string();
    }
    cleaned
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Path for a player's store, under `<games_dir>/<source>/<player>.json` when
/// a source platform is given, `<games_dir>/<player>.json` otherwise.
pub fn path_for_player(player: &str, games_dir: &Path, source: Option<&str>) -> PathBuf {
    let stem = sanitize_player_name(player);
    match source {
        Some(source) => games_dir.join(source).join(format!("{stem}.json")),
        None => games_dir.join(format!("{stem}.json")),
    }
}

/// Locate an existing store for a player, checking the games dir root first
/// and then each source subdirectory.
pub fn find_player_path(player: &str, games_dir: &Path) -> Option<PathBuf> {
    let stem = sanitize_player_name(player);
    let direct = games_dir.join(format!("{stem}.json"));
    if direct.is_file() {
        return Some(direct);
    }
    let entries = fs::read_dir(games_dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            let candidate = path.join(format!("{stem}.json"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Sorted list of player names found under the games directory, including
/// source subdirectories.
pub fn list_players(games_dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = available_players(games_dir)
        .into_iter()
        .map(|p| p.name)
        .collect();
    names.sort();
    names.dedup();
    names
}

/// All players with the platform they were imported from; stores directly
/// under the games dir are reported as "legacy". Sorted by name.
pub fn available_players(games_dir: &Path) -> Vec<PlayerInfo> {
    let mut players = Vec::new();
    let entries = match fs::read_dir(games_dir) {
        Ok(entries) => entries,
        Err(_) => return players,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() {
            if let Some(name) = json_stem(&path) {
                players.push(PlayerInfo {
                    name,
                    source: "legacy".to_string(),
                });
            }
        } else if path.is_dir() {
            let source = entry.file_name().to_string_lossy().into_owned();
            if let Ok(sub) = fs::read_dir(&path) {
                for sub_entry in sub.flatten() {
                    let sub_path = sub_entry.path();
                    if sub_path.is_file() {
                        if let Some(name) = json_stem(&sub_path) {
                            players.push(PlayerInfo {
                                name,
                                source: source.clone(),
                            });
                        }
                    }
                }
            }
        }
    }
    players.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    players
}

fn json_stem(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

/// Load a store; a missing file is an empty store, not an error.
pub fn load_store(path: &Path) -> Result<GameStore, StorageError> {
    if !path.exists() {
        return Ok(GameStore::default());
    }
    let json = fs::read_to_string(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&json).map_err(|source| StorageError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_store(store: &GameStore, path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(store).map_err(|source| StorageError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_games(path: &Path) -> Result<Vec<GameRecord>, StorageError> {
    Ok(load_store(path)?.games)
}

/// Modification fingerprint for a backing file. `None` (missing or
/// unstattable) is itself a valid fingerprint value, distinct from
/// "unchanged".
pub fn modified_fingerprint(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_player_name() {
        assert_eq!(sanitize_player_name("Magnus"), "Magnus");
        assert_eq!(sanitize_player_name("  "), "default");
        assert_eq!(sanitize_player_name("a/b c"), "a_b_c");
        assert_eq!(sanitize_player_name("x-y_z"), "x-y_z");
    }

    #[test]
    fn test_load_missing_store_is_empty() {
        let dir = tempdir().unwrap();
        let store = load_store(&dir.path().join("nope.json")).unwrap();
        assert_eq!(store.version, SCHEMA_VERSION);
        assert!(store.games.is_empty());
    }

    #[test]
    fn test_store_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("games.json");
        let mut store = GameStore::default();
        store.games.push(GameRecord {
            game_id: Some("g1".to_string()),
            moves: vec!["e4".to_string()],
            result: Some("1-0".to_string()),
            ..GameRecord::default()
        });
        save_store(&store, &path).unwrap();
        let loaded = load_store(&path).unwrap();
        assert_eq!(loaded.games.len(), 1);
        assert_eq!(loaded.games[0].game_id.as_deref(), Some("g1"));
    }

    #[test]
    fn test_store_without_version_gets_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("games.json");
        fs::write(&path, r#"{"games": []}"#).unwrap();
        let store = load_store(&path).unwrap();
        assert_eq!(store.version, SCHEMA_VERSION);
    }

    #[test]
    fn test_find_player_path_checks_source_subdirs() {
        let dir = tempdir().unwrap();
        let lichess = dir.path().join("lichess");
        fs::create_dir_all(&lichess).unwrap();
        fs::write(lichess.join("anna.json"), "{}").unwrap();
        fs::write(dir.path().join("bela.json"), "{}").unwrap();

        assert_eq!(
            find_player_path("anna", dir.path()),
            Some(lichess.join("anna.json"))
        );
        assert_eq!(
            find_player_path("bela", dir.path()),
            Some(dir.path().join("bela.json"))
        );
        assert_eq!(find_player_path("carl", dir.path()), None);
    }

    #[test]
    fn test_available_players_with_sources() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("lichess")).unwrap();
        fs::write(dir.path().join("lichess").join("anna.json"), "{}").unwrap();
        fs::write(dir.path().join("bela.json"), "{}").unwrap();

        let players = available_players(dir.path());
        assert_eq!(
            players,
            vec![
                PlayerInfo {
                    name: "anna".to_string(),
                    source: "lichess".to_string()
                },
                PlayerInfo {
                    name: "bela".to_string(),
                    source: "legacy".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_fingerprint_of_missing_file_is_none() {
        let dir = tempdir().unwrap();
        assert!(modified_fingerprint(&dir.path().join("gone.json")).is_none());
        let path = dir.path().join("here.json");
        fs::write(&path, "{}").unwrap();
        assert!(modified_fingerprint(&path).is_some());
    }
}
