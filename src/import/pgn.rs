// src/import/pgn.rs

use crate::game::GameRecord;
use crate::import::{build_record, GameVisitor, ImportError, ImportSummary};
use pgn_reader::Reader;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Expand files and directories into the sorted list of `.pgn` files below
/// them (directories are walked recursively).
fn collect_pgn_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            walk_pgn_dir(input, &mut found);
            found.sort();
            files.extend(found);
        } else if is_pgn_file(input) {
            files.push(input.clone());
        }
    }
    files
}

fn walk_pgn_dir(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_pgn_dir(&path, out);
        } else if is_pgn_file(&path) {
            out.push(path);
        }
    }
}

fn is_pgn_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pgn"))
            .unwrap_or(false)
}

/// Import games the tracked player took part in from local PGN files or
/// directories. Games without a URL-derived id are given a
/// `<file name>-<index>` id so re-imports stay idempotent.
pub fn import_files(
    username: &str,
    inputs: &[PathBuf],
    out_path: &Path,
) -> Result<ImportSummary, ImportError> {
    let username = username.trim();
    let files = collect_pgn_files(inputs);
    if files.is_empty() {
        info!("no PGN files found");
        return crate::import::merge_into_store(Vec::new(), out_path);
    }

    let mut parsed: Vec<GameRecord> = Vec::new();
    for file in &files {
        let handle = match fs::File::open(file) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(path = %file.display(), %err, "skipping unreadable PGN file");
                continue;
            }
        };
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pgn".to_string());

        let mut reader = Reader::new(BufReader::new(handle));
        let mut game_idx = 0usize;
        loop {
            match reader.read_game(&mut GameVisitor) {
                Ok(Some(raw)) => {
                    game_idx += 1;
                    if !raw.involves(username) {
                        continue;
                    }
                    let time_class = raw.tag("TimeClass").map(|s| s.to_string());
                    let mut record = build_record(&raw, username, time_class.as_deref());
                    if record.game_id.is_none() {
                        record.game_id = Some(format!("{file_name}-{game_idx}"));
                    }
                    parsed.push(record);
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(path = %file.display(), %err, "stopping after PGN read error");
                    break;
                }
            }
        }
    }

    info!(files = files.len(), games = parsed.len(), "parsed local PGN files");
    crate::import::merge_into_store(parsed, out_path)
}
