// src/explore.rs

use crate::filter::{filter_games, FilterCriteria};
use crate::game::{Color, GameRecord};
use crate::trie::builder::build_color_tries;
use crate::trie::{sort_continuations, NodeStats, Trie};
use std::io::{self, BufRead, Write};

fn format_stats(stats: &NodeStats) -> String {
    if stats.total == 0 {
        return "T 0".to_string();
    }
    format!(
        "T {} | W {} D {} L {}",
        stats.total, stats.wins, stats.draws, stats.losses
    )
}

/// Sorted continuations at `path`, capped at `top` entries.
fn list_next_moves(trie: &Trie, path: &[String], top: usize) -> Vec<(String, NodeStats)> {
    let node = match trie.find(path) {
        Some(node) => node,
        None => return Vec::new(),
    };
    let mut moves: Vec<(String, NodeStats)> = node.next_moves().into_iter().collect();
    sort_continuations(&mut moves);
    moves.truncate(top);
    moves
}

/// Walk the trie from the prompt: a number dives into that continuation,
/// `b` steps back, `r` resets to the root, `q` (or end of input) quits.
pub fn interactive_traverse<R: BufRead, W: Write>(
    trie: &Trie,
    color_label: &str,
    top: usize,
    input: &mut R,
    output: &mut W,
) -> io::Result<()> {
    let mut path: Vec<String> = Vec::new();
    loop {
        let stats = trie.stats(&path);
        let prefix = if color_label.is_empty() {
            String::new()
        } else {
            format!("[{color_label}] ")
        };
        let shown_path = if path.is_empty() {
            "<start>".to_string()
        } else {
            path.join(" ")
        };
        writeln!(output, "\n{prefix}Path: {shown_path}")?;
        writeln!(output, "{prefix}Current: {}", format_stats(&stats))?;

        let moves = list_next_moves(trie, &path, top);
        if moves.is_empty() {
            writeln!(output, "No further moves. (b)ack, (r)eset, (q)uit")?;
        } else {
            writeln!(output, "Next moves (choose number, or b/r/q):")?;
            for (idx, (mv, st)) in moves.iter().enumerate() {
                writeln!(output, "  {}. {}  {}", idx + 1, mv, format_stats(st))?;
            }
        }

        write!(output, "> ")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let choice = line.trim().to_lowercase();
        match choice.as_str() {
            "q" | "quit" => break,
            "r" | "reset" => path.clear(),
            "b" | "back" => {
                if path.pop().is_none() {
                    writeln!(output, "Already at root.")?;
                }
            }
            _ => match choice.parse::<usize>() {
                Ok(num) if num >= 1 && num <= moves.len() => {
                    path.push(moves[num - 1].0.clone());
                }
                Ok(_) => writeln!(output, "Invalid selection.")?,
                Err(_) => {
                    writeln!(output, "Commands: number to dive, b=back, r=reset, q=quit")?
                }
            },
        }
    }
    Ok(())
}

/// Filter the corpus, build the per-color tries and hand the chosen side to
/// the interactive loop. Without an explicit color filter the populated side
/// is used; when both sides have games the user is asked.
pub fn run<R: BufRead, W: Write>(
    games: &[GameRecord],
    criteria: &FilterCriteria,
    top: usize,
    input: &mut R,
    output: &mut W,
) -> io::Result<()> {
    let filtered = filter_games(games, criteria);
    if filtered.is_empty() {
        writeln!(output, "No games match the provided filters.")?;
        return Ok(());
    }

    let tries = build_color_tries(&filtered);
    let chosen = match criteria.color {
        Some(color) => {
            if tries.games(color) == 0 {
                writeln!(output, "No {color} games match the provided filters.")?;
                return Ok(());
            }
            color
        }
        None => match (tries.white_games > 0, tries.black_games > 0) {
            (true, false) => Color::White,
            (false, true) => Color::Black,
            (false, false) => {
                writeln!(output, "No games match the provided filters.")?;
                return Ok(());
            }
            (true, true) => {
                write!(output, "Explore color? [w/b] (default w): ")?;
                output.flush()?;
                let mut line = String::new();
                input.read_line(&mut line)?;
                if line.trim().to_lowercase().starts_with('b') {
                    Color::Black
                } else {
                    Color::White
                }
            }
        },
    };

    writeln!(
        output,
        "Loaded {} {chosen} games into trie. Interactive traversal starting.",
        tries.games(chosen)
    )?;
    interactive_traverse(tries.trie(chosen), chosen.as_str(), top, input, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn game(color: Color, result: &str, moves: &[&str]) -> GameRecord {
        GameRecord {
            moves: moves.iter().map(|m| m.to_string()).collect(),
            result: Some(result.to_string()),
            color: Some(color),
            ..GameRecord::default()
        }
    }

    fn white_trie() -> Trie {
        let games = vec![
            game(Color::White, "1-0", &["e4", "e5", "Nf3"]),
            game(Color::White, "1/2-1/2", &["e4", "e5", "Bc4"]),
            game(Color::White, "0-1", &["d4", "d5"]),
        ];
        build_color_tries(&games).white
    }

    fn drive(trie: &Trie, script: &str) -> String {
        let mut input = Cursor::new(script.to_string());
        let mut output = Vec::new();
        interactive_traverse(trie, "white", 20, &mut input, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_dive_follows_sorted_numbering() {
        // e4 (2 games) is listed before d4 (1); option 1 dives into e4.
        let out = drive(&white_trie(), "1\nq\n");
        assert!(out.contains("  1. e4  T 2 | W 1 D 1 L 0"));
        assert!(out.contains("  2. d4  T 1 | W 0 D 0 L 1"));
        assert!(out.contains("Path: e4"));
    }

    #[test]
    fn test_back_and_reset_navigation() {
        let out = drive(&white_trie(), "1\n1\nb\nr\nb\nq\n");
        assert!(out.contains("Path: e4 e5"));
        // b after r: already at the root.
        assert!(out.contains("Already at root."));
        // The final prompt is back at the start.
        assert!(out.contains("Path: <start>"));
    }

    #[test]
    fn test_rejects_out_of_range_and_junk_input() {
        let out = drive(&white_trie(), "9\nxyzzy\nq\n");
        assert!(out.contains("Invalid selection."));
        assert!(out.contains("Commands: number to dive, b=back, r=reset, q=quit"));
    }

    #[test]
    fn test_end_of_input_quits() {
        let out = drive(&white_trie(), "");
        assert!(out.contains("Path: <start>"));
        assert!(out.contains("Current: T 3"));
    }

    #[test]
    fn test_run_reports_empty_filter_result() {
        let games = vec![game(Color::White, "1-0", &["e4"])];
        let criteria = FilterCriteria {
            color: Some(Color::Black),
            ..FilterCriteria::default()
        };
        let mut input = Cursor::new(String::new());
        let mut output = Vec::new();
        run(&games, &criteria, 20, &mut input, &mut output).unwrap();
        let out = String::from_utf8(output).unwrap();
        assert!(out.contains("No games match the provided filters."));
    }

    #[test]
    fn test_run_prompts_for_color_when_both_present() {
        let games = vec![
            game(Color::White, "1-0", &["e4"]),
            game(Color::Black, "0-1", &["e4", "c5"]),
        ];
        let mut input = Cursor::new("b\nq\n".to_string());
        let mut output = Vec::new();
        run(&games, &FilterCriteria::default(), 20, &mut input, &mut output).unwrap();
        let out = String::from_utf8(output).unwrap();
        assert!(out.contains("Explore color? [w/b] (default w): "));
        assert!(out.contains("Loaded 1 black games into trie."));
        assert!(out.contains("[black] Path: <start>"));
    }
}
