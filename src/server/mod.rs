// src/server/mod.rs

use crate::cache::{FilteredView, GameCache, PlayerSelection};
use crate::filter::FilterCriteria;
use crate::game::Color;
use crate::import::{self, ImportError};
use crate::storage::{self, PlayerInfo};
use crate::trie::{sort_continuations, NodeStats, Trie};
use actix_files::Files;
use actix_web::{web, App, HttpResponse, HttpServer};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shakmaty::{fen::Fen, san::SanPlus, Chess, EnPassantMode, Position};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Deserialize)]
struct NextMovesRequest {
    #[serde(default)]
    path: Vec<String>,
    #[serde(default)]
    player: Option<String>,
    #[serde(default)]
    players: Option<Vec<String>>,
    #[serde(flatten)]
    filters: FilterCriteria,
}

impl NextMovesRequest {
    fn selection(&self) -> PlayerSelection {
        if let Some(players) = &self.players {
            return PlayerSelection::from_names(players.clone());
        }
        match &self.player {
            Some(name) if !name.trim().is_empty() => PlayerSelection::One(name.clone()),
            _ => PlayerSelection::All,
        }
    }
}

#[derive(Serialize)]
struct MoveEntry {
    #[serde(rename = "move")]
    mv: String,
    stats: NodeStats,
}

#[derive(Serialize)]
struct NextMovesResponse {
    player: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<Color>,
    games: usize,
    path: Vec<String>,
    fen: String,
    stats: NodeStats,
    next: Vec<MoveEntry>,
}

/// Replay a SAN path from the starting position, returning the reached FEN.
fn fen_after_path(path: &[String]) -> Result<String, String> {
    let mut board = Chess::default();
    for token in path {
        // Tokens may carry check or mate suffixes; SanPlus strips them.
        let san: SanPlus = token
            .parse()
            .map_err(|_| format!("Invalid move sequence: {token}"))?;
        let m = san
            .san
            .to_move(&board)
            .map_err(|_| format!("Invalid move sequence: {token}"))?;
        board.play_unchecked(m);
    }
    Ok(Fen::from_position(&board, EnPassantMode::Legal).to_string())
}

/// Stats and sorted continuations at `path`, or the well-defined empty
/// result when the path was never played.
fn stats_and_next(trie: &Trie, path: &[String]) -> (NodeStats, Vec<MoveEntry>) {
    let node = match trie.find(path) {
        Some(node) => node,
        None => return (NodeStats::empty(), Vec::new()),
    };
    let mut moves: Vec<(String, NodeStats)> = node.next_moves().into_iter().collect();
    sort_continuations(&mut moves);
    let next = moves
        .into_iter()
        .map(|(mv, stats)| MoveEntry { mv, stats })
        .collect();
    (node.stats(), next)
}

/// Pick which side's trie to answer from: an explicit color filter wins,
/// otherwise the better-populated side, falling back to the non-empty one.
fn choose_color(requested: Option<Color>, view: &FilteredView) -> Color {
    let mut chosen = requested.unwrap_or_else(|| {
        if view.tries.white_games >= view.tries.black_games {
            Color::White
        } else {
            Color::Black
        }
    });
    if view.tries.games(chosen) == 0 && view.tries.games(chosen.other()) > 0 {
        chosen = chosen.other();
    }
    chosen
}

async fn next_moves(
    cache: web::Data<GameCache>,
    request: web::Json<NextMovesRequest>,
) -> HttpResponse {
    let selection = request.selection();
    let (player_key, view) = match cache.get_filtered(&request.filters, &selection) {
        Ok(result) => result,
        Err(err) => {
            error!(%err, "failed to load corpus");
            return HttpResponse::InternalServerError().json(json!({ "error": err.to_string() }));
        }
    };

    let fen = match fen_after_path(&request.path) {
        Ok(fen) => fen,
        Err(message) => return HttpResponse::BadRequest().json(json!({ "error": message })),
    };

    if view.games.is_empty() {
        return HttpResponse::Ok().json(NextMovesResponse {
            player: player_key,
            color: None,
            games: 0,
            path: request.path.clone(),
            fen,
            stats: NodeStats::empty(),
            next: Vec::new(),
        });
    }

    let chosen = choose_color(request.filters.color, &view);
    let trie = view.tries.trie(chosen);
    let (stats, next) = stats_and_next(trie, &request.path);

    HttpResponse::Ok().json(NextMovesResponse {
        player: player_key,
        color: Some(chosen),
        games: view.games.len(),
        path: request.path.clone(),
        fen,
        stats,
        next,
    })
}

#[derive(Deserialize)]
struct ImportRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    player: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

async fn import_handler(
    cache: web::Data<GameCache>,
    request: web::Json<ImportRequest>,
) -> HttpResponse {
    let username = match request.username.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            return HttpResponse::BadRequest().json(json!({ "error": "username is required" }))
        }
    };
    let player = request
        .player
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(&username)
        .to_string();
    let source = request
        .source
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "chess.com".to_string());

    let target_path =
        storage::path_for_player(&player, cache.games_dir(), Some(source.as_str()));
    info!(username, player, source, "starting import");

    let import_user = username.clone();
    let import_source = source.clone();
    let result = web::block(move || -> Result<import::ImportSummary, ImportError> {
        if import_source == "lichess" {
            import::lichess::import_games(
                &import_user,
                &target_path,
                &import::lichess::LichessOptions::default(),
            )
        } else {
            import::chesscom::import_games(&import_user, &target_path)
        }
    })
    .await;

    match result {
        Ok(Ok(summary)) => {
            // The store write is durable at this point; only now may cached
            // views be dropped.
            cache.invalidate();
            HttpResponse::Ok().json(json!({
                "imported": summary.imported,
                "total": summary.total,
                "username": username,
                "player": player,
                "source": source,
            }))
        }
        Ok(Err(err)) => {
            error!(%err, "import failed");
            HttpResponse::InternalServerError().json(json!({ "error": err.to_string() }))
        }
        Err(err) => {
            error!(%err, "import task failed");
            HttpResponse::InternalServerError().json(json!({ "error": "import task failed" }))
        }
    }
}

async fn players(cache: web::Data<GameCache>) -> HttpResponse {
    let mut list: Vec<PlayerInfo> = Vec::new();
    if cache.legacy_path().is_some() {
        list.push(PlayerInfo {
            name: "default".to_string(),
            source: "legacy".to_string(),
        });
    }
    list.extend(storage::available_players(cache.games_dir()));
    HttpResponse::Ok().json(json!({ "players": list }))
}

/// The main entry point for the web server.
pub async fn start_server(
    port: u16,
    games_dir: PathBuf,
    legacy_path: Option<PathBuf>,
    frontend_dir: Option<PathBuf>,
) -> std::io::Result<()> {
    let cache = web::Data::new(GameCache::new(games_dir, legacy_path));
    info!(port, "starting server");

    HttpServer::new(move || {
        let mut app = App::new()
            .app_data(cache.clone())
            .route("/api/next-moves", web::post().to(next_moves))
            .route("/api/import", web::post().to(import_handler))
            .route("/api/players", web::get().to(players));
        if let Some(frontend) = frontend_dir.clone().filter(|dir| dir.is_dir()) {
            app = app.service(Files::new("/", frontend).index_file("index.html"));
        }
        app
    })
    .bind(("127.0.0.1", port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameRecord;
    use crate::trie::builder::build_color_tries;

    fn white_game(result: &str, moves: &[&str]) -> GameRecord {
        GameRecord {
            moves: moves.iter().map(|m| m.to_string()).collect(),
            result: Some(result.to_string()),
            color: Some(Color::White),
            ..GameRecord::default()
        }
    }

    fn view_of(games: Vec<GameRecord>) -> FilteredView {
        FilteredView {
            tries: build_color_tries(&games),
            games,
        }
    }

    #[test]
    fn test_fen_after_empty_path_is_start() {
        let fen = fen_after_path(&[]).unwrap();
        assert_eq!(
            fen,
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
        );
    }

    #[test]
    fn test_fen_rejects_illegal_san() {
        let err = fen_after_path(&["e4".to_string(), "e5".to_string(), "xx".to_string()])
            .unwrap_err();
        assert!(err.contains("xx"));
        assert!(fen_after_path(&["Ke2".to_string()]).is_err());
    }

    #[test]
    fn test_stats_and_next_sorted() {
        let view = view_of(vec![
            white_game("1-0", &["e4", "e5"]),
            white_game("0-1", &["e4", "c5"]),
            white_game("1-0", &["d4", "d5"]),
        ]);
        let (stats, next) = stats_and_next(&view.tries.white, &[]);
        assert_eq!(stats.total, 3);
        assert_eq!(next[0].mv, "e4");
        assert_eq!(next[0].stats.total, 2);
        assert_eq!(next[1].mv, "d4");

        let missing = ["h4".to_string()];
        let (empty_stats, empty_next) = stats_and_next(&view.tries.white, &missing);
        assert_eq!(empty_stats.total, 0);
        assert!(empty_next.is_empty());
    }

    #[test]
    fn test_choose_color_prefers_populated_side() {
        let white_heavy = view_of(vec![
            white_game("1-0", &["e4"]),
            white_game("1-0", &["d4"]),
        ]);
        assert_eq!(choose_color(None, &white_heavy), Color::White);
        // An explicit filter with no games on that side falls through to the
        // side that has any.
        assert_eq!(choose_color(Some(Color::Black), &white_heavy), Color::White);
    }
}
