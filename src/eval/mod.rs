// src/eval/mod.rs

use crate::constants::{CLOUD_EVAL_TIMEOUT_SECS, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

/// Why a cloud evaluation could not be produced. Every variant maps to a
/// cached "unavailable" sentinel; only `Network` is considered transient.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EvalFetchError {
    #[error("position not cached on lichess")]
    NotFound,
    #[error("rate limited")]
    RateLimited,
    #[error("http {0}")]
    Http(u16),
    #[error("network error")]
    Network,
    #[error("bad response")]
    BadResponse,
}

/// A successful cloud evaluation: centipawns or a forced mate, with the
/// search depth it was reported at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudEval {
    pub cp: Option<i64>,
    pub mate: Option<i64>,
    pub depth: Option<u32>,
}

impl CloudEval {
    pub fn format(&self) -> String {
        let depth_part = match self.depth {
            Some(depth) => format!(" depth {depth}"),
            None => String::new(),
        };
        if let Some(mate) = self.mate {
            return format!("#{mate}{depth_part}");
        }
        if let Some(cp) = self.cp {
            return format!("{:.2}{depth_part}", cp as f64 / 100.0);
        }
        "eval unavailable".to_string()
    }
}

/// One cached lookup outcome. Failures are stored just like scores so that
/// repeated queries for the same position fail fast instead of re-hammering
/// the provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StoredEval {
    Score(CloudEval),
    Unavailable { reason: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct EvalEntry {
    ts: u64,
    #[serde(flatten)]
    value: StoredEval,
}

impl EvalEntry {
    fn format(&self) -> String {
        match &self.value {
            StoredEval::Score(eval) => eval.format(),
            StoredEval::Unavailable { reason } => format!("eval unavailable ({reason})"),
        }
    }
}

/// Source of cloud evaluations. Implementations perform exactly one request
/// per call; any retry policy lives in the cache.
pub trait EvalProvider: Send + Sync {
    fn fetch(&self, fen: &str) -> Result<CloudEval, EvalFetchError>;
}

/// TTL-bounded FEN -> evaluation cache with best-effort JSON persistence.
/// A corrupt or missing cache file loads as an empty cache.
pub struct EvalCache {
    path: PathBuf,
    ttl: Duration,
    provider: Box<dyn EvalProvider>,
    entries: Mutex<HashMap<String, EvalEntry>>,
}

impl EvalCache {
    pub fn new(path: PathBuf, ttl: Duration, provider: Box<dyn EvalProvider>) -> EvalCache {
        let entries = match fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(%err, "eval cache file is corrupt, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        EvalCache {
            path,
            ttl,
            provider,
            entries: Mutex::new(entries),
        }
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn is_fresh(&self, entry: &EvalEntry) -> bool {
        Self::now_secs().saturating_sub(entry.ts) <= self.ttl.as_secs()
    }

    /// Cached, non-expired evaluation string for `fen`, if any. An expired
    /// entry is treated as absent.
    pub fn get(&self, fen: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(fen)
            .filter(|entry| self.is_fresh(entry))
            .map(EvalEntry::format)
    }

    /// Return the cached evaluation, or perform one provider lookup and cache
    /// the outcome, success or failure, with the current timestamp. Only a
    /// transient network error is retried, and only once.
    pub fn fetch_and_cache(&self, fen: &str) -> String {
        if let Some(cached) = self.get(fen) {
            return cached;
        }

        let result = match self.provider.fetch(fen) {
            Err(EvalFetchError::Network) => {
                debug!(fen, "transient network error, retrying once");
                self.provider.fetch(fen)
            }
            other => other,
        };

        let value = match result {
            Ok(eval) => StoredEval::Score(eval),
            Err(err) => StoredEval::Unavailable {
                reason: err.to_string(),
            },
        };
        let entry = EvalEntry {
            ts: Self::now_secs(),
            value,
        };
        let formatted = entry.format();

        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.insert(fen.to_string(), entry);
            self.persist(&entries);
        }
        formatted
    }

    /// Best-effort write-through; a failed write only logs.
    fn persist(&self, entries: &HashMap<String, EvalEntry>) {
        if let Some(parent) = self.path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!(%err, "could not create eval cache directory");
                return;
            }
        }
        match serde_json::to_string_pretty(entries) {
            Ok(json) => {
                if let Err(err) = fs::write(&self.path, json) {
                    warn!(%err, "could not write eval cache");
                }
            }
            Err(err) => warn!(%err, "could not serialize eval cache"),
        }
    }
}

/// Lichess cloud evaluation endpoint, with a bounded request timeout.
pub struct LichessEvalProvider {
    client: reqwest::blocking::Client,
}

#[derive(Deserialize)]
struct CloudEvalResponse {
    #[serde(default)]
    depth: Option<u32>,
    #[serde(default)]
    pvs: Vec<CloudEvalPv>,
}

#[derive(Deserialize)]
struct CloudEvalPv {
    #[serde(default)]
    cp: Option<i64>,
    #[serde(default)]
    mate: Option<i64>,
}

impl LichessEvalProvider {
    pub fn new() -> Result<LichessEvalProvider, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(CLOUD_EVAL_TIMEOUT_SECS))
            .build()?;
        Ok(LichessEvalProvider { client })
    }
}

impl EvalProvider for LichessEvalProvider {
    fn fetch(&self, fen: &str) -> Result<CloudEval, EvalFetchError> {
        let response = self
            .client
            .get("https://lichess.org/api/cloud-eval")
            .query(&[("fen", fen)])
            .send()
            .map_err(|_| EvalFetchError::Network)?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(EvalFetchError::NotFound);
        }
        if status.as_u16() == 429 {
            return Err(EvalFetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(EvalFetchError::Http(status.as_u16()));
        }

        let payload: CloudEvalResponse =
            response.json().map_err(|_| EvalFetchError::BadResponse)?;
        let best = payload.pvs.first().ok_or(EvalFetchError::BadResponse)?;
        Ok(CloudEval {
            cp: best.cp,
            mate: best.mate,
            depth: payload.depth,
        })
    }
}
