// src/game/mod.rs

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which side the tracked player had in a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }

    pub fn other(&self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

impl FromStr for Color {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(Color::White),
            "black" | "b" => Ok(Color::Black),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-control bucket a game is classified into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeControl {
    Bullet,
    Blitz,
    Rapid,
    Classical,
    Daily,
}

impl TimeControl {
    /// Classify a raw time-control string such as "600+5" or "1/86400".
    ///
    /// Total time is approximated as base + 40 * increment, the convention
    /// inherited from chess.com. This is a heuristic, not a verified
    /// classification; the exact thresholds are preserved for compatibility:
    /// daily when the string is correspondence-style ("/") or total >= 86400s,
    /// bullet < 180s, blitz < 600s, rapid < 3600s, classical otherwise.
    /// Empty or malformed strings classify as rapid.
    pub fn classify(raw: &str) -> TimeControl {
        if raw.is_empty() {
            return TimeControl::Rapid;
        }
        if raw.contains('/') {
            return TimeControl::Daily;
        }
        let mut parts = raw.split('+');
        let base: u64 = match parts.next().and_then(|p| p.parse().ok()) {
            Some(b) => b,
            None => return TimeControl::Rapid,
        };
        let inc: u64 = match parts.next() {
            Some(p) => match p.parse() {
                Ok(i) => i,
                Err(_) => return TimeControl::Rapid,
            },
            None => 0,
        };

        let total = base + 40 * inc;
        if total >= 86_400 {
            TimeControl::Daily
        } else if total < 180 {
            TimeControl::Bullet
        } else if total < 600 {
            TimeControl::Blitz
        } else if total < 3600 {
            TimeControl::Rapid
        } else {
            TimeControl::Classical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeControl::Bullet => "bullet",
            TimeControl::Blitz => "blitz",
            TimeControl::Rapid => "rapid",
            TimeControl::Classical => "classical",
            TimeControl::Daily => "daily",
        }
    }
}

impl FromStr for TimeControl {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bullet" => Ok(TimeControl::Bullet),
            "blitz" => Ok(TimeControl::Blitz),
            "rapid" => Ok(TimeControl::Rapid),
            "classical" => Ok(TimeControl::Classical),
            "daily" | "correspondence" => Ok(TimeControl::Daily),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One imported game as stored in the per-player JSON files.
///
/// Every field except the move list is optional: records come from several
/// sources and older store files may miss fields. Unrecognized values for the
/// typed fields (color, date, time control) deserialize to `None` instead of
/// failing the whole store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    #[serde(default)]
    pub game_id: Option<String>,
    #[serde(default)]
    pub moves: Vec<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub color: Option<Color>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub opponent: Option<String>,
    #[serde(default)]
    pub my_rating: Option<u32>,
    #[serde(default)]
    pub opponent_rating: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub time_control: Option<TimeControl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_control_raw: Option<String>,
    #[serde(default)]
    pub termination: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Deserialize a `FromStr` field, mapping missing or unrecognized values to `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

/// Deserialize an ISO date, mapping missing or malformed values to `None`.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_control_label_buckets() {
        assert_eq!(TimeControl::classify("60+0"), TimeControl::Bullet);
        assert_eq!(TimeControl::classify("600+0"), TimeControl::Rapid);
        assert_eq!(TimeControl::classify("1/86400"), TimeControl::Daily);
        assert_eq!(TimeControl::classify("180+10"), TimeControl::Blitz);
        assert_eq!(TimeControl::classify("3600"), TimeControl::Classical);
        assert_eq!(TimeControl::classify("86400"), TimeControl::Daily);
    }

    #[test]
    fn test_time_control_malformed_defaults_to_rapid() {
        assert_eq!(TimeControl::classify(""), TimeControl::Rapid);
        assert_eq!(TimeControl::classify("abc"), TimeControl::Rapid);
        assert_eq!(TimeControl::classify("300+x"), TimeControl::Rapid);
    }

    #[test]
    fn test_record_roundtrip() {
        let json = r#"{
            "game_id": "12345",
            "moves": ["e4", "e5"],
            "result": "1-0",
            "color": "white",
            "date": "2024-03-01",
            "opponent": "rival",
            "my_rating": 1500,
            "opponent_rating": 1480,
            "time_control": "blitz",
            "termination": "resignation",
            "url": "https://example.com/game/12345"
        }"#;
        let record: GameRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.color, Some(Color::White));
        assert_eq!(record.time_control, Some(TimeControl::Blitz));
        assert_eq!(
            record.date,
            Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );

        let back = serde_json::to_string(&record).unwrap();
        let again: GameRecord = serde_json::from_str(&back).unwrap();
        assert_eq!(record, again);
    }

    #[test]
    fn test_record_tolerates_gaps_and_junk() {
        let json = r#"{
            "moves": ["d4"],
            "color": "purple",
            "date": "not-a-date",
            "time_control": "hyperbullet"
        }"#;
        let record: GameRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.color, None);
        assert_eq!(record.date, None);
        assert_eq!(record.time_control, None);
        assert_eq!(record.moves, vec!["d4".to_string()]);
    }
}
