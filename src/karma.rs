//! Value objects returned by the karma service, plus level arithmetic used by
//! the profile page.

use serde_derive::{Deserialize, Serialize};

pub const DEFAULT_RANK: &str = "Newcomer";
/// Karma required per level on the profile progress bar.
pub const POINTS_PER_LEVEL: u64 = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KarmaResponse {
    pub points: f64,
    pub level: u32,
    pub next_level_points: f64,
    #[serde(default)]
    pub badges: Vec<Badge>,
    pub rank: String,
}

impl Default for KarmaResponse {
    fn default() -> Self {
        Self {
            points: 0.0,
            level: 1,
            next_level_points: 100.0,
            badges: Vec::new(),
            rank: DEFAULT_RANK.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub earned: bool,
    #[serde(default)]
    pub points: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KarmaCashResponse {
    pub balance: f64,
    #[serde(default)]
    pub transactions: Vec<KarmaCashTransaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Earn,
    Redeem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KarmaCashTransaction {
    pub id: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardItem {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub points: f64,
    #[serde(default)]
    pub image: String,
}

/// Leaderboard rows are passed through untouched; the service owns their shape.
pub type LeaderboardEntry = serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub karma: u64,
    pub level: u32,
    pub next_level_points: u64,
    /// Rounded percentage; may exceed 100 when karma overshoots the target.
    pub percent: u32,
}

impl LevelProgress {
    pub fn new(karma: u64, level: u32) -> Self {
        let next_level_points = u64::from(level) * POINTS_PER_LEVEL;
        let percent = if next_level_points == 0 {
            100
        } else {
            ((karma as f64 / next_level_points as f64) * 100.0).round() as u32
        };
        Self {
            karma,
            level,
            next_level_points,
            percent,
        }
    }
}
