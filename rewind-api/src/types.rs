//! Public wire types. Everything here serializes in camelCase, the service's
//! JSON dialect.

use serde::{Deserialize, Serialize};

/// One match from the player's point of view, flattened out of the raw
/// match record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedMatch {
    pub match_id: String,
    /// Game creation time, milliseconds since the Unix epoch.
    pub game_date: i64,
    pub win: bool,
    pub champion_name: String,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub kda: f64,
    pub vision_score: f64,
    pub gold_earned: i64,
    pub total_damage: i64,
    pub position: String,
    pub game_duration: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChampionStat {
    pub name: String,
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    /// Sum of per-match KDA values over all games on this champion.
    pub kda: f64,
    #[serde(rename = "avgKDA")]
    pub avg_kda: f64,
    pub total_kills: u32,
    pub total_deaths: u32,
    pub total_assists: u32,
}

/// Games per assigned lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct RoleStats {
    pub top: u32,
    pub jungle: u32,
    pub middle: u32,
    pub bottom: u32,
    pub utility: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPerformance {
    /// Calendar month in `YYYY-MM` form.
    pub month: String,
    pub games: u32,
    pub wins: u32,
    pub win_rate: f64,
    #[serde(rename = "avgKDA")]
    pub avg_kda: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakData {
    pub longest_win_streak: u32,
    pub longest_loss_streak: u32,
}

/// The single best game of the period, by KDA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakMoment {
    pub champion: String,
    pub kda: f64,
    /// RFC 3339 timestamp of the game.
    pub date: String,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TiltAnalysis {
    /// Share of games following a loss that were won, in percent.
    pub tilt_recovery_rate: f64,
    pub games_after_loss: u32,
    pub wins_after_loss: u32,
    pub avg_performance_after_loss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedStats {
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub streaks: StreakData,
    pub total_games: u32,
    pub kda_average: f64,
    pub vision_score: f64,
    pub tilt_patterns: TiltAnalysis,
    pub champion_stats: Vec<ChampionStat>,
    /// Absent when the player has no matches in the period.
    pub peak_performance: Option<PeakMoment>,
    pub role_distribution: RoleStats,
    pub performance_timeline: Vec<MonthlyPerformance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementCategory {
    Legendary,
    Quirky,
    Narrative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementRarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: AchievementCategory,
    pub rarity: AchievementRarity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternateReality {
    pub scenario: String,
    pub analysis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projected_win_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projected_rank: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiInsights {
    pub story: String,
    pub achievements: Vec<Achievement>,
    pub alternate_realities: Vec<AlternateReality>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub game_name: String,
    pub tag_line: String,
    pub puuid: String,
}

/// The full year-in-review payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedData {
    pub player_info: PlayerInfo,
    pub stats: ProcessedStats,
    pub ai_insights: AiInsights,
    /// RFC 3339 timestamp of when this payload was assembled.
    pub generated_at: String,
}
