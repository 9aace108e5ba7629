//! Gemini narrative client.
//!
//! Produces the year-end story, achievements and "what if" scenarios from
//! aggregated stats. Model output is free text; the JSON payload inside it
//! is cut out between the first `[` and the last `]`, and anything that
//! fails to parse falls back to deterministic defaults.

use crate::error::{ApiError, ApiResult};
use crate::types::{
    Achievement, AchievementCategory, AchievementRarity, AlternateReality, ProcessedStats,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::time::Duration;
use tracing::warn;

/// Narrative model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    /// API key appended to every request.
    pub api_key: String,
    /// Base URL (e.g. `https://generativelanguage.googleapis.com`).
    pub api_base_url: String,
    /// Model id used for all generations.
    pub model: String,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash".to_string(),
        }
    }
}

impl NarrativeConfig {
    /// Reads the configuration from `GOOGLE_API_KEY`, `GOOGLE_AI_BASE_URL`
    /// and `GOOGLE_AI_MODEL`. Only the key is required.
    pub fn from_env() -> ApiResult<Self> {
        let api_key = env::var("GOOGLE_API_KEY")
            .map_err(|_| ApiError::Config("GOOGLE_API_KEY is not set".to_string()))?;
        let mut config = Self {
            api_key,
            ..Self::default()
        };
        if let Ok(base) = env::var("GOOGLE_AI_BASE_URL") {
            config.api_base_url = base;
        }
        if let Ok(model) = env::var("GOOGLE_AI_MODEL") {
            config.model = model;
        }
        Ok(config)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// The shape the model is asked to produce for achievements. Ids are
/// assigned on this side.
#[derive(Debug, Deserialize)]
struct GeneratedAchievement {
    title: String,
    description: String,
    category: AchievementCategory,
    rarity: AchievementRarity,
    #[serde(default)]
    icon: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────────

pub struct NarrativeClient {
    config: NarrativeConfig,
    client: Client,
}

impl NarrativeClient {
    pub fn new(config: NarrativeConfig) -> ApiResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self { config, client })
    }

    /// Probes the model with a trivial prompt. False when the call fails or
    /// the reply carries no text.
    pub async fn health(&self) -> bool {
        match self.invoke("Hi, how are you?").await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "narrative health probe failed");
                false
            }
        }
    }

    /// A short, shareable recap story. The model's text comes back as-is.
    pub async fn generate_wrapped_story(&self, stats: &ProcessedStats) -> ApiResult<String> {
        let top = stats.champion_stats.first();
        let top_name = top.map_or("Unknown", |c| c.name.as_str());
        let top_games = top.map_or(0, |c| c.games);
        let (peak_kda, peak_champion) = match &stats.peak_performance {
            Some(peak) => (peak.kda, peak.champion.as_str()),
            None => (0.0, "Unknown"),
        };
        let prompt = format!(
            "You are a creative storyteller for League of Legends players. Create an engaging, personalized year-end recap story based on these stats:\n\n\
             Total Games: {}\n\
             Win Rate: {:.1}%\n\
             Most Played Champion: {top_name} ({top_games} games)\n\
             Average KDA: {:.2}\n\
             Longest Win Streak: {}\n\
             Peak Performance: {peak_kda:.2} KDA on {peak_champion}\n\n\
             Write a short, exciting narrative (3-4 paragraphs, max 200 words) that celebrates their journey. \
             Make it personal, epic, and shareable. Include specific numbers naturally in the story. \
             Use an enthusiastic tone.",
            stats.total_games, stats.win_rate, stats.kda_average, stats.streaks.longest_win_streak
        );
        self.invoke(&prompt).await
    }

    /// Five creative achievements. Unparseable model output falls back to a
    /// deterministic set derived from the stats.
    pub async fn generate_achievements(
        &self,
        stats: &ProcessedStats,
    ) -> ApiResult<Vec<Achievement>> {
        let top_champions = stats
            .champion_stats
            .iter()
            .take(3)
            .map(|c| format!("{} ({} games)", c.name, c.games))
            .collect::<Vec<_>>()
            .join(", ");
        let prompt = format!(
            "Based on these League of Legends stats, generate 5 unique, creative achievements. \
             Mix impressive accomplishments with quirky observations:\n\n\
             Stats:\n\
             - Total Games: {}\n\
             - Win Rate: {:.1}%\n\
             - Top Champions: {top_champions}\n\
             - Longest Win Streak: {}\n\
             - Average Vision Score: {:.1}\n\
             - Tilt Recovery Rate: {:.1}%\n\n\
             Return ONLY a valid JSON array with this exact structure (no markdown, no extra text):\n\
             [\n  {{\n    \"title\": \"Achievement Name\",\n    \"description\": \"Fun description with specific numbers\",\n    \"category\": \"legendary\",\n    \"rarity\": \"epic\"\n  }}\n]\n\n\
             Categories: legendary, quirky, narrative\n\
             Rarities: common, rare, epic, legendary",
            stats.total_games,
            stats.win_rate,
            stats.streaks.longest_win_streak,
            stats.vision_score,
            stats.tilt_patterns.tilt_recovery_rate
        );
        let response = self.invoke(&prompt).await?;
        Ok(parse_achievements(&response).unwrap_or_else(|| {
            warn!("could not parse achievements from model output, using defaults");
            default_achievements(stats)
        }))
    }

    /// Three "what if" projections. Unparseable model output falls back to a
    /// deterministic set derived from the stats.
    pub async fn generate_alternate_realities(
        &self,
        stats: &ProcessedStats,
    ) -> ApiResult<Vec<AlternateReality>> {
        let top = stats.champion_stats.first();
        let top_name = top.map_or("Unknown", |c| c.name.as_str());
        let top_win_rate = top.map_or(stats.win_rate, |c| c.win_rate);
        let scenarios = [
            format!("What if you only played {top_name} (your most played champion) all year?"),
            "What if you never played after a loss to avoid tilt?".to_string(),
            "What if you only played during your peak performance hours?".to_string(),
        ];
        let prompt = format!(
            "Analyze this League of Legends player's data and create \"what if\" alternate reality scenarios.\n\n\
             Current Stats:\n\
             - Win Rate: {:.1}%\n\
             - Most Played: {top_name} ({top_win_rate:.1}% WR)\n\
             - Tilt Recovery: {:.1}%\n\n\
             For each scenario, provide a realistic projection. Return ONLY valid JSON array:\n\
             [\n  {{\n    \"scenario\": \"{}\",\n    \"analysis\": \"Brief analysis (50 words max)\",\n    \"projectedWinRate\": 65.0\n  }},\n  {{\n    \"scenario\": \"{}\",\n    \"analysis\": \"Brief analysis (50 words max)\",\n    \"projectedWinRate\": 62.0\n  }},\n  {{\n    \"scenario\": \"{}\",\n    \"analysis\": \"Brief analysis (50 words max)\",\n    \"projectedWinRate\": 68.0\n  }}\n]",
            stats.win_rate,
            stats.tilt_patterns.tilt_recovery_rate,
            scenarios[0],
            scenarios[1],
            scenarios[2]
        );
        let response = self.invoke(&prompt).await?;
        Ok(parse_alternate_realities(&response).unwrap_or_else(|| {
            warn!("could not parse alternate realities from model output, using defaults");
            default_alternate_realities(stats)
        }))
    }

    async fn invoke(&self, prompt: &str) -> ApiResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.api_base_url, self.config.model, self.config.api_key
        );
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::UpstreamStatus {
                service: "google-ai",
                status: response.status().as_u16(),
            });
        }
        let payload: GenerateContentResponse = response.json().await?;
        payload
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| ApiError::Narrative("model response carried no text".to_string()))
    }
}

// ── Parsing and fallbacks ────────────────────────────────────────────────

/// The widest bracketed slice of the text, so prose around the array is
/// tolerated.
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end >= start).then(|| &text[start..=end])
}

fn parse_achievements(text: &str) -> Option<Vec<Achievement>> {
    let raw = extract_json_array(text)?;
    let generated: Vec<GeneratedAchievement> = serde_json::from_str(raw).ok()?;
    Some(
        generated
            .into_iter()
            .enumerate()
            .map(|(index, a)| Achievement {
                id: format!("achievement-{index}"),
                title: a.title,
                description: a.description,
                category: a.category,
                rarity: a.rarity,
                icon: a.icon,
            })
            .collect(),
    )
}

fn parse_alternate_realities(text: &str) -> Option<Vec<AlternateReality>> {
    let raw = extract_json_array(text)?;
    serde_json::from_str(raw).ok()
}

fn default_achievements(stats: &ProcessedStats) -> Vec<Achievement> {
    let top = stats.champion_stats.first();
    let top_name = top.map_or("Unknown", |c| c.name.as_str());
    let top_games = top.map_or(0, |c| c.games);
    vec![
        Achievement {
            id: "achievement-1".to_string(),
            title: "The Grinder".to_string(),
            description: format!("Played {} games this year", stats.total_games),
            category: AchievementCategory::Narrative,
            rarity: AchievementRarity::Common,
            icon: None,
        },
        Achievement {
            id: "achievement-2".to_string(),
            title: "Champion Specialist".to_string(),
            description: format!("{top_games} games on {top_name}"),
            category: AchievementCategory::Legendary,
            rarity: AchievementRarity::Rare,
            icon: None,
        },
        Achievement {
            id: "achievement-3".to_string(),
            title: "Win Streak Legend".to_string(),
            description: format!("{} game win streak", stats.streaks.longest_win_streak),
            category: AchievementCategory::Legendary,
            rarity: AchievementRarity::Epic,
            icon: None,
        },
        Achievement {
            id: "achievement-4".to_string(),
            title: "Vision Master".to_string(),
            description: format!("{:.0} average vision score", stats.vision_score),
            category: AchievementCategory::Quirky,
            rarity: AchievementRarity::Rare,
            icon: None,
        },
        Achievement {
            id: "achievement-5".to_string(),
            title: "Comeback King".to_string(),
            description: format!(
                "{:.0}% win rate after losses",
                stats.tilt_patterns.tilt_recovery_rate
            ),
            category: AchievementCategory::Narrative,
            rarity: AchievementRarity::Epic,
            icon: None,
        },
    ]
}

fn default_alternate_realities(stats: &ProcessedStats) -> Vec<AlternateReality> {
    let top = stats.champion_stats.first();
    let top_name = top.map_or("Unknown", |c| c.name.as_str());
    let top_win_rate = top.map_or(stats.win_rate, |c| c.win_rate);
    vec![
        AlternateReality {
            scenario: format!("What if you only played {top_name}?"),
            analysis: format!(
                "Based on your {top_win_rate:.1}% win rate, you might have climbed higher."
            ),
            projected_win_rate: Some(top_win_rate),
            projected_rank: None,
        },
        AlternateReality {
            scenario: "What if you avoided tilt?".to_string(),
            analysis: "Taking breaks after losses could improve mental performance.".to_string(),
            projected_win_rate: Some(stats.win_rate + 5.0),
            projected_rank: None,
        },
        AlternateReality {
            scenario: "What if you played at peak hours?".to_string(),
            analysis: "Optimal play times could boost your consistency.".to_string(),
            projected_win_rate: Some(stats.win_rate + 3.0),
            projected_rank: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_array_is_found_between_the_outermost_brackets() {
        let text = "Here you go:\n[{\"a\": 1}]\nEnjoy!";
        assert_eq!(extract_json_array(text), Some("[{\"a\": 1}]"));
        assert_eq!(extract_json_array("no array here"), None);
        assert_eq!(extract_json_array("] backwards ["), None);
    }

    #[test]
    fn parsed_achievements_are_numbered_from_zero() {
        let text = r#"[
            {"title": "A", "description": "a", "category": "quirky", "rarity": "rare"},
            {"title": "B", "description": "b", "category": "legendary", "rarity": "epic"}
        ]"#;
        let parsed = parse_achievements(text).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].id, "achievement-0");
        assert_eq!(parsed[1].id, "achievement-1");
        assert_eq!(parsed[1].title, "B");
    }

    #[test]
    fn malformed_payloads_fall_back_to_none() {
        assert!(parse_achievements("[{\"title\": 3}]").is_none());
        assert!(parse_alternate_realities("not json").is_none());
    }
}
