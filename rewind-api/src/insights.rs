//! Insight assembly.
//!
//! Runs the stats pipeline, then fans out to the narrative model for the
//! story, achievements and alternate realities in parallel. Each branch
//! carries its own fallback, so one failed generation never sinks the
//! payload.

use crate::narrative::NarrativeClient;
use crate::riot::MatchRecord;
use crate::stats;
use crate::types::{AiInsights, PlayerInfo, ProcessedStats, WrappedData};
use chrono::Utc;
use tracing::{info, warn};

pub struct InsightsService {
    narrative: NarrativeClient,
}

impl InsightsService {
    pub fn new(narrative: NarrativeClient) -> Self {
        Self { narrative }
    }

    /// The full year-in-review payload for one player.
    pub async fn generate_full_wrapped(
        &self,
        matches: &[MatchRecord],
        puuid: &str,
        game_name: &str,
        tag_line: &str,
    ) -> WrappedData {
        info!(matches = matches.len(), "processing match history");
        let stats = stats::process_match_data(matches, puuid);
        let ai_insights = self.generate_insights(&stats).await;
        WrappedData {
            player_info: PlayerInfo {
                game_name: game_name.to_string(),
                tag_line: tag_line.to_string(),
                puuid: puuid.to_string(),
            },
            stats,
            ai_insights,
            generated_at: Utc::now().to_rfc3339(),
        }
    }

    /// The three generations run in parallel, each with its own fallback.
    pub async fn generate_insights(&self, stats: &ProcessedStats) -> AiInsights {
        let (story, achievements, alternate_realities) = tokio::join!(
            self.narrative.generate_wrapped_story(stats),
            self.narrative.generate_achievements(stats),
            self.narrative.generate_alternate_realities(stats),
        );
        AiInsights {
            story: story.unwrap_or_else(|err| {
                warn!(error = %err, "story generation failed");
                "Your League journey was epic this year!".to_string()
            }),
            achievements: achievements.unwrap_or_else(|err| {
                warn!(error = %err, "achievement generation failed");
                Vec::new()
            }),
            alternate_realities: alternate_realities.unwrap_or_else(|err| {
                warn!(error = %err, "alternate reality generation failed");
                Vec::new()
            }),
        }
    }
}
