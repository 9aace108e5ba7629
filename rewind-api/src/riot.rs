//! Riot API client.
//!
//! Account, summoner and match-v5 lookups over a single configurable base
//! URL, authenticated with the `X-Riot-Token` header.

use crate::error::{ApiError, ApiResult};
use futures::future::join_all;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{debug, warn};

const TOKEN_HEADER: &str = "X-Riot-Token";

/// Riot API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiotConfig {
    /// API key sent with every request.
    pub api_key: String,
    /// Base URL for all endpoints (e.g. `https://americas.api.riotgames.com`).
    pub api_base_url: String,
    /// How many match ids to pull per player.
    pub match_count: u32,
}

impl Default for RiotConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: "https://americas.api.riotgames.com".to_string(),
            match_count: 100,
        }
    }
}

impl RiotConfig {
    /// Reads the configuration from `RIOT_API_KEY` and `RIOT_API_BASE_URL`.
    /// The key is required; the base URL falls back to the default.
    pub fn from_env() -> ApiResult<Self> {
        let api_key = env::var("RIOT_API_KEY")
            .map_err(|_| ApiError::Config("RIOT_API_KEY is not set".to_string()))?;
        let mut config = Self {
            api_key,
            ..Self::default()
        };
        if let Ok(base) = env::var("RIOT_API_BASE_URL") {
            config.api_base_url = base;
        }
        Ok(config)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

/// Riot account record, from account-v1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiotAccount {
    pub puuid: String,
    pub game_name: String,
    pub tag_line: String,
}

/// Summoner record, from summoner-v4. Only the fields the service reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summoner {
    pub puuid: String,
    pub profile_icon_id: i32,
    pub summoner_level: i64,
}

/// Full match record, from match-v5. Only the fields the service reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub metadata: MatchMetadata,
    pub info: MatchInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchMetadata {
    pub match_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    pub game_creation: i64,
    pub game_duration: i64,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub puuid: String,
    pub win: bool,
    pub champion_name: String,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub vision_score: f64,
    pub gold_earned: i64,
    pub total_damage_dealt_to_champions: i64,
    pub team_position: String,
}

/// One entry of the routing table served by `/api/regions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub id: &'static str,
    pub name: &'static str,
    pub routing: &'static str,
}

/// The supported platforms and the regional route each one maps to.
pub fn regions() -> Vec<Region> {
    vec![
        Region { id: "na1", name: "North America", routing: "americas" },
        Region { id: "br1", name: "Brazil", routing: "americas" },
        Region { id: "la1", name: "Latin America North", routing: "americas" },
        Region { id: "la2", name: "Latin America South", routing: "americas" },
        Region { id: "euw1", name: "Europe West", routing: "europe" },
        Region { id: "eun1", name: "Europe Nordic & East", routing: "europe" },
        Region { id: "tr1", name: "Turkey", routing: "europe" },
        Region { id: "ru", name: "Russia", routing: "europe" },
        Region { id: "kr", name: "Korea", routing: "asia" },
        Region { id: "jp1", name: "Japan", routing: "asia" },
        Region { id: "oc1", name: "Oceania", routing: "sea" },
    ]
}

// ── Client ───────────────────────────────────────────────────────────────

pub struct RiotClient {
    config: RiotConfig,
    client: Client,
}

impl RiotClient {
    pub fn new(config: RiotConfig) -> ApiResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { config, client })
    }

    /// Resolves a `gameName#tagLine` handle to an account. An unknown handle
    /// is [`ApiError::SummonerNotFound`].
    pub async fn account_by_riot_id(
        &self,
        game_name: &str,
        tag_line: &str,
    ) -> ApiResult<RiotAccount> {
        let url = format!(
            "{}/riot/account/v1/accounts/by-riot-id/{game_name}/{tag_line}",
            self.config.api_base_url
        );
        self.get_json(url, true).await
    }

    /// Fetches summoner level and profile icon for a resolved player.
    pub async fn summoner_by_puuid(&self, puuid: &str) -> ApiResult<Summoner> {
        let url = format!(
            "{}/lol/summoner/v4/summoners/by-puuid/{puuid}",
            self.config.api_base_url
        );
        self.get_json(url, true).await
    }

    /// The player's most recent match ids, newest first.
    pub async fn match_ids(&self, puuid: &str) -> ApiResult<Vec<String>> {
        let url = format!(
            "{}/lol/match/v5/matches/by-puuid/{puuid}/ids?start=0&count={}",
            self.config.api_base_url, self.config.match_count
        );
        self.get_json(url, false).await
    }

    /// One full match record.
    pub async fn match_detail(&self, match_id: &str) -> ApiResult<MatchRecord> {
        let url = format!(
            "{}/lol/match/v5/matches/{match_id}",
            self.config.api_base_url
        );
        self.get_json(url, false).await
    }

    /// Fetches the id list, then every match record concurrently. A failed
    /// detail fetch is logged and dropped; the surviving records come back
    /// in id order.
    pub async fn all_matches(&self, puuid: &str) -> ApiResult<Vec<MatchRecord>> {
        let ids = self.match_ids(puuid).await?;
        debug!(count = ids.len(), "fetching match details");
        let fetches = ids.iter().map(|id| self.match_detail(id));
        let results = join_all(fetches).await;
        let mut matches = Vec::with_capacity(results.len());
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(record) => matches.push(record),
                Err(err) => {
                    warn!(match_id = %id, error = %err, "match fetch failed, skipping");
                }
            }
        }
        Ok(matches)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        not_found_is_missing_player: bool,
    ) -> ApiResult<T> {
        let response = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, &self.config.api_key)
            .send()
            .await?;
        if not_found_is_missing_player && response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::SummonerNotFound);
        }
        if !response.status().is_success() {
            return Err(ApiError::UpstreamStatus {
                service: "riot",
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_table_covers_the_major_shards() {
        let table = regions();
        let na = table.iter().find(|r| r.id == "na1").unwrap();
        assert_eq!(na.routing, "americas");
        let kr = table.iter().find(|r| r.id == "kr").unwrap();
        assert_eq!(kr.routing, "asia");
        assert!(table.iter().any(|r| r.id == "euw1"));
    }

    #[test]
    fn config_defaults_point_at_the_public_api() {
        let config = RiotConfig::default();
        assert_eq!(config.api_base_url, "https://americas.api.riotgames.com");
        assert_eq!(config.match_count, 100);
        assert!(config.api_key.is_empty());
    }
}
