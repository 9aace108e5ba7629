//! End-to-end API tests: a real server over mock upstreams and an
//! in-memory store.

use pretty_assertions::assert_eq;
use rewind_api::accounts::{account_service, AccountService, NewAccount};
use rewind_api::{
    build_router, AppState, InsightsService, NarrativeClient, NarrativeConfig, RiotClient,
    RiotConfig,
};
use rewind_storage::SqliteStore;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestApp {
    address: String,
    riot: MockServer,
    model: MockServer,
    accounts: AccountService,
}

async fn spawn_app() -> TestApp {
    let riot = MockServer::start().await;
    let model = MockServer::start().await;

    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let accounts = account_service(store);
    accounts.prepare().await.unwrap();

    let riot_client = RiotClient::new(RiotConfig {
        api_key: "test-key".to_string(),
        api_base_url: riot.uri(),
        match_count: 5,
    })
    .unwrap();
    let narrative = NarrativeClient::new(NarrativeConfig {
        api_key: "test-key".to_string(),
        api_base_url: model.uri(),
        model: "gemini-2.5-flash".to_string(),
    })
    .unwrap();

    let app = build_router(AppState {
        riot: Arc::new(riot_client),
        insights: Arc::new(InsightsService::new(narrative)),
        accounts: accounts.clone(),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        riot,
        model,
        accounts,
    }
}

async fn mount_account(riot: &MockServer, game_name: &str, tag_line: &str, puuid: &str) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/riot/account/v1/accounts/by-riot-id/{game_name}/{tag_line}"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "puuid": puuid,
            "gameName": game_name,
            "tagLine": tag_line
        })))
        .mount(riot)
        .await;
}

fn match_body(id: &str, puuid: &str, win: bool) -> Value {
    json!({
        "metadata": { "matchId": id },
        "info": {
            "gameCreation": 1_705_276_800_000_i64,
            "gameDuration": 1847,
            "participants": [{
                "puuid": puuid,
                "win": win,
                "championName": "Ahri",
                "kills": 6,
                "deaths": 3,
                "assists": 9,
                "visionScore": 31.5,
                "goldEarned": 13250,
                "totalDamageDealtToChampions": 21400,
                "teamPosition": "MIDDLE"
            }]
        }
    })
}

/// Mounts the id list plus one detail route per match, alternating
/// win/loss starting with a win.
async fn mount_history(riot: &MockServer, puuid: &str, ids: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/lol/match/v5/matches/by-puuid/{puuid}/ids")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(ids)))
        .mount(riot)
        .await;
    for (index, id) in ids.iter().enumerate() {
        Mock::given(method("GET"))
            .and(path(format!("/lol/match/v5/matches/{id}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(match_body(id, puuid, index % 2 == 0)),
            )
            .mount(riot)
            .await;
    }
}

async fn mount_model_reply(model: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [ { "content": { "parts": [ { "text": text } ] } } ]
        })))
        .mount(model)
        .await;
}

// ─── Plumbing ────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_ok_with_a_timestamp() {
    let app = spawn_app().await;

    let response = reqwest::get(format!("{}/health", app.address)).await.unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn regions_ride_the_success_envelope() {
    let app = spawn_app().await;

    let body: Value = reqwest::get(format!("{}/api/regions", app.address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    let data = body["data"].as_array().unwrap();
    assert!(data.iter().any(|r| r["id"] == "kr" && r["routing"] == "asia"));
    assert!(data.iter().any(|r| r["id"] == "euw1" && r["routing"] == "europe"));
}

#[tokio::test]
async fn unknown_routes_return_the_404_body() {
    let app = spawn_app().await;

    let response = reqwest::get(format!("{}/api/nope", app.address)).await.unwrap();

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Route not found" }));
}

// ─── Validation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn validate_confirms_an_existing_summoner() {
    let app = spawn_app().await;
    mount_account(&app.riot, "Faker", "KR1", "puuid-faker").await;
    Mock::given(method("GET"))
        .and(path("/lol/summoner/v4/summoners/by-puuid/puuid-faker"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "puuid": "puuid-faker",
            "profileIconId": 29,
            "summonerLevel": 342
        })))
        .mount(&app.riot)
        .await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/validate", app.address))
        .json(&json!({ "gameName": "Faker", "tagLine": "KR1", "region": "kr" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "success": true,
            "data": { "exists": true, "puuid": "puuid-faker", "level": 342, "icon": 29 }
        })
    );
}

#[tokio::test]
async fn a_missing_summoner_is_a_404_with_a_code() {
    let app = spawn_app().await;
    Mock::given(method("GET"))
        .and(path("/riot/account/v1/accounts/by-riot-id/Nobody/NA1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&app.riot)
        .await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/validate", app.address))
        .json(&json!({ "gameName": "Nobody", "tagLine": "NA1" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "success": false,
            "error": "Summoner not found",
            "code": "SUMMONER_NOT_FOUND"
        })
    );
}

// ─── Stats and wrapped ───────────────────────────────────────────────────

#[tokio::test]
async fn quick_stats_aggregates_without_touching_the_model() {
    let app = spawn_app().await;
    mount_account(&app.riot, "Faker", "KR1", "puuid-faker").await;
    mount_history(&app.riot, "puuid-faker", &["KR_1", "KR_2"]).await;

    let body: Value = reqwest::Client::new()
        .post(format!("{}/api/quick-stats", app.address))
        .json(&json!({ "gameName": "Faker", "tagLine": "KR1" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    let stats = &body["data"];
    assert_eq!(stats["totalGames"], 2);
    assert_eq!(stats["wins"], 1);
    assert_eq!(stats["winRate"], 50.0);
    assert_eq!(stats["championStats"][0]["name"], "Ahri");

    let model_hits = app.model.received_requests().await.unwrap();
    assert!(model_hits.is_empty());
}

#[tokio::test]
async fn generate_wrapped_composes_the_full_payload_and_indexes_the_account() {
    let app = spawn_app().await;
    mount_account(&app.riot, "Faker", "KR1", "puuid-faker").await;
    mount_history(&app.riot, "puuid-faker", &["KR_1", "KR_2"]).await;
    // The same prose answers all three generations: the story passes
    // through, the array payloads fall back to their defaults.
    mount_model_reply(&app.model, "A legendary year!").await;

    let body: Value = reqwest::Client::new()
        .post(format!("{}/api/generate-wrapped", app.address))
        .json(&json!({ "gameName": "Faker", "tagLine": "KR1" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(
        data["playerInfo"],
        json!({ "gameName": "Faker", "tagLine": "KR1", "puuid": "puuid-faker" })
    );
    assert_eq!(data["stats"]["totalGames"], 2);
    assert_eq!(data["aiInsights"]["story"], "A legendary year!");
    assert_eq!(data["aiInsights"]["achievements"].as_array().unwrap().len(), 5);
    assert_eq!(data["aiInsights"]["achievements"][0]["id"], "achievement-1");
    assert_eq!(
        data["aiInsights"]["alternateRealities"].as_array().unwrap().len(),
        3
    );
    assert!(data["generatedAt"].is_string());

    // The pull was recorded in the accounts collection.
    let listed: Value = reqwest::get(format!("{}/api/accounts?gameName=Faker", app.address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let payload = listed["data"]["payload"].as_array().unwrap();
    assert_eq!(payload.len(), 1);
    assert_eq!(payload[0]["puuid"], "puuid-faker");
    assert_eq!(payload[0]["matchIds"], json!(["KR_1", "KR_2"]));
}

#[tokio::test]
async fn a_model_outage_still_returns_the_wrapped_payload() {
    let app = spawn_app().await;
    mount_account(&app.riot, "Faker", "KR1", "puuid-faker").await;
    mount_history(&app.riot, "puuid-faker", &["KR_1"]).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.model)
        .await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/generate-wrapped", app.address))
        .json(&json!({ "gameName": "Faker", "tagLine": "KR1" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let insights = &body["data"]["aiInsights"];
    assert_eq!(insights["story"], "Your League journey was epic this year!");
    assert_eq!(insights["achievements"], json!([]));
    assert_eq!(insights["alternateRealities"], json!([]));
}

// ─── Account listing ─────────────────────────────────────────────────────

async fn seed_accounts(accounts: &AccountService, count: usize) {
    for index in 1..=count {
        let payload = NewAccount {
            puuid: format!("puuid-{index}"),
            game_name: format!("Player{index}"),
            tag_line: "NA1".to_string(),
            match_ids: Vec::new(),
        };
        accounts.create(&payload, &[]).await.unwrap();
    }
}

#[tokio::test]
async fn account_listing_pages_with_defaults() {
    let app = spawn_app().await;
    seed_accounts(&app.accounts, 7).await;

    let first: Value = reqwest::get(format!("{}/api/accounts", app.address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(first["success"], true);
    assert_eq!(first["data"]["payload"].as_array().unwrap().len(), 5);
    assert_eq!(
        first["data"]["meta"],
        json!({ "page": 1, "total": 7, "pageSize": 5, "totalPages": 2 })
    );

    let second: Value = reqwest::get(format!("{}/api/accounts?page=2", app.address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let mut seen: Vec<String> = first["data"]["payload"]
        .as_array()
        .unwrap()
        .iter()
        .chain(second["data"]["payload"].as_array().unwrap())
        .map(|doc| doc["puuid"].as_str().unwrap().to_string())
        .collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 7);
}

#[tokio::test]
async fn account_search_narrows_the_page_but_not_the_total() {
    let app = spawn_app().await;
    seed_accounts(&app.accounts, 3).await;

    let body: Value = reqwest::get(format!("{}/api/accounts?search=Player2", app.address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let payload = body["data"]["payload"].as_array().unwrap();
    assert_eq!(payload.len(), 1);
    assert_eq!(payload[0]["gameName"], "Player2");
    assert_eq!(body["data"]["meta"]["total"], 3);
}

#[tokio::test]
async fn the_nil_sentinel_empties_the_page_quietly() {
    let app = spawn_app().await;
    seed_accounts(&app.accounts, 3).await;

    let body: Value = reqwest::get(format!("{}/api/accounts?gameName=nil", app.address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["payload"], json!([]));
    assert_eq!(body["data"]["meta"]["total"], 3);
}
