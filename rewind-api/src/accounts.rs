//! Player account collection.
//!
//! Schema, capability grant and serializer for the `accounts` collection,
//! plus the indexing step the wrapped flow runs after each successful pull.
//! Accounts are keyed by puuid; the match-id list grows as new matches are
//! seen, it never shrinks.

use rewind_engine::{EngineResult, EntityService, Serializer};
use rewind_model::{CollectionSchema, FieldSpec, JsonObject};
use rewind_storage::DocumentStore;
use rewind_types::{CapabilitySet, CrudOperation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Insert payload for the accounts collection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub puuid: String,
    pub game_name: String,
    pub tag_line: String,
    pub match_ids: Vec<String>,
}

/// A stored account, as read back from the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAccount {
    #[serde(rename = "_id")]
    pub id: String,
    pub puuid: String,
    pub game_name: String,
    pub tag_line: String,
    #[serde(default)]
    pub match_ids: Vec<String>,
}

pub type AccountService = EntityService<NewAccount, PlayerAccount>;

pub fn account_schema() -> CollectionSchema {
    CollectionSchema::new(
        "accounts",
        vec![
            FieldSpec::text("puuid", false).unique(),
            FieldSpec::text("gameName", true),
            FieldSpec::text("tagLine", true),
            FieldSpec::tags("matchIds"),
        ],
    )
}

/// The operations this collection grants. Everything else is denied before
/// it reaches the store.
pub fn account_capabilities() -> CapabilitySet {
    CapabilitySet::from_ops(&[
        CrudOperation::Count,
        CrudOperation::Create,
        CrudOperation::GetAll,
        CrudOperation::Update,
        CrudOperation::Exists,
        CrudOperation::FindMany,
        CrudOperation::FindSingle,
        CrudOperation::SoftDelete,
        CrudOperation::FindOrCreate,
    ])
}

fn account_serializer() -> Serializer {
    Serializer::new(["createdAt", "updatedAt", "deletedAt", "isDeleted"])
}

pub fn account_service(store: Arc<dyn DocumentStore>) -> AccountService {
    EntityService::new(
        store,
        account_schema(),
        account_capabilities(),
        account_serializer(),
    )
}

/// Records a pull: creates the account on first sight, then folds any new
/// match ids into the stored list.
pub async fn index_account(
    service: &AccountService,
    puuid: &str,
    game_name: &str,
    tag_line: &str,
    match_ids: &[String],
) -> EngineResult<PlayerAccount> {
    let payload = NewAccount {
        puuid: puuid.to_string(),
        game_name: game_name.to_string(),
        tag_line: tag_line.to_string(),
        match_ids: match_ids.to_vec(),
    };
    let account = service.find_or_create(&payload, "puuid").await?;

    let merged = merge_ids(&account.match_ids, match_ids);
    if merged.len() == account.match_ids.len() {
        return Ok(account);
    }
    let mut filters = JsonObject::new();
    filters.insert("puuid".to_string(), Value::String(puuid.to_string()));
    let mut changes = JsonObject::new();
    changes.insert("matchIds".to_string(), json!(merged));
    match service.update(&filters, &changes).await? {
        Some(updated) => Ok(updated),
        None => Ok(account),
    }
}

fn merge_ids(existing: &[String], fresh: &[String]) -> Vec<String> {
    let mut merged = existing.to_vec();
    for id in fresh {
        if !merged.contains(id) {
            merged.push(id.clone());
        }
    }
    merged
}
