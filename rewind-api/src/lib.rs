//! Rewind backend service.
//!
//! Pulls a player's season from the Riot API, aggregates it into
//! year-in-review stats, asks a narrative model for the story extras and
//! records the account in the document store through the generic
//! data-access layer.

pub mod accounts;
pub mod error;
pub mod insights;
pub mod narrative;
pub mod riot;
pub mod routes;
pub mod stats;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use insights::InsightsService;
pub use narrative::{NarrativeClient, NarrativeConfig};
pub use riot::{RiotClient, RiotConfig};
pub use routes::{build_router, AppState};
