//! Challenge analytics: shared library for the MCP server and CLI.

pub mod category;
pub mod dataset;
pub mod error;
pub mod filter;
pub mod llm;
pub mod nlp;
pub mod record;
pub mod schema;
pub mod server;

use std::path::PathBuf;

/// Name of the analytics table the dataset mirrors.
pub const TABLE_NAME: &str = "challenge_graphql_nlp_api";

/// Env var overriding the dataset location.
pub const DATASET_ENV: &str = "CHALLENGE_DATASET";

/// Resolve the dataset path from env var or default location.
pub fn resolve_dataset_path() -> PathBuf {
    if let Ok(path) = std::env::var(DATASET_ENV) {
        return PathBuf::from(path);
    }

    let data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    data_dir
        .join("challenge-analytics")
        .join(format!("{TABLE_NAME}.jsonl"))
}
