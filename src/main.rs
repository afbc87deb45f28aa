use std::sync::Arc;

use rmcp::ServiceExt;
use rmcp::transport::stdio;

use challenge_analytics::dataset::Dataset;
use challenge_analytics::llm::client_from_env;
use challenge_analytics::resolve_dataset_path;
use challenge_analytics::server::AnalyticsServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // LLM client is required; fail early if missing.
    let llm = client_from_env().map_err(|e| {
        format!("{e}. Set OPENAI_API_KEY (or CHALLENGE_LLM_PROVIDER=anthropic with ANTHROPIC_API_KEY) to enable natural language queries.")
    })?;

    let dataset_path = resolve_dataset_path();
    let dataset = Dataset::load(&dataset_path)
        .map_err(|e| {
            format!(
                "{}: {e}. Set CHALLENGE_DATASET to the dataset file.",
                dataset_path.display()
            )
        })?;

    let server = AnalyticsServer::new(Arc::new(dataset), llm);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}
