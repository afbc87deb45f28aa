use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;

use challenge_analytics::category::CategoryNode;
use challenge_analytics::dataset::{CategoryMatch, Dataset, PointsQuery, category_tree};
use challenge_analytics::llm::{LlmClient, client_from_env};
use challenge_analytics::nlp::NlpProcessor;
use challenge_analytics::record::Record;
use challenge_analytics::resolve_dataset_path;
use challenge_analytics::schema::{COLUMNS, ID_FIELD};

#[derive(Parser)]
#[command(
    name = "challenge-analytics",
    about = "Browse and query the challenge_graphql_nlp_api dataset"
)]
struct Cli {
    /// Output machine-readable JSON (default: human-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Dataset file (JSON array or JSON lines). Defaults to $CHALLENGE_DATASET.
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the category tree
    Categories {
        /// Only show the subtree under this exact path
        #[arg(long)]
        path: Option<String>,
    },
    /// List data points
    Points {
        #[arg(long)]
        category: Option<String>,
        /// contains, prefix or segment
        #[arg(long, default_value = "contains")]
        category_match: CategoryMatch,
        #[arg(long)]
        start: Option<i64>,
        #[arg(long)]
        end: Option<i64>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show one data point by id_tie_fecha_valor
    Point { id: i64 },
    /// Ask a question in natural language
    Ask {
        /// The question (positional, collects remaining args)
        query: Vec<String>,
    },
    /// List the dataset columns
    Schema,
}

// ============================================================================
// Output Formatting
// ============================================================================

/// Print a record: id and category header, then every non-null column.
fn format_record(record: &Record) {
    let id = record
        .id_tie_fecha_valor
        .map_or_else(|| "?".to_string(), |id| id.to_string());
    let category = record.category().unwrap_or("-");
    println!("{id} ({category})");

    if let Ok(Value::Object(obj)) = serde_json::to_value(record) {
        for (name, value) in obj {
            if name == ID_FIELD || value.is_null() {
                continue;
            }
            let display_value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            println!("  {name}: {display_value}");
        }
    }
}

/// Print multiple records, separated by blank lines.
fn format_records(records: &[Record]) {
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            println!();
        }
        format_record(record);
    }
}

/// Print a subtree with two-space indentation per level.
fn format_tree(node: &CategoryNode, depth: usize) {
    for child in &node.children {
        println!("{}{}", "  ".repeat(depth), child.name);
        format_tree(child, depth + 1);
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let path = cli.dataset.clone().unwrap_or_else(resolve_dataset_path);
    let dataset = Dataset::load(&path).map_err(|e| format!("{}: {e}", path.display()))?;

    match cli.command {
        Command::Categories { path } => {
            let root = category_tree(&dataset).await?;
            let node = match path {
                Some(ref p) => match root.find(p) {
                    Some(node) => node,
                    None => {
                        eprintln!("No category found at '{p}'.");
                        std::process::exit(1);
                    }
                },
                None => &root,
            };

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&node.children)?);
            } else if node.children.is_empty() {
                eprintln!("No categories found.");
            } else {
                format_tree(node, 0);
            }
        }
        Command::Points {
            category,
            category_match,
            start,
            end,
            limit,
        } => {
            let query = PointsQuery {
                category,
                category_match,
                start,
                end,
                limit: Some(limit),
            };
            query.validate()?;
            let points = dataset.points(&query);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&points)?);
            } else if points.is_empty() {
                eprintln!("No data points found.");
            } else {
                format_records(&points);
            }
        }
        Command::Point { id } => match dataset.get_point(id) {
            Some(record) if cli.json => println!("{}", serde_json::to_string_pretty(record)?),
            Some(record) => format_record(record),
            None => {
                eprintln!("Data point {id} not found.");
                std::process::exit(1);
            }
        },
        Command::Ask { query } => {
            let question = query.join(" ");
            if question.trim().is_empty() {
                eprintln!("Error: No question provided. Pass it as positional arguments.");
                std::process::exit(1);
            }

            let llm = require_llm()?;
            let processor = NlpProcessor::new(llm, Arc::new(dataset));
            let response = processor.process(&question).await;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{} (confidence {:.1})", response.result, response.confidence);
                for spec in response.filters.iter() {
                    println!("  filter: {spec}");
                }
                if !response.records_matched.is_empty() {
                    println!();
                    format_records(&response.records_matched);
                }
                if !response.is_success() {
                    std::process::exit(2);
                }
            }
        }
        Command::Schema => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(COLUMNS)?);
            } else {
                for column in COLUMNS {
                    println!("{} ({}): {}", column.name, column.kind, column.description);
                }
            }
        }
    }

    Ok(())
}

/// Create an LLM client from environment, or error if not available.
fn require_llm() -> Result<Arc<dyn LlmClient>, String> {
    client_from_env().map_err(|e| {
        format!("{e}. Set OPENAI_API_KEY (or CHALLENGE_LLM_PROVIDER=anthropic) for natural language queries.")
    })
}
