use std::sync::Arc;

use rmcp::handler::server::{router::tool::ToolRouter, wrapper::Parameters};
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData, ServerHandler, tool, tool_handler, tool_router};
use serde::{Deserialize, Serialize};

use crate::dataset::{CategoryMatch, Dataset, PointsQuery, category_tree};
use crate::error::AnalyticsError;
use crate::llm::LlmClient;
use crate::nlp::NlpProcessor;
use crate::schema::COLUMNS;

// ---------------------------------------------------------------------------
// Parameter structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct PointsParams {
    #[schemars(
        description = "Category substring to filter by, e.g. 'ropa/hombre/camisetas'. Matches anywhere in the category column."
    )]
    pub category: Option<String>,
    #[schemars(
        description = "How 'category' is matched: 'contains' (default, substring of the raw column), 'prefix' (a record path starts with it) or 'segment' (prefix ending on a '/' boundary)"
    )]
    pub category_match: Option<String>,
    #[schemars(description = "Inclusive lower bound on id_tie_fecha_valor")]
    pub start: Option<i64>,
    #[schemars(description = "Inclusive upper bound on id_tie_fecha_valor")]
    pub end: Option<i64>,
    #[schemars(description = "Maximum number of results (default: 100)")]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct PointParams {
    #[schemars(description = "The id_tie_fecha_valor of the data point")]
    pub id: i64,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct NlQueryParams {
    #[schemars(
        description = "Question in natural language, e.g. 'productos Nike con más de 5 unidades'"
    )]
    pub query: String,
}

// ---------------------------------------------------------------------------
// MCP Server
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AnalyticsServer {
    dataset: Arc<Dataset>,
    nlp: NlpProcessor,
    tool_router: ToolRouter<Self>,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ErrorData> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ErrorData::internal_error(format!("JSON serialization error: {e}"), None))
}

fn to_error_data(err: AnalyticsError) -> ErrorData {
    match err {
        AnalyticsError::InvalidParams(msg) => ErrorData::invalid_params(msg, None),
        other => ErrorData::internal_error(other.to_string(), None),
    }
}

#[tool_router]
impl AnalyticsServer {
    pub fn new(dataset: Arc<Dataset>, llm: Arc<dyn LlmClient>) -> Self {
        let nlp = NlpProcessor::new(llm, dataset.clone());
        Self {
            dataset,
            nlp,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "List the category hierarchy as a nested tree of {path, name, children}, built from every record's category paths."
    )]
    async fn list_categories(&self) -> Result<CallToolResult, ErrorData> {
        let root = category_tree(self.dataset.as_ref())
            .await
            .map_err(to_error_data)?;
        Ok(CallToolResult::success(vec![Content::text(to_json(
            &root.children,
        )?)]))
    }

    #[tool(
        description = "List data points, optionally filtered by category substring and an id_tie_fecha_valor range."
    )]
    async fn query_points(
        &self,
        Parameters(p): Parameters<PointsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let category_match = match p.category_match.as_deref() {
            Some(mode) => mode
                .parse::<CategoryMatch>()
                .map_err(|e| ErrorData::invalid_params(e, None))?,
            None => CategoryMatch::default(),
        };

        let query = PointsQuery {
            category: p.category,
            category_match,
            start: p.start,
            end: p.end,
            limit: Some(p.limit.unwrap_or(100)),
        };
        query.validate().map_err(to_error_data)?;
        let points = self.dataset.points(&query);

        if points.is_empty() {
            return Ok(CallToolResult::success(vec![Content::text(
                "No data points found.",
            )]));
        }
        Ok(CallToolResult::success(vec![Content::text(to_json(
            &points,
        )?)]))
    }

    #[tool(description = "Fetch a single data point by its id_tie_fecha_valor.")]
    async fn get_point(
        &self,
        Parameters(p): Parameters<PointParams>,
    ) -> Result<CallToolResult, ErrorData> {
        match self.dataset.get_point(p.id) {
            Some(record) => Ok(CallToolResult::success(vec![Content::text(to_json(
                record,
            )?)])),
            None => Err(ErrorData::invalid_params(
                format!("Data point {} not found.", p.id),
                None,
            )),
        }
    }

    #[tool(
        description = "Answer a natural language question about the dataset. The question is translated into column filters by a language model and executed; the response carries the result message, a confidence score, the filters applied and the matching data points."
    )]
    async fn nl_query(
        &self,
        Parameters(p): Parameters<NlQueryParams>,
    ) -> Result<CallToolResult, ErrorData> {
        if p.query.trim().is_empty() {
            return Err(ErrorData::invalid_params("'query' must not be empty.", None));
        }
        let response = self.nlp.process(&p.query).await;
        Ok(CallToolResult::success(vec![Content::text(to_json(
            &response,
        )?)]))
    }

    #[tool(description = "Describe the columns of the dataset: name, type and meaning.")]
    async fn describe_schema(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text(to_json(
            &COLUMNS,
        )?)]))
    }
}

#[tool_handler]
impl ServerHandler for AnalyticsServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "E-commerce analytics over the challenge_graphql_nlp_api table. Use \
                 'list_categories' to browse the category tree, 'query_points' and 'get_point' \
                 to read data points, 'nl_query' to ask questions in natural language, and \
                 'describe_schema' to see the available columns."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
