//! Natural language query processing.
//!
//! A question is sent to the completion service together with a prompt that
//! describes every column. The answer is scanned for filters, which are then
//! executed against the dataset. Failures anywhere in that chain are turned
//! into a low-confidence [`NlpResponse`] instead of an error.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::dataset::QueryExecutor;
use crate::error::AnalyticsError;
use crate::filter::{FilterSet, extract_filters};
use crate::llm::LlmClient;
use crate::record::Record;
use crate::schema::{known_fields, system_prompt};

/// Sampling temperature for translation requests.
pub const TEMPERATURE: f32 = 0.3;

/// Confidence reported when the whole pipeline succeeds.
pub const SUCCESS_CONFIDENCE: f64 = 0.9;

pub const SUCCESS_MESSAGE: &str = "Consulta procesada exitosamente";

const USER_PROMPT_PREFIX: &str = "Convierte esta consulta a filtros SQL: ";

const ERROR_PREFIX: &str = "Error al procesar la consulta";

/// Outcome of processing one question. Always well-formed.
#[derive(Debug, Clone, Serialize)]
pub struct NlpResponse {
    pub result: String,
    pub confidence: f64,
    #[serde(rename = "filters_applied")]
    pub filters: FilterSet,
    #[serde(rename = "data_points")]
    pub records_matched: Vec<Record>,
}

impl NlpResponse {
    fn success(filters: FilterSet, records_matched: Vec<Record>) -> Self {
        Self {
            result: SUCCESS_MESSAGE.to_string(),
            confidence: SUCCESS_CONFIDENCE,
            filters,
            records_matched,
        }
    }

    fn failure(err: &AnalyticsError) -> Self {
        Self {
            result: format!("{ERROR_PREFIX}: {err}"),
            confidence: 0.0,
            filters: FilterSet::new(),
            records_matched: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.confidence > 0.0
    }
}

/// Translates questions into filters and runs them.
#[derive(Clone)]
pub struct NlpProcessor {
    llm: Arc<dyn LlmClient>,
    executor: Arc<dyn QueryExecutor>,
    known_fields: HashSet<&'static str>,
    system_prompt: String,
}

impl NlpProcessor {
    pub fn new(llm: Arc<dyn LlmClient>, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            llm,
            executor,
            known_fields: known_fields(),
            system_prompt: system_prompt(),
        }
    }

    /// Answer a natural language question. Never fails.
    pub async fn process(&self, query: &str) -> NlpResponse {
        match self.translate_and_execute(query).await {
            Ok((filters, records)) => NlpResponse::success(filters, records),
            Err(e) => {
                warn!(error = %e, "natural language query failed");
                NlpResponse::failure(&e)
            }
        }
    }

    async fn translate_and_execute(
        &self,
        query: &str,
    ) -> Result<(FilterSet, Vec<Record>), AnalyticsError> {
        let user_msg = format!("{USER_PROMPT_PREFIX}{query}");
        let completion = self
            .llm
            .complete(&self.system_prompt, &user_msg, TEMPERATURE)
            .await?;

        let filters = extract_filters(&completion.text, &self.known_fields);
        debug!(filters = filters.len(), "extracted filters from completion");

        let records = self.executor.execute(&filters).await?;
        Ok((filters, records))
    }
}

// ============================================================================
// Tests
// ============================================================================
