//! In-memory dataset: record source and query execution.
//!
//! The dataset is read once from a JSON file (either a top-level array of
//! rows or one JSON object per line) and kept behind an `Arc` so it can be
//! shared by the MCP server and the NL processor without copying.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::category::{CategoryNode, MatchMode, build_tree, is_in_category_with};
use crate::error::AnalyticsError;
use crate::filter::{FilterOp, FilterSet, FilterSpec};
use crate::record::{FieldValue, Record};
use crate::schema::{ColumnKind, column};

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Read-only access to every record.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn records(&self) -> Result<Arc<Vec<Record>>, AnalyticsError>;
}

/// Applies a conjunctive filter set and returns the matching records.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, filters: &FilterSet) -> Result<Vec<Record>, AnalyticsError>;
}

// ============================================================================
// Dataset
// ============================================================================

/// How [`PointsQuery::category`] is compared against a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryMatch {
    /// The raw category column contains the text anywhere.
    #[default]
    Contains,
    /// One of the record's paths starts with the text.
    Path(MatchMode),
}

impl std::str::FromStr for CategoryMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contains" => Ok(Self::Contains),
            "prefix" => Ok(Self::Path(MatchMode::Prefix)),
            "segment" => Ok(Self::Path(MatchMode::Segment)),
            other => Err(format!(
                "Unknown category match '{other}'. Use contains, prefix or segment"
            )),
        }
    }
}

/// Options for listing data points.
#[derive(Debug, Clone, Default)]
pub struct PointsQuery {
    /// Category text the records must match.
    pub category: Option<String>,
    pub category_match: CategoryMatch,
    /// Inclusive lower bound on `id_tie_fecha_valor`.
    pub start: Option<i64>,
    /// Inclusive upper bound on `id_tie_fecha_valor`.
    pub end: Option<i64>,
    pub limit: Option<usize>,
}

impl PointsQuery {
    /// Reject an inverted id range.
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if let (Some(start), Some(end)) = (self.start, self.end)
            && start > end
        {
            return Err(AnalyticsError::InvalidParams(format!(
                "'start' ({start}) must not be greater than 'end' ({end})."
            )));
        }
        Ok(())
    }

    /// Category text, or `None` when absent or blank.
    fn category(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// The whole table, held in memory.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Arc<Vec<Record>>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    /// Read a dataset file.
    pub fn load(path: &Path) -> Result<Self, AnalyticsError> {
        let text = std::fs::read_to_string(path)?;
        let dataset = Self::parse(&text)?;
        info!(
            records = dataset.len(),
            path = %path.display(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    /// Parse a JSON array of rows, or JSON lines.
    pub fn parse(text: &str) -> Result<Self, AnalyticsError> {
        let trimmed = text.trim_start();
        if trimmed.starts_with('[') {
            let records: Vec<Record> = serde_json::from_str(trimmed)?;
            return Ok(Self::new(records));
        }

        let mut records = Vec::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record = serde_json::from_str(line)
                .map_err(|e| AnalyticsError::Dataset(format!("line {}: {e}", n + 1)))?;
            records.push(record);
        }
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by `id_tie_fecha_valor`.
    pub fn get_point(&self, id: i64) -> Option<&Record> {
        self.records
            .iter()
            .find(|r| r.id_tie_fecha_valor == Some(id))
    }

    /// List records matching the optional category and id bounds.
    pub fn points(&self, query: &PointsQuery) -> Vec<Record> {
        let matches = self.records.iter().filter(|r| {
            if let Some(cat) = query.category() {
                let hit = match query.category_match {
                    CategoryMatch::Contains => r.category().is_some_and(|c| c.contains(cat)),
                    CategoryMatch::Path(mode) => is_in_category_with(r, cat, mode),
                };
                if !hit {
                    return false;
                }
            }
            if let Some(start) = query.start
                && !r.id_tie_fecha_valor.is_some_and(|id| id >= start)
            {
                return false;
            }
            if let Some(end) = query.end
                && !r.id_tie_fecha_valor.is_some_and(|id| id <= end)
            {
                return false;
            }
            true
        });

        match query.limit {
            Some(limit) => matches.take(limit).cloned().collect(),
            None => matches.cloned().collect(),
        }
    }

    /// Apply every filter conjunctively.
    ///
    /// Values for numeric columns must parse as finite numbers; a filter that
    /// cannot be applied fails the whole query. Null cells never match.
    pub fn filter(&self, filters: &FilterSet) -> Result<Vec<Record>, AnalyticsError> {
        let predicates = filters
            .iter()
            .map(Predicate::compile)
            .collect::<Result<Vec<_>, _>>()?;

        let matched: Vec<Record> = self
            .records
            .iter()
            .filter(|r| predicates.iter().all(|p| p.matches(r)))
            .cloned()
            .collect();

        debug!(
            filters = filters.len(),
            matched = matched.len(),
            "applied filters"
        );
        Ok(matched)
    }
}

#[async_trait]
impl RecordSource for Dataset {
    async fn records(&self) -> Result<Arc<Vec<Record>>, AnalyticsError> {
        Ok(Arc::clone(&self.records))
    }
}

/// Category tree over every record of `source`.
pub async fn category_tree(source: &dyn RecordSource) -> Result<CategoryNode, AnalyticsError> {
    let records = source.records().await?;
    Ok(build_tree(records.iter()))
}

#[async_trait]
impl QueryExecutor for Dataset {
    async fn execute(&self, filters: &FilterSet) -> Result<Vec<Record>, AnalyticsError> {
        self.filter(filters)
    }
}

// ============================================================================
// Predicates
// ============================================================================

enum Operand {
    Integer(i64),
    Number(f64),
    Text(String),
}

/// A filter bound to its column type.
struct Predicate<'a> {
    field: &'a str,
    op: FilterOp,
    operand: Operand,
}

impl<'a> Predicate<'a> {
    fn compile(spec: &'a FilterSpec) -> Result<Self, AnalyticsError> {
        let col = column(&spec.field)
            .ok_or_else(|| AnalyticsError::Query(format!("Unknown column '{}'", spec.field)))?;

        let operand = if col.kind.is_numeric() {
            let value = spec.value.trim();
            match (col.kind, value.parse::<i64>()) {
                (ColumnKind::Integer, Ok(n)) => Operand::Integer(n),
                _ => match value.parse::<f64>() {
                    Ok(n) if n.is_finite() => Operand::Number(n),
                    _ => {
                        return Err(AnalyticsError::Query(format!(
                            "Invalid {} value '{}' for column '{}'",
                            col.kind, spec.value, spec.field
                        )));
                    }
                },
            }
        } else {
            Operand::Text(spec.value.clone())
        };

        Ok(Self {
            field: &spec.field,
            op: spec.op,
            operand,
        })
    }

    fn matches(&self, record: &Record) -> bool {
        let Some(cell) = record.field(self.field) else {
            return false;
        };
        match (&self.operand, cell) {
            (Operand::Integer(rhs), FieldValue::Integer(lhs)) => self.op.compare(&lhs, rhs),
            (Operand::Integer(rhs), cell) => cell
                .as_f64()
                .is_some_and(|lhs| self.op.compare(&lhs, &(*rhs as f64))),
            (Operand::Number(rhs), cell) => cell
                .as_f64()
                .is_some_and(|lhs| self.op.compare(&lhs, rhs)),
            (Operand::Text(rhs), FieldValue::Text(lhs)) => self.op.compare(lhs, rhs.as_str()),
            (Operand::Text(_), _) => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn row(id: i64, cant: i64, marca: &str, category: &str) -> Record {
        Record {
            id_tie_fecha_valor: Some(id),
            fc_producto_cant: Some(cant),
            fc_ingreso_producto_monto: Some(cant as f64 * 10.5),
            desc_ga_marca_producto: Some(marca.to_string()),
            desc_categoria_producto: Some(category.to_string()),
            ..Default::default()
        }
    }

    fn sample() -> Dataset {
        Dataset::new(vec![
            row(20240101, 1, "Nike", "ropa/hombre/camisetas, calzado/zapatillas"),
            row(20240102, 5, "Adidas", "ropa/mujer"),
            row(20240103, 9, "Nike", "deporte/futbol"),
            Record {
                id_tie_fecha_valor: Some(20240104),
                ..Default::default()
            },
        ])
    }

    fn ids(records: &[Record]) -> Vec<i64> {
        records.iter().filter_map(|r| r.id_tie_fecha_valor).collect()
    }

    // --- parse / load ---

    #[test]
    fn test_parse_json_array() {
        let ds = Dataset::parse(r#"[{"id_tie_fecha_valor": 1}, {"id_tie_fecha_valor": 2}]"#)
            .unwrap();
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn test_parse_json_lines_skips_blank() {
        let ds = Dataset::parse("{\"id_tie_fecha_valor\": 1}\n\n{\"fc_producto_cant\": 3}\n")
            .unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.points(&PointsQuery::default())[1].fc_producto_cant, Some(3));
    }

    #[test]
    fn test_parse_reports_bad_line() {
        let err = Dataset::parse("{\"id_tie_fecha_valor\": 1}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"id_tie_fecha_valor": 7, "desc_categoria_producto": "a/b"}}"#)
            .unwrap();
        let ds = Dataset::load(file.path()).unwrap();
        assert_eq!(ds.len(), 1);
        let tree = category_tree(&ds).await.unwrap();
        assert_eq!(tree.paths(), vec!["a", "a/b"]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Dataset::load(&dir.path().join("nope.jsonl")).unwrap_err();
        assert!(matches!(err, AnalyticsError::Io(_)));
    }

    // --- filter ---

    #[test]
    fn test_filter_numeric_comparison() {
        let ds = sample();
        let filters: FilterSet = [FilterSpec::new("fc_producto_cant", FilterOp::Ge, "5")]
            .into_iter()
            .collect();
        assert_eq!(ids(&ds.filter(&filters).unwrap()), vec![20240102, 20240103]);
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let ds = sample();
        let filters: FilterSet = [
            FilterSpec::new("fc_producto_cant", FilterOp::Gt, "0"),
            FilterSpec::new("desc_ga_marca_producto", FilterOp::Eq, "Nike"),
        ]
        .into_iter()
        .collect();
        assert_eq!(ids(&ds.filter(&filters).unwrap()), vec![20240101, 20240103]);
    }

    #[test]
    fn test_filter_float_column_accepts_decimals() {
        let ds = sample();
        let filters: FilterSet = [FilterSpec::new(
            "fc_ingreso_producto_monto",
            FilterOp::Lt,
            "52.5",
        )]
        .into_iter()
        .collect();
        assert_eq!(ids(&ds.filter(&filters).unwrap()), vec![20240101]);
    }

    #[test]
    fn test_filter_null_cells_never_match() {
        let ds = sample();
        let filters: FilterSet = [FilterSpec::new("desc_ga_marca_producto", FilterOp::Ne, "Nike")]
            .into_iter()
            .collect();
        assert_eq!(ids(&ds.filter(&filters).unwrap()), vec![20240102]);
    }

    #[test]
    fn test_filter_rejects_non_numeric_value() {
        let ds = sample();
        let filters: FilterSet = [FilterSpec::new("fc_producto_cant", FilterOp::Eq, "muchos")]
            .into_iter()
            .collect();
        let err = ds.filter(&filters).unwrap_err();
        assert!(matches!(err, AnalyticsError::Query(_)));
    }

    #[test]
    fn test_filter_rejects_non_finite_value() {
        let ds = sample();
        for value in ["nan", "NaN", "inf", "-infinity"] {
            for op in [FilterOp::Ne, FilterOp::Eq, FilterOp::Lt] {
                let filters: FilterSet = [FilterSpec::new("fc_producto_cant", op, value)]
                    .into_iter()
                    .collect();
                let err = ds.filter(&filters).unwrap_err();
                assert!(matches!(err, AnalyticsError::Query(_)), "{op} {value}");
            }
            let filters: FilterSet =
                [FilterSpec::new("fc_ingreso_producto_monto", FilterOp::Ne, value)]
                    .into_iter()
                    .collect();
            assert!(ds.filter(&filters).is_err());
        }
    }

    #[test]
    fn test_filter_large_integers_compare_exactly() {
        let big = 9_007_199_254_740_993_i64; // 2^53 + 1
        let ds = Dataset::new(vec![
            Record {
                id_cli_cliente: Some(big),
                ..Default::default()
            },
            Record {
                id_cli_cliente: Some(big - 1),
                ..Default::default()
            },
        ]);

        let eq: FilterSet = [FilterSpec::new("id_cli_cliente", FilterOp::Eq, big.to_string())]
            .into_iter()
            .collect();
        let matched = ds.filter(&eq).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id_cli_cliente, Some(big));

        let gt: FilterSet =
            [FilterSpec::new("id_cli_cliente", FilterOp::Gt, (big - 1).to_string())]
                .into_iter()
                .collect();
        assert_eq!(ds.filter(&gt).unwrap().len(), 1);

        let fractional: FilterSet = [FilterSpec::new("id_cli_cliente", FilterOp::Lt, "1.5")]
            .into_iter()
            .collect();
        assert!(ds.filter(&fractional).unwrap().is_empty());
    }

    #[test]
    fn test_empty_filter_set_returns_everything() {
        let ds = sample();
        assert_eq!(ds.filter(&FilterSet::new()).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_query_executor_trait() {
        let ds = sample();
        let executor: &dyn QueryExecutor = &ds;
        let filters: FilterSet = [FilterSpec::new("fc_producto_cant", FilterOp::Eq, "9")]
            .into_iter()
            .collect();
        assert_eq!(ids(&executor.execute(&filters).await.unwrap()), vec![20240103]);

        let source: &dyn RecordSource = &ds;
        assert_eq!(source.records().await.unwrap().len(), 4);
        let tree = category_tree(source).await.unwrap();
        assert!(tree.find("ropa/hombre/camisetas").is_some());
    }

    // --- points ---

    #[test]
    fn test_points_category_substring() {
        let ds = sample();
        let q = PointsQuery {
            category: Some("ropa".into()),
            ..Default::default()
        };
        assert_eq!(ids(&ds.points(&q)), vec![20240101, 20240102]);
    }

    #[test]
    fn test_points_blank_category_is_no_filter() {
        let ds = sample();
        for blank in ["", "  "] {
            let q = PointsQuery {
                category: Some(blank.into()),
                ..Default::default()
            };
            assert_eq!(ds.points(&q).len(), 4);
        }
    }

    #[test]
    fn test_points_query_validate() {
        let q = PointsQuery {
            start: Some(5),
            end: Some(1),
            ..Default::default()
        };
        assert!(matches!(q.validate(), Err(AnalyticsError::InvalidParams(_))));

        let q = PointsQuery {
            start: Some(1),
            end: Some(1),
            ..Default::default()
        };
        assert!(q.validate().is_ok());
        assert!(PointsQuery::default().validate().is_ok());
    }

    #[test]
    fn test_points_category_path_modes() {
        let ds = Dataset::new(vec![
            row(1, 1, "a", "ropa/hombre/camisetas"),
            row(2, 1, "a", "deporte, ropa/hogar"),
            row(3, 1, "a", "moda/ropa/hombre"),
        ]);

        let contains = PointsQuery {
            category: Some("ropa/h".into()),
            ..Default::default()
        };
        assert_eq!(ids(&ds.points(&contains)), vec![1, 2, 3]);

        let prefix = PointsQuery {
            category_match: "prefix".parse().unwrap(),
            ..contains.clone()
        };
        assert_eq!(ids(&ds.points(&prefix)), vec![1, 2]);

        let segment = PointsQuery {
            category: Some("ropa/hombre".into()),
            category_match: "segment".parse().unwrap(),
            ..Default::default()
        };
        assert_eq!(ids(&ds.points(&segment)), vec![1]);

        assert!("fuzzy".parse::<CategoryMatch>().is_err());
    }

    #[test]
    fn test_points_id_bounds_and_limit() {
        let ds = sample();
        let q = PointsQuery {
            start: Some(20240102),
            end: Some(20240104),
            ..Default::default()
        };
        assert_eq!(ids(&ds.points(&q)), vec![20240102, 20240103, 20240104]);

        let q = PointsQuery {
            start: Some(20240102),
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(ids(&ds.points(&q)), vec![20240102]);
    }

    #[test]
    fn test_get_point() {
        let ds = sample();
        assert_eq!(
            ds.get_point(20240103).unwrap().desc_ga_marca_producto.as_deref(),
            Some("Nike")
        );
        assert!(ds.get_point(1).is_none());
    }
}
