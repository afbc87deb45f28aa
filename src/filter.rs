//! Filter extraction from free-form model output.
//!
//! The completion service is asked to answer with conditions such as
//! `fc_producto_cant >= 5 y desc_ga_marca_producto = 'Nike'`. Its output is
//! not trusted to follow any format, so [`extract_filters`] scans the text for
//! anything shaped like a condition and keeps the ones naming a known column.
//!
//! Grammar of a condition, scanned left to right:
//!
//! ```text
//! condition  := identifier ws* operator ws* value
//! identifier := word+
//! operator   := ">=" | "<=" | "!=" | "=" | ">" | "<"      (longest first)
//! value      := quoted | bare
//! quoted     := "'" [^']+ "'" | '"' [^"]+ '"'
//! bare       := (word | "-" | "." | ":" | ",")+             (ends at whitespace)
//! ```
//!
//! A bare value never spans whitespace, so conjunctions (`y`, `and`) between
//! conditions are never absorbed into a value. Trailing `,` `.` `:` are
//! stripped from bare values as sentence punctuation. A quote with no closing
//! partner is ignored and the rest is scanned as a bare value.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::debug;

// ============================================================================
// Operators
// ============================================================================

/// Comparison operator of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl FilterOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }

    /// Apply the operator to `lhs op rhs`. Incomparable values (NaN) never match.
    pub fn compare<T: PartialOrd + ?Sized>(self, lhs: &T, rhs: &T) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs.partial_cmp(rhs).is_some_and(|o| o != Ordering::Equal),
            Self::Gt => lhs > rhs,
            Self::Lt => lhs < rhs,
            Self::Ge => lhs >= rhs,
            Self::Le => lhs <= rhs,
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            ">" => Ok(Self::Gt),
            "<" => Ok(Self::Lt),
            ">=" => Ok(Self::Ge),
            "<=" => Ok(Self::Le),
            other => Err(format!("Unknown operator '{other}'")),
        }
    }
}

impl Serialize for FilterOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// Filter Specs
// ============================================================================

/// A single `field op value` constraint. The value stays untyped text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSpec {
    #[serde(skip)]
    pub field: String,
    pub op: FilterOp,
    pub value: String,
}

impl FilterSpec {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op, self.value)
    }
}

/// Filters keyed by field, one per field, applied conjunctively.
///
/// Serialises as `{"field": {"op": "...", "value": "..."}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    filters: IndexMap<String, FilterSpec>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a filter, replacing any earlier filter on the same field.
    pub fn insert(&mut self, spec: FilterSpec) {
        self.filters.insert(spec.field.clone(), spec);
    }

    pub fn get(&self, field: &str) -> Option<&FilterSpec> {
        self.filters.get(field)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterSpec> {
        self.filters.values()
    }
}

impl FromIterator<FilterSpec> for FilterSet {
    fn from_iter<I: IntoIterator<Item = FilterSpec>>(iter: I) -> Self {
        let mut set = Self::new();
        for spec in iter {
            set.insert(spec);
        }
        set
    }
}

impl Serialize for FilterSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.filters.len()))?;
        for (field, spec) in &self.filters {
            map.serialize_entry(field, spec)?;
        }
        map.end()
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Identifier and operator of a condition. The value is scanned by hand.
static CONDITION_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\w+)\s*(>=|<=|!=|=|>|<)\s*").expect("condition pattern is valid")
});

fn is_bare_value_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | ',')
}

/// Scan a value starting at `start`. Returns the trimmed value and the byte
/// offset just past it, or `None` when no value is present.
fn scan_value(text: &str, start: usize) -> Option<(&str, usize)> {
    let rest = &text[start..];

    if let Some(quote) = rest.chars().next().filter(|&c| matches!(c, '\'' | '"')) {
        let body = &rest[1..];
        if let Some(close) = body.find(quote) {
            let value = body[..close].trim();
            return (!value.is_empty()).then_some((value, start + 1 + close + 1));
        }
        return scan_bare(text, start + 1);
    }

    scan_bare(text, start)
}

fn scan_bare(text: &str, start: usize) -> Option<(&str, usize)> {
    let rest = &text[start..];
    let len = rest
        .find(|c: char| !is_bare_value_char(c))
        .unwrap_or(rest.len());
    let value = rest[..len].trim_end_matches([',', '.', ':']);
    (!value.is_empty()).then_some((value, start + len))
}

/// Recover `field op value` filters from free text.
///
/// Only identifiers present in `known_fields` (case-sensitive) are kept;
/// anything else is dropped without error. When a field appears more than
/// once, the last occurrence wins. Never fails: text without conditions
/// yields an empty set.
pub fn extract_filters(text: &str, known_fields: &HashSet<&str>) -> FilterSet {
    let mut filters = FilterSet::new();
    let mut pos = 0;

    while pos < text.len() {
        let Some(caps) = CONDITION_HEAD.captures_at(text, pos) else {
            break;
        };
        let head = caps.get(0).map_or(pos..text.len(), |m| m.range());
        let field = caps[1].trim();
        let op_text = caps[2].trim();

        let Some((value, value_end)) = scan_value(text, head.end) else {
            pos = head.end.max(pos + 1);
            continue;
        };
        pos = value_end;

        if !known_fields.contains(field) {
            debug!(field, "dropping filter on unknown field");
            continue;
        }
        let Ok(op) = op_text.parse::<FilterOp>() else {
            continue;
        };
        filters.insert(FilterSpec::new(field, op, value));
    }

    filters
}

// ============================================================================
// Tests
// ============================================================================
