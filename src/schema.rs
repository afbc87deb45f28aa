//! Field registry for the `challenge_graphql_nlp_api` table.
//!
//! The registry is the single source of truth for which columns exist, how
//! their values are typed, and how they are described to the language model.
//! It is used to:
//!
//! - **Validate** field names recovered from model output
//! - **Coerce** filter values before comparing them against records
//! - **Render** the system prompt sent to the completion service

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

// ============================================================================
// Column Model
// ============================================================================

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
}

impl ColumnKind {
    /// Whether values of this kind compare numerically.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("integer"),
            Self::Float => f.write_str("float"),
            Self::Text => f.write_str("text"),
        }
    }
}

/// A column of the analytics table.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    /// Description shown to the model, in the dataset's language.
    pub description: &'static str,
}

const fn col(name: &'static str, kind: ColumnKind, description: &'static str) -> Column {
    Column {
        name,
        kind,
        description,
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Column holding the comma-separated category paths of a record.
pub const CATEGORY_FIELD: &str = "desc_categoria_producto";

/// Column used as the record identifier and date bound.
pub const ID_FIELD: &str = "id_tie_fecha_valor";

/// Every active column, in table order.
pub const COLUMNS: &[Column] = &[
    col(ID_FIELD, ColumnKind::Integer, "ID de fecha"),
    col("id_cli_cliente", ColumnKind::Integer, "ID de cliente"),
    col("id_ga_fuente_medio", ColumnKind::Integer, "ID de fuente/medio"),
    col(
        "desc_ga_categoria_producto",
        ColumnKind::Float,
        "Categoría del producto",
    ),
    col(
        "fc_agregado_carrito_cant",
        ColumnKind::Integer,
        "Cantidad agregada al carrito",
    ),
    col(
        "fc_ingreso_producto_monto",
        ColumnKind::Float,
        "Monto de ingreso al producto",
    ),
    col(
        "fc_detalle_producto_cant",
        ColumnKind::Integer,
        "Cantidad de detalles de producto",
    ),
    col("fc_producto_cant", ColumnKind::Integer, "Cantidad de productos"),
    col("flag_pipol", ColumnKind::Integer, "Flag PIPOL"),
    col("id_ga_producto", ColumnKind::Integer, "ID de producto"),
    col(
        "desc_ga_nombre_producto_1",
        ColumnKind::Text,
        "Nombre del producto 1",
    ),
    col("desc_ga_sku_producto_1", ColumnKind::Text, "SKU del producto 1"),
    col("desc_ga_marca_producto", ColumnKind::Text, "Marca del producto"),
    col("desc_ga_cod_producto", ColumnKind::Float, "Código del producto"),
    col(CATEGORY_FIELD, ColumnKind::Text, "Categoría del producto"),
    col(
        "desc_categoria_prod_principal",
        ColumnKind::Text,
        "Categoría principal del producto",
    ),
];

/// Look up a column by exact (case-sensitive) name.
pub fn column(name: &str) -> Option<&'static Column> {
    COLUMNS.iter().find(|c| c.name == name)
}

/// The set of field names filters may reference.
pub fn known_fields() -> HashSet<&'static str> {
    COLUMNS.iter().map(|c| c.name).collect()
}

// ============================================================================
// Prompt Rendering
// ============================================================================

const SYSTEM_PROMPT_HEADER: &str = "Eres un asistente especializado en análisis de datos de comercio electrónico.
Tu tarea es convertir consultas en lenguaje natural a consultas SQL o filtros específicos.
Responde con condiciones de la forma `columna operador valor` usando solo los operadores =, !=, >, <, >=, <=.

La tabla tiene las siguientes columnas:
";

/// Render the system prompt describing every column to the model.
pub fn system_prompt() -> String {
    let mut prompt = String::from(SYSTEM_PROMPT_HEADER);
    for column in COLUMNS {
        prompt.push_str(&format!("- {}: {}\n", column.name, column.description));
    }
    prompt
}

// ============================================================================
// Tests
// ============================================================================
