//! A single row of the analytics table.

use serde::{Deserialize, Serialize};

use crate::schema::{CATEGORY_FIELD, ID_FIELD};

/// One row of `challenge_graphql_nlp_api`. Every column is nullable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    pub id_tie_fecha_valor: Option<i64>,
    pub id_cli_cliente: Option<i64>,
    pub id_ga_fuente_medio: Option<i64>,
    pub desc_ga_categoria_producto: Option<f64>,
    pub fc_agregado_carrito_cant: Option<i64>,
    pub fc_ingreso_producto_monto: Option<f64>,
    pub fc_detalle_producto_cant: Option<i64>,
    pub fc_producto_cant: Option<i64>,
    pub flag_pipol: Option<i64>,
    pub id_ga_producto: Option<i64>,
    pub desc_ga_nombre_producto_1: Option<String>,
    pub desc_ga_sku_producto_1: Option<String>,
    pub desc_ga_marca_producto: Option<String>,
    pub desc_ga_cod_producto: Option<f64>,
    pub desc_categoria_producto: Option<String>,
    pub desc_categoria_prod_principal: Option<String>,
}

/// A borrowed, typed cell value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Integer(i64),
    Float(f64),
    Text(&'a str),
}

impl FieldValue<'_> {
    /// Numeric view of the cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Integer(v) => Some(v as f64),
            Self::Float(v) => Some(v),
            Self::Text(_) => None,
        }
    }
}

impl Record {
    /// Raw category string (comma-separated paths), if present.
    pub fn category(&self) -> Option<&str> {
        self.desc_categoria_producto.as_deref()
    }

    /// Read a column by name. Returns `None` for null cells and unknown names.
    pub fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        use FieldValue::{Float, Integer, Text};

        match name {
            ID_FIELD => self.id_tie_fecha_valor.map(Integer),
            "id_cli_cliente" => self.id_cli_cliente.map(Integer),
            "id_ga_fuente_medio" => self.id_ga_fuente_medio.map(Integer),
            "desc_ga_categoria_producto" => self.desc_ga_categoria_producto.map(Float),
            "fc_agregado_carrito_cant" => self.fc_agregado_carrito_cant.map(Integer),
            "fc_ingreso_producto_monto" => self.fc_ingreso_producto_monto.map(Float),
            "fc_detalle_producto_cant" => self.fc_detalle_producto_cant.map(Integer),
            "fc_producto_cant" => self.fc_producto_cant.map(Integer),
            "flag_pipol" => self.flag_pipol.map(Integer),
            "id_ga_producto" => self.id_ga_producto.map(Integer),
            "desc_ga_nombre_producto_1" => self.desc_ga_nombre_producto_1.as_deref().map(Text),
            "desc_ga_sku_producto_1" => self.desc_ga_sku_producto_1.as_deref().map(Text),
            "desc_ga_marca_producto" => self.desc_ga_marca_producto.as_deref().map(Text),
            "desc_ga_cod_producto" => self.desc_ga_cod_producto.map(Float),
            CATEGORY_FIELD => self.desc_categoria_producto.as_deref().map(Text),
            "desc_categoria_prod_principal" => {
                self.desc_categoria_prod_principal.as_deref().map(Text)
            }
            _ => None,
        }
    }
}
