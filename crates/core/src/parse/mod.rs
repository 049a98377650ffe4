//! Payload parsers for the three report formats.
//!
//! Every parser takes one page of raw payload plus the report's metadata and
//! produces a [`ReportPage`]: decoded rows, a row index, a column index and
//! the server's completion flag.

pub mod keys;
mod matrix;
mod summary;
mod tabular;

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ReportError;
use crate::grouping::GroupingTree;
use crate::metadata::{nullable, ExtendedMetadata, ReportDefinition, ReportFormat, ReportMetadata};
use crate::page::ReportPage;
use crate::value::{decode, Cell, DataType, Scalar};

pub use matrix::parse_matrix;
pub use summary::parse_summary;
pub use tabular::parse_tabular;

/// Key of the grand-total bucket.
pub const GRAND_TOTAL_KEY: &str = "T!T";

// ──────────────────────────────────────────────
// Payload shape
// ──────────────────────────────────────────────

/// One row of detail cells.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRow {
    #[serde(default, deserialize_with = "nullable")]
    pub data_cells: Vec<Cell>,
}

/// One bucket of the fact map.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FactMapEntry {
    #[serde(default, deserialize_with = "nullable")]
    pub rows: Vec<DataRow>,
    #[serde(default, deserialize_with = "nullable")]
    pub aggregates: Vec<Cell>,
}

/// The parts of a run response the parsers read.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    #[serde(default, deserialize_with = "nullable")]
    pub fact_map: BTreeMap<String, FactMapEntry>,
    #[serde(default, deserialize_with = "nullable")]
    pub groupings_down: GroupingTree,
    #[serde(default, deserialize_with = "nullable")]
    pub groupings_across: GroupingTree,
    #[serde(default)]
    pub all_data: bool,
    #[serde(default)]
    pub report_metadata: Option<ReportDefinition>,
    #[serde(default)]
    pub report_extended_metadata: Option<ExtendedMetadata>,
}

impl ReportPayload {
    pub fn from_json(value: serde_json::Value) -> Result<Self, ReportError> {
        Ok(serde_json::from_value(value)?)
    }
}

// ──────────────────────────────────────────────
// Entry points
// ──────────────────────────────────────────────

/// Parse one page with the parser matching the report's format.
pub fn parse_page(payload: &ReportPayload, metadata: &ReportMetadata) -> Result<ReportPage, ReportError> {
    match metadata.format() {
        ReportFormat::Tabular => parse_tabular(payload, metadata),
        ReportFormat::Summary => parse_summary(payload, metadata),
        ReportFormat::Matrix => parse_matrix(payload, metadata),
    }
}

/// First aggregate of the grand-total bucket, decoded with the aggregate's
/// data type when the payload declares it.
pub fn grand_total(payload: &ReportPayload) -> Result<Scalar, ReportError> {
    let cell = payload
        .fact_map
        .get(GRAND_TOTAL_KEY)
        .and_then(|entry| entry.aggregates.first())
        .ok_or_else(|| ReportError::MalformedPayload("no grand total aggregate".to_string()))?;
    let dtype = payload
        .report_metadata
        .as_ref()
        .and_then(|def| def.aggregates.first())
        .zip(payload.report_extended_metadata.as_ref())
        .and_then(|(name, ext)| ext.aggregate_column_info.get(name))
        .map(|info| info.data_type.clone());
    Ok(match dtype {
        Some(dtype) => decode(cell, &dtype),
        None => Scalar::from_json(&cell.value),
    })
}

/// Decode a row of cells against the column dtypes.
fn decode_row(cells: &[Cell], dtypes: &[DataType]) -> Result<Vec<Scalar>, ReportError> {
    if cells.len() != dtypes.len() {
        return Err(ReportError::MalformedPayload(format!(
            "row has {} cells but the report declares {} columns",
            cells.len(),
            dtypes.len()
        )));
    }
    Ok(cells.iter().zip(dtypes).map(|(c, d)| decode(c, d)).collect())
}
