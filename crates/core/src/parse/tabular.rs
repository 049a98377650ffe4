use crate::error::ReportError;
use crate::metadata::ReportMetadata;
use crate::page::{ColumnIndex, ReportPage, RowIndex};

use super::{decode_row, ReportPayload, GRAND_TOTAL_KEY};

/// Tabular reports keep every row under the grand-total bucket.
pub fn parse_tabular(payload: &ReportPayload, metadata: &ReportMetadata) -> Result<ReportPage, ReportError> {
    let dtypes = metadata.column_dtypes();
    let rows = match payload.fact_map.get(GRAND_TOTAL_KEY) {
        Some(entry) => entry
            .rows
            .iter()
            .map(|row| decode_row(&row.data_cells, &dtypes))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    Ok(ReportPage {
        row_index: RowIndex::positional(rows.len()),
        rows,
        columns: ColumnIndex::Flat(metadata.column_labels()),
        dtypes,
        all_data: payload.all_data,
    })
}
