use crate::error::ReportError;
use crate::grouping::flatten;
use crate::metadata::ReportMetadata;
use crate::page::{ColumnIndex, ReportPage, RowIndex};

use super::keys::{compare_keys, summary_key};
use super::{decode_row, ReportPayload};

/// Summary reports bucket detail rows by their row-grouping path.
///
/// Only leaf buckets (`{path}!T` with one segment per grouping level) carry
/// rows that belong in the output; shorter paths and `T!T` are subtotals.
/// Each flattened grouping tuple labels every row of its bucket.
pub fn parse_summary(payload: &ReportPayload, metadata: &ReportMetadata) -> Result<ReportPage, ReportError> {
    let depth = metadata.report_metadata.groupings_down.len();
    let pattern = summary_key(depth)?;
    let dtypes = metadata.column_dtypes();

    let mut keys: Vec<&String> = payload
        .fact_map
        .keys()
        .filter(|k| pattern.is_match(k))
        .collect();
    keys.sort_by(|a, b| compare_keys(a, b));

    let labels = flatten(&payload.groupings_down.groupings);
    if labels.len() != keys.len() {
        return Err(ReportError::MalformedPayload(format!(
            "{} row grouping tuples but {} fact-map groups; either the payload is \
             inconsistent or its row groupings branch below the top level, which is not supported",
            labels.len(),
            keys.len()
        )));
    }

    let mut rows = Vec::new();
    let mut tuples = Vec::new();
    for (key, label) in keys.into_iter().zip(labels) {
        let entry = &payload.fact_map[key];
        for row in &entry.rows {
            rows.push(decode_row(&row.data_cells, &dtypes)?);
            tuples.push(label.clone());
        }
    }

    Ok(ReportPage {
        rows,
        row_index: RowIndex::Grouped {
            names: metadata.grouping_labels_down(),
            tuples,
        },
        columns: ColumnIndex::Flat(metadata.column_labels()),
        dtypes,
        all_data: payload.all_data,
    })
}
