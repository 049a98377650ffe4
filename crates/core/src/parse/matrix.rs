use std::collections::HashMap;

use crate::error::ReportError;
use crate::grouping::flatten;
use crate::metadata::ReportMetadata;
use crate::page::{ColumnIndex, ReportPage, RowIndex};
use crate::value::{decode, Scalar};

use super::keys::{compare_keys, matrix_key};
use super::ReportPayload;

/// Matrix reports hold aggregates in a sparse `{rowPath}!{colPath}` map.
///
/// Data cells are the keys whose both sides have one segment per grouping
/// level. Rows follow the sorted row paths; columns are laid out aggregate
/// first, so column `a * n_cols + c` holds aggregate `a` of column path `c`.
/// Cells absent from the map stay null.
pub fn parse_matrix(payload: &ReportPayload, metadata: &ReportMetadata) -> Result<ReportPage, ReportError> {
    let def = &metadata.report_metadata;
    let pattern = matrix_key(def.groupings_down.len(), def.groupings_across.len())?;
    let agg_labels = metadata.column_labels();
    let agg_dtypes = metadata.column_dtypes();

    let mut cells: Vec<(&str, &str, &String)> = payload
        .fact_map
        .keys()
        .filter_map(|key| {
            let caps = pattern.captures(key)?;
            let row = caps.get(1)?.as_str();
            let col = caps.get(2)?.as_str();
            Some((row, col, key))
        })
        .collect();
    cells.sort_by(|a, b| compare_keys(a.0, b.0).then_with(|| compare_keys(a.1, b.1)));

    let row_paths = distinct_sorted(cells.iter().map(|c| c.0));
    let col_paths = distinct_sorted(cells.iter().map(|c| c.1));

    let row_tuples = flatten(&payload.groupings_down.groupings);
    let col_tuples = flatten(&payload.groupings_across.groupings);
    if row_tuples.len() != row_paths.len() || col_tuples.len() != col_paths.len() {
        return Err(ReportError::MalformedPayload(format!(
            "grouping tuples ({} x {}) do not match fact-map paths ({} x {})",
            row_tuples.len(),
            col_tuples.len(),
            row_paths.len(),
            col_paths.len()
        )));
    }

    let row_pos: HashMap<&str, usize> = row_paths.iter().enumerate().map(|(i, p)| (*p, i)).collect();
    let col_pos: HashMap<&str, usize> = col_paths.iter().enumerate().map(|(i, p)| (*p, i)).collect();
    let n_cols = col_paths.len();
    let width = agg_dtypes.len() * n_cols;

    let mut grid = vec![vec![Scalar::Null; width]; row_paths.len()];
    for (row, col, key) in &cells {
        let (r, c) = (row_pos[row], col_pos[col]);
        let aggregates = &payload.fact_map[*key].aggregates;
        for (a, dtype) in agg_dtypes.iter().enumerate() {
            if let Some(cell) = aggregates.get(a) {
                grid[r][a * n_cols + c] = decode(cell, dtype);
            }
        }
    }

    let mut names = vec![String::new()];
    names.extend(metadata.grouping_labels_across());
    let tuples = agg_labels
        .iter()
        .flat_map(|agg| {
            col_tuples.iter().map(move |cols| {
                let mut tuple = vec![agg.clone()];
                tuple.extend(cols.iter().cloned());
                tuple
            })
        })
        .collect();
    let dtypes = agg_dtypes
        .iter()
        .flat_map(|d| std::iter::repeat(d.clone()).take(n_cols))
        .collect();

    Ok(ReportPage {
        rows: grid,
        row_index: RowIndex::Grouped {
            names: metadata.grouping_labels_down(),
            tuples: row_tuples,
        },
        columns: ColumnIndex::Grouped { names, tuples },
        dtypes,
        all_data: payload.all_data,
    })
}

fn distinct_sorted<'a>(paths: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut out: Vec<&str> = paths.collect();
    out.sort_by(|a, b| compare_keys(a, b));
    out.dedup();
    out
}
