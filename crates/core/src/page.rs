//! Decoded pages and the concatenated report table.

use serde::Serialize;

use crate::error::ReportError;
use crate::value::{DataType, Scalar};

/// Row labels of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RowIndex {
    /// Positional index, used by tabular reports.
    Flat(Vec<usize>),
    /// One label tuple per row, one level per row grouping.
    Grouped {
        names: Vec<String>,
        tuples: Vec<Vec<String>>,
    },
}

impl RowIndex {
    pub fn len(&self) -> usize {
        match self {
            RowIndex::Flat(positions) => positions.len(),
            RowIndex::Grouped { tuples, .. } => tuples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn positional(len: usize) -> Self {
        RowIndex::Flat((0..len).collect())
    }
}

/// Column labels of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ColumnIndex {
    Flat(Vec<String>),
    /// Matrix columns: the first level is the aggregate label, the rest are
    /// the column grouping levels.
    Grouped {
        names: Vec<String>,
        tuples: Vec<Vec<String>>,
    },
}

impl ColumnIndex {
    pub fn len(&self) -> usize {
        match self {
            ColumnIndex::Flat(labels) => labels.len(),
            ColumnIndex::Grouped { tuples, .. } => tuples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One display header per column; grouped tuples are joined with ` / `.
    pub fn headers(&self) -> Vec<String> {
        match self {
            ColumnIndex::Flat(labels) => labels.clone(),
            ColumnIndex::Grouped { tuples, .. } => tuples
                .iter()
                .map(|t| {
                    t.iter()
                        .filter(|part| !part.is_empty())
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(" / ")
                })
                .collect(),
        }
    }

    /// Position of a flat column by label.
    pub fn position(&self, label: &str) -> Option<usize> {
        match self {
            ColumnIndex::Flat(labels) => labels.iter().position(|l| l == label),
            ColumnIndex::Grouped { .. } => None,
        }
    }
}

/// One decoded page of a report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPage {
    pub rows: Vec<Vec<Scalar>>,
    pub row_index: RowIndex,
    pub columns: ColumnIndex,
    pub dtypes: Vec<DataType>,
    /// The server's completion flag.
    pub all_data: bool,
}

impl ReportPage {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Values of one flat column, in row order.
    pub fn column_values(&self, label: &str) -> Option<Vec<&Scalar>> {
        let pos = self.columns.position(label)?;
        Some(self.rows.iter().filter_map(|row| row.get(pos)).collect())
    }
}

// ──────────────────────────────────────────────
// ReportTable
// ──────────────────────────────────────────────

/// All pages of a report, concatenated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTable {
    pub columns: ColumnIndex,
    #[serde(skip)]
    pub dtypes: Vec<DataType>,
    pub index: RowIndex,
    pub rows: Vec<Vec<Scalar>>,
}

impl ReportTable {
    /// Append pages in order. Rows are never deduplicated. A flat row index
    /// is renumbered `0..n`; grouped indexes are kept as they are.
    pub fn concat(pages: Vec<ReportPage>) -> Result<Self, ReportError> {
        let mut pages = pages.into_iter();
        let Some(first) = pages.next() else {
            return Ok(ReportTable {
                columns: ColumnIndex::Flat(Vec::new()),
                dtypes: Vec::new(),
                index: RowIndex::Flat(Vec::new()),
                rows: Vec::new(),
            });
        };
        let mut table = ReportTable {
            columns: first.columns,
            dtypes: first.dtypes,
            index: first.row_index,
            rows: first.rows,
        };
        for page in pages {
            match (&mut table.index, page.row_index) {
                (RowIndex::Flat(positions), RowIndex::Flat(more)) => positions.extend(more),
                (RowIndex::Grouped { tuples, .. }, RowIndex::Grouped { tuples: more, .. }) => {
                    tuples.extend(more)
                }
                _ => {
                    return Err(ReportError::MalformedPayload(
                        "pages disagree on row index shape".to_string(),
                    ))
                }
            }
            table.rows.extend(page.rows);
        }
        if let RowIndex::Flat(_) = table.index {
            table.index = RowIndex::positional(table.rows.len());
        }
        Ok(table)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}
