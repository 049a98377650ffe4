//! Plain-text rendering of report tables.

use factmap_core::{ReportTable, RowIndex};

/// Render `table` with left-aligned, space-padded columns. Grouped row
/// labels come first, one column per grouping level.
pub(crate) fn render(table: &ReportTable) -> String {
    let (index_names, index_rows): (Vec<String>, Vec<Vec<String>>) = match &table.index {
        RowIndex::Flat(_) => (Vec::new(), vec![Vec::new(); table.rows.len()]),
        RowIndex::Grouped { names, tuples } => (names.clone(), tuples.clone()),
    };

    let mut header = index_names;
    header.extend(table.columns.headers());

    let body: Vec<Vec<String>> = index_rows
        .into_iter()
        .zip(&table.rows)
        .map(|(mut line, row)| {
            line.extend(row.iter().map(|v| v.render().unwrap_or_default()));
            line
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for line in &body {
        for (i, cell) in line.iter().enumerate() {
            let w = cell.chars().count();
            match widths.get_mut(i) {
                Some(slot) => *slot = (*slot).max(w),
                None => widths.push(w),
            }
        }
    }

    let mut out = String::new();
    push_line(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, &rule, &widths);
    for line in &body {
        push_line(&mut out, line, &widths);
    }
    out
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
        .collect();
    out.push_str(padded.join("  ").trim_end());
    out.push('\n');
}
