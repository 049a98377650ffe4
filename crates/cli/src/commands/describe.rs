use factmap_client::{ClientConfig, ClientError};
use factmap_core::{ReportError, ReportMetadata};

use crate::OutputFormat;

pub(crate) fn cmd_describe(config: &ClientConfig, report_id: &str, output: OutputFormat) -> Result<(), ClientError> {
    let client = factmap_client::connect(config)?;
    let metadata = client.metadata(report_id)?;
    match output {
        OutputFormat::Text => print!("{}", summarize(&metadata)),
        OutputFormat::Json => {
            let pretty =
                serde_json::to_string_pretty(&metadata.to_json()?).map_err(ReportError::from)?;
            println!("{}", pretty);
        }
    }
    Ok(())
}

/// Human-readable overview of a describe document.
fn summarize(metadata: &ReportMetadata) -> String {
    let mut out = format!("format: {}\n", metadata.format());

    out.push_str("columns:\n");
    for (field, info) in metadata.columns() {
        out.push_str(&format!("  {} ({}, {})\n", info.label, field, info.data_type));
    }

    let down = metadata.grouping_labels_down();
    if !down.is_empty() {
        out.push_str(&format!("row groupings: {}\n", down.join(", ")));
    }
    let across = metadata.grouping_labels_across();
    if !across.is_empty() {
        out.push_str(&format!("column groupings: {}\n", across.join(", ")));
    }

    if !metadata.filters().is_empty() {
        out.push_str("filters:\n");
        for (i, f) in metadata.filters().iter().enumerate() {
            out.push_str(&format!("  {}. {} {} {}\n", i + 1, f.column, f.operator, f.value));
        }
    }
    if let Some(logic) = metadata.boolean_filter().filter(|l| !l.is_empty()) {
        out.push_str(&format!("filter logic: {}\n", logic));
    }
    if let Some(date) = metadata.date_filter() {
        out.push_str(&format!(
            "date filter: {} {} .. {}\n",
            date.duration_value,
            date.start_date.as_deref().unwrap_or("-"),
            date.end_date.as_deref().unwrap_or("-"),
        ));
    }

    let durations = metadata.duration_catalog();
    if !durations.is_empty() {
        out.push_str("named durations:\n");
        for label in durations.keys() {
            out.push_str(&format!("  {}\n", label));
        }
    }
    out
}
