use std::path::Path;

use factmap_client::{ClientConfig, ClientError};
use factmap_core::{ReportError, ReportRequest};
use tracing::info;

use crate::{table, OutputFormat};

pub(crate) fn cmd_report(
    config: &ClientConfig,
    request: &ReportRequest,
    excel: Option<&Path>,
    output: OutputFormat,
) -> Result<(), ClientError> {
    let client = factmap_client::connect(config)?;

    if let Some(destination) = excel {
        let metadata = client.configure(request)?;
        let path = client
            .transport()
            .download_excel(&request.report_id, &metadata, destination)?;
        match output {
            OutputFormat::Text => println!("{}", path.display()),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({ "path": path.display().to_string() }))
            }
        }
        return Ok(());
    }

    let table = client.get_report(request)?;
    info!(
        report_id = %request.report_id,
        rows = table.row_count(),
        columns = table.column_count(),
        "report fetched"
    );
    match output {
        OutputFormat::Text => print!("{}", table::render(&table)),
        OutputFormat::Json => {
            let pretty = serde_json::to_string_pretty(&table).map_err(ReportError::from)?;
            println!("{}", pretty);
        }
    }
    Ok(())
}
