use factmap_client::{ClientConfig, ClientError};

use crate::OutputFormat;

pub(crate) fn cmd_total(config: &ClientConfig, report_id: &str, output: OutputFormat) -> Result<(), ClientError> {
    let client = factmap_client::connect(config)?;
    let total = client.get_total(report_id)?;
    match output {
        OutputFormat::Text => println!("{}", total),
        OutputFormat::Json => println!("{}", serde_json::json!({ "total": total })),
    }
    Ok(())
}
