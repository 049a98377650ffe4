//! Spreadsheet export: the report rendered server-side and streamed to disk.

use std::fs::File;
use std::path::{Path, PathBuf};

use factmap_core::{ReportError, ReportMetadata};
use tracing::{info, warn};

use crate::error::ClientError;
use crate::http::{check_status, read_body, transport_error, HttpTransport};

pub const EXCEL_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// File name suggested by a `Content-Disposition` header.
pub fn disposition_filename(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

/// Where the spreadsheet lands. A directory destination gets the server's
/// suggested name, falling back to `{report_id}.xlsx`; a file destination is
/// used as is.
pub fn resolve_destination(destination: &Path, suggested: Option<&str>, report_id: &str) -> PathBuf {
    if !destination.is_dir() {
        return destination.to_path_buf();
    }
    let name = suggested
        .and_then(|s| Path::new(s).file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.xlsx", report_id));
    destination.join(name)
}

impl HttpTransport {
    /// Run the report with the given metadata and save the spreadsheet the
    /// service renders. Returns the path written.
    pub fn download_excel(
        &self,
        report_id: &str,
        metadata: &ReportMetadata,
        destination: &Path,
    ) -> Result<PathBuf, ClientError> {
        let url = self.report_url(report_id)?;
        let body = metadata.to_json()?;
        let response = self
            .agent()
            .post(url.as_str())
            .header("Authorization", &self.bearer()?)
            .header("Accept", EXCEL_MIME)
            .send_json(&body)
            .map_err(transport_error)?;

        let suggested = response
            .headers()
            .get("content-disposition")
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_filename);
        let status = response.status().as_u16();
        let path = resolve_destination(destination, suggested.as_deref(), report_id);

        if !(200..300).contains(&status) {
            let (_, bytes) = read_body(response)?;
            let err = check_status(status, &bytes)
                .err()
                .unwrap_or_else(|| ReportError::Transport(format!("HTTP {}", status)));
            return Err(err.into());
        }

        let mut file = File::create(&path).map_err(|e| ClientError::io(&path, e))?;
        let copied = std::io::copy(&mut response.into_body().into_reader(), &mut file);
        let written = match copied {
            Ok(n) => n,
            Err(e) => {
                drop(file);
                // A partial spreadsheet is not left behind.
                if let Err(rm) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %rm, "could not remove partial spreadsheet");
                }
                return Err(ClientError::io(&path, e));
            }
        };
        info!(report_id, path = %path.display(), bytes = written, "saved spreadsheet");
        Ok(path)
    }
}
