//! Uploaded file and validation models

use lavado_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A file the user selected for analysis. Immutable once selected;
/// discarded on clear, cancel, or a new analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Display name (base name of the selected file)
    pub name: String,
    /// Size on disk in bytes
    pub size_bytes: u64,
    /// MIME kind inferred from the extension
    pub mime_kind: String,
    /// Source path the clients stream the bytes from
    pub path: PathBuf,
}

impl UploadedFile {
    /// Build from a local path, reading size metadata from the filesystem.
    pub fn from_path(path: &Path) -> Result<UploadedFile> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(Error::InvalidInput(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::InvalidInput(format!("Path has no file name: {}", path.display()))
            })?;

        Ok(UploadedFile {
            mime_kind: mime_kind_for(&name),
            name,
            size_bytes: metadata.len(),
            path: path.to_path_buf(),
        })
    }
}

/// MIME kind from the file extension. The backend re-validates; this is
/// only used for the multipart content type.
fn mime_kind_for(name: &str) -> String {
    let extension = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match extension.as_str() {
        "csv" => "text/csv",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Outcome of server-side structural validation. Produced once per file;
/// immutable. Consumed by the column validator and the cost calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileValidationResult {
    /// Transaction rows found in the file
    pub row_count: u64,
    /// Header columns detected in the file, whitespace-trimmed
    pub detected_columns: Vec<String>,
}

/// Canonical required-field contract for an uploaded batch.
///
/// Defined once and reused at every call site. Earlier portal revisions
/// carried divergent 4- and 5-field sets per screen; the 5-field set is the
/// contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredColumnSet {
    fields: Vec<String>,
}

impl RequiredColumnSet {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Required fields in canonical order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl Default for RequiredColumnSet {
    fn default() -> Self {
        Self::new([
            "monto",
            "fecha",
            "tipo_operacion",
            "cliente_id",
            "sector_actividad",
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn from_path_reads_metadata() {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        file.write_all(b"monto,fecha\n10.0,2026-01-01\n").unwrap();

        let uploaded = UploadedFile::from_path(file.path()).unwrap();
        assert!(uploaded.name.ends_with(".csv"));
        assert_eq!(uploaded.size_bytes, 28);
        assert_eq!(uploaded.mime_kind, "text/csv");
    }

    #[test]
    fn from_path_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(UploadedFile::from_path(dir.path()).is_err());
    }

    #[test]
    fn mime_kind_from_extension() {
        assert_eq!(mime_kind_for("batch.XLSX").as_str(), {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        });
        assert_eq!(mime_kind_for("batch.bin"), "application/octet-stream");
        assert_eq!(mime_kind_for("no_extension"), "application/octet-stream");
    }

    #[test]
    fn default_required_set_has_five_fields() {
        let required = RequiredColumnSet::default();
        assert_eq!(required.fields().len(), 5);
        assert_eq!(required.fields()[0], "monto");
        assert_eq!(required.fields()[4], "sector_actividad");
    }
}
