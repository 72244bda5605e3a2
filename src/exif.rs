use exiftool::{ExifTool, ExifToolError};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::merge::WritePayload;
use crate::metadata::FileMetadataRecord;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("exiftool is not available: {0}")]
    Unavailable(#[source] ExifToolError),

    #[error("exiftool failed on {path}: {source}")]
    Exec {
        path: PathBuf,
        #[source]
        source: ExifToolError,
    },

    #[error("unexpected exiftool output for {path}: {reason}")]
    Output { path: PathBuf, reason: String },

    #[error("path contains invalid UTF-8: {0}")]
    InvalidPath(PathBuf),

    /// exiftool reads one argument per line, so a line break would split it
    #[error("refusing to pass argument containing a line break: {0:?}")]
    LineBreak(String),
}

/// Reads and writes metadata for one file at a time
pub trait MetadataTool {
    fn read(&mut self, path: &Path) -> Result<FileMetadataRecord, ToolError>;

    /// Write the given tags, leaving every other tag untouched
    fn write(&mut self, path: &Path, payload: &WritePayload) -> Result<(), ToolError>;
}

/// Sidecar that holds metadata for formats exiftool reads poorly
pub fn sidecar_path(path: &Path) -> PathBuf {
    path.with_extension("xmp")
}

/// Metadata tool backed by a persistent exiftool process
pub struct ExifToolBackend {
    exiftool: ExifTool,
}

impl ExifToolBackend {
    /// Start exiftool from `PATH`, or from an explicit executable
    pub fn new(executable: Option<&Path>) -> Result<Self, ToolError> {
        let exiftool = match executable {
            Some(exe) => ExifTool::with_executable(exe),
            None => ExifTool::new(),
        }
        .map_err(ToolError::Unavailable)?;

        Ok(ExifToolBackend { exiftool })
    }
}

fn check_argument(arg: &str) -> Result<(), ToolError> {
    if arg.contains(['\n', '\r']) {
        return Err(ToolError::LineBreak(arg.to_string()));
    }
    Ok(())
}

fn path_str(path: &Path) -> Result<&str, ToolError> {
    let s = path
        .to_str()
        .ok_or_else(|| ToolError::InvalidPath(path.to_path_buf()))?;
    check_argument(s)?;
    Ok(s)
}

/// Build `-TAG=value` assignments; list values repeat the tag once per item
pub fn write_args(payload: &WritePayload) -> Result<Vec<String>, ToolError> {
    let mut args = vec!["-overwrite_original".to_string(), "-m".to_string()];
    for (tag, value) in payload.iter() {
        for item in value.items() {
            let arg = format!("-{}={}", tag, item);
            check_argument(&arg)?;
            args.push(arg);
        }
    }
    Ok(args)
}

/// Merge the JSON objects exiftool returned for a file and its sidecar.
///
/// Later objects (the sidecar) fill or override earlier ones.
pub fn record_from_output(path: &Path, output: Value) -> Result<FileMetadataRecord, ToolError> {
    let objects = match output {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut record = FileMetadataRecord::new();
    let mut seen = 0;
    for item in &objects {
        if let Some(object) = item.as_object() {
            record.merge_json_object(object);
            seen += 1;
        }
    }

    if seen == 0 {
        return Err(ToolError::Output {
            path: path.to_path_buf(),
            reason: "no metadata object returned".to_string(),
        });
    }

    Ok(record)
}

/// Fail when exiftool reports that the file was not written
pub fn check_write_output(path: &Path, lines: &[String]) -> Result<(), ToolError> {
    if lines.iter().any(|l| l.contains("weren't updated due to errors")) {
        return Err(ToolError::Output {
            path: path.to_path_buf(),
            reason: lines.join("; "),
        });
    }
    Ok(())
}

impl MetadataTool for ExifToolBackend {
    fn read(&mut self, path: &Path) -> Result<FileMetadataRecord, ToolError> {
        let mut args = vec!["-m", path_str(path)?];

        let sidecar = sidecar_path(path);
        if sidecar != path && sidecar.is_file() {
            args.push(path_str(&sidecar)?);
        }

        let output = self
            .exiftool
            .json_execute(&args)
            .map_err(|source| ToolError::Exec {
                path: path.to_path_buf(),
                source,
            })?;

        let record = record_from_output(path, output)?;
        debug!(path = %path.display(), tags = record.len(), "read metadata");
        Ok(record)
    }

    fn write(&mut self, path: &Path, payload: &WritePayload) -> Result<(), ToolError> {
        let mut owned = write_args(payload)?;
        owned.push(path_str(path)?.to_string());
        let args: Vec<&str> = owned.iter().map(String::as_str).collect();

        let lines = self
            .exiftool
            .execute_lines(&args)
            .map_err(|source| ToolError::Exec {
                path: path.to_path_buf(),
                source,
            })?;

        for line in &lines {
            debug!(path = %path.display(), "exiftool: {}", line.trim());
        }

        check_write_output(path, &lines)
    }
}
