use crate::custody::CustodyLedger;
use crate::model::{Participant, RawMessage};
use chrono::{DateTime, Local};
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const DEFAULT_OUTPUT_DIR: &str = "exported_messages";
pub const DEFAULT_PDF_NAME: &str = "teams_conversation.pdf";
const MANIFEST_SUFFIX: &str = ".custody.json";

/// Sidecar written next to the JSON export: everything the report needs
/// besides the messages themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub participants: Vec<Participant>,
    pub chain_of_custody: CustodyLedger,
}

/// Paths of one export's files.
#[derive(Debug, Clone)]
pub struct ExportFiles {
    pub messages: PathBuf,
    pub manifest: PathBuf,
}

impl ExportFiles {
    pub fn new(output_dir: &Path, started: DateTime<Local>) -> Self {
        let stem = format!("complete_conversation_{}", started.format("%Y%m%d_%H%M%S"));
        Self {
            messages: output_dir.join(format!("{stem}.json")),
            manifest: output_dir.join(format!("{stem}{MANIFEST_SUFFIX}")),
        }
    }
}

/// Manifest path that belongs to a messages file.
pub fn manifest_path_for(messages: &Path) -> PathBuf {
    let stem = messages
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    messages.with_file_name(format!("{stem}{MANIFEST_SUFFIX}"))
}

/// Write through a temp file in the destination directory, then rename into
/// place. A crash mid-write leaves the old file (or none), never a torn one.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .wrap_err_with(|| format!("Failed to create directory: {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .wrap_err_with(|| format!("Failed to create temporary file in {}", dir.display()))?;
    {
        let mut writer = BufWriter::new(&mut tmp);
        write(&mut writer)?;
        writer.flush().wrap_err("Failed to flush output")?;
    }
    tmp.persist(path)
        .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e.error))?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |w| {
        serde_json::to_writer_pretty(&mut *w, value).wrap_err("Failed to serialize JSON")?;
        writeln!(w)?;
        Ok(())
    })
    .wrap_err_with(|| format!("Failed to write {}", path.display()))
}

pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic(path, |w| w.write_all(bytes).wrap_err("Failed to write bytes"))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).wrap_err_with(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .wrap_err_with(|| format!("Failed to parse {}", path.display()))
}

pub fn read_messages(path: &Path) -> Result<Vec<RawMessage>> {
    read_json(path)
}

pub fn read_manifest(path: &Path) -> Result<ExportManifest> {
    read_json(path)
}

/// Base name shown in the report's metadata table.
pub fn display_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
