use proctor_violations::{ViolationRecord, ViolationRepository, RECORDING_STAMP_FORMAT};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File name of the ledger inside the session output directory.
pub const LEDGER_FILE: &str = "violations.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Append-only violation ledger persisted as one pretty-printed JSON array.
///
/// Every append rewrites the whole file through a temp file and rename, so a
/// reader never observes a half-written array.
pub struct JsonLedger {
    path: PathBuf,
    records: Mutex<Vec<ViolationRecord>>,
}

impl JsonLedger {
    /// Open `<output_dir>/violations.json`, loading any existing history.
    ///
    /// A file that is not a JSON array of records is renamed to
    /// `violations.json.corrupt-<stamp>` and the ledger starts empty, so the
    /// next append never overwrites it. Other read errors fail the open.
    pub fn open(output_dir: &Path) -> Result<Self> {
        fs::create_dir_all(output_dir)?;
        let path = output_dir.join(LEDGER_FILE);

        let records: Vec<ViolationRecord> = match fs::read(&path) {
            Ok(raw) => match serde_json::from_slice(&raw) {
                Ok(records) => records,
                Err(e) => {
                    let aside = set_aside(&path)?;
                    tracing::warn!(
                        path = %path.display(),
                        moved_to = %aside.display(),
                        error = %e,
                        "Unreadable violation ledger moved aside"
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), loaded = records.len(), "Opened violation ledger");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, records: &[ViolationRecord]) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, records)?;
        tmp.as_file_mut().flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn set_aside(path: &Path) -> Result<PathBuf> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let stamp = chrono::Local::now().format(RECORDING_STAMP_FORMAT);
    let base = format!("{LEDGER_FILE}.corrupt-{stamp}");

    let mut aside = dir.join(&base);
    let mut n = 1;
    while aside.exists() {
        aside = dir.join(format!("{base}-{n}"));
        n += 1;
    }
    fs::rename(path, &aside)?;
    Ok(aside)
}

impl ViolationRepository for JsonLedger {
    type Error = StorageError;

    fn record(&self, record: ViolationRecord) -> Result<()> {
        let mut records = self.records.lock().expect("ledger mutex poisoned");
        records.push(record);
        if let Err(e) = self.persist(&records) {
            records.pop();
            return Err(e);
        }
        Ok(())
    }

    fn all(&self) -> Result<Vec<ViolationRecord>> {
        Ok(self.records.lock().expect("ledger mutex poisoned").clone())
    }

    fn len(&self) -> usize {
        self.records.lock().expect("ledger mutex poisoned").len()
    }
}
