use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::model::work_item::{Record, RecordKind};

/// Destination for normalized records.
pub trait RecordSink {
    /// Replace everything previously stored for `kind` with `records`.
    fn replace(&self, kind: RecordKind, records: &[Record]) -> Result<usize>;
}

/// One `<kind>.jsonl` file per record kind.
pub struct JsonLinesSink {
    dir: PathBuf,
}

impl JsonLinesSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path_for(&self, kind: RecordKind) -> PathBuf {
        self.dir.join(format!("{}.jsonl", kind.as_str()))
    }
}

impl RecordSink for JsonLinesSink {
    fn replace(&self, kind: RecordKind, records: &[Record]) -> Result<usize> {
        debug_assert!(records.iter().all(|r| r.kind() == kind));
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let path = self.path_for(kind);
        let tmp = path.with_extension("jsonl.tmp");
        // Rename so readers never see a half-written file.
        let written = write_lines(&tmp, records).and_then(|()| {
            std::fs::rename(&tmp, &path)
                .with_context(|| format!("Failed to replace {}", path.display()))
        });
        if let Err(err) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(err);
        }
        Ok(records.len())
    }
}

fn write_lines(path: &Path, records: &[Record]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    let file = writer.into_inner().map_err(|err| err.into_error())?;
    file.sync_all()?;
    Ok(())
}
