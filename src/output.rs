//! Table persistence for aggregate output.
//!
//! Tables are written as headed CSV, overwriting previous runs. A
//! [`StagedTables`] set stages every table next to its destination and only
//! renames them into place once all of them were written.

use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

/// A row type with a fixed column layout.
pub trait Table: Serialize + DeserializeOwned {
    /// Suffix used in the output file name, e.g. `date`.
    const SUFFIX: &'static str;
    /// Header row, in field order.
    const COLUMNS: &'static [&'static str];
}

/// Logs a value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes `rows` to `path` under the table's header, replacing any existing file.
pub fn write_table<T: Table>(path: &Path, rows: &[T]) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), "Writing table");

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    writer.write_record(T::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Reads a table back, checking its header against the table's columns.
pub fn read_table<T: Table>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let mut rdr = ReaderBuilder::new().from_reader(file);

    let headers = rdr.headers()?;
    if !headers.iter().eq(T::COLUMNS.iter().copied()) {
        return Err(PipelineError::schema(
            &path.display().to_string(),
            format!(
                "expected columns {:?}, found {:?}",
                T::COLUMNS,
                headers.iter().collect::<Vec<_>>()
            ),
        ));
    }

    let mut rows = Vec::new();
    for result in rdr.deserialize::<T>() {
        rows.push(result?);
    }
    Ok(rows)
}

/// Tables written to temporary files, awaiting [`StagedTables::commit`].
///
/// Dropping an uncommitted set removes its temporary files.
#[derive(Debug)]
pub struct StagedTables {
    dir: PathBuf,
    staged: Vec<(PathBuf, PathBuf)>,
    retired: Vec<PathBuf>,
}

impl StagedTables {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            staged: Vec::new(),
            retired: Vec::new(),
        })
    }

    /// Marks `dir/file_name` as no longer part of the output set. It is
    /// removed on commit, after every staged table is in place.
    pub fn retire(&mut self, file_name: &str) {
        self.retired.push(self.dir.join(file_name));
    }

    /// Writes `rows` to a temporary sibling of `dir/file_name`.
    pub fn stage<T: Table>(&mut self, file_name: &str, rows: &[T]) -> Result<()> {
        let target = self.dir.join(file_name);
        let tmp = self.dir.join(format!(".{file_name}.tmp"));
        // Register before writing so a failed write is cleaned up too.
        self.staged.push((tmp.clone(), target));
        write_table(&tmp, rows)
    }

    /// Moves every staged table onto its destination, then removes retired
    /// tables. Returns the final paths.
    ///
    /// A failed rename leaves the remaining temporary files to `Drop`.
    pub fn commit(mut self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.staged.len());
        while let Some((tmp, target)) = self.staged.first() {
            std::fs::rename(tmp, target)?;
            info!(path = %target.display(), "Table written");
            let (_, target) = self.staged.remove(0);
            written.push(target);
        }

        for path in std::mem::take(&mut self.retired) {
            match std::fs::remove_file(&path) {
                Ok(()) => info!(path = %path.display(), "Stale table removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(written)
    }
}

impl Drop for StagedTables {
    fn drop(&mut self) {
        for (tmp, _) in &self.staged {
            if tmp.exists()
                && let Err(e) = std::fs::remove_file(tmp)
            {
                warn!(path = %tmp.display(), error = %e, "Failed to remove staged table");
            }
        }
    }
}
