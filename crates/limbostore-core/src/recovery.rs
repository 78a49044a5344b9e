//! Offline reconstruction of staged Writes from page backing files.
//!
//! After a restart the page directory is the only record of Writes that
//! were acknowledged but never transported. The scanner rebuilds that
//! sequence without instantiating a live Buffer: a read-only, sequential
//! pass over each page file in creation order. It runs before normal
//! operation resumes, either to reload the Writes into memory or to
//! re-feed them straight toward the permanent store.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{LimboError, LimboResult};
use crate::format::scan_log;
use crate::page::list_page_files;
use crate::permanent::PermanentStore;
use crate::write::Write;

/// Stateless scanner over a directory of page backing files.
pub struct RecoveryScanner {
    dir: PathBuf,
}

impl RecoveryScanner {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Reconstruct the ordered Write sequence from every page file.
    ///
    /// Files are visited in filename (= creation) order, records within a
    /// file in append order, so the result is the original staging order.
    /// A page file whose process died mid-append reads up to its last
    /// complete record; the torn tail ends that file's scan cleanly
    /// rather than failing the whole recovery.
    pub fn scan(&self) -> LimboResult<Vec<Write>> {
        let mut all = Vec::new();
        for (sequence, path) in list_page_files(&self.dir)? {
            let mut data = Vec::new();
            File::open(&path)
                .map_err(|e| LimboError::io(&path, "failed to open page file", &e))?
                .read_to_end(&mut data)
                .map_err(|e| LimboError::io(&path, "failed to read page file", &e))?;

            let writes = scan_log(&data, &path);
            tracing::debug!(
                sequence,
                count = writes.len(),
                path = %path.display(),
                "scanned page file"
            );
            all.extend(writes);
        }

        tracing::info!(
            count = all.len(),
            dir = %self.dir.display(),
            "recovery scan complete"
        );
        Ok(all)
    }

    /// Scan and re-feed every recovered Write toward the permanent store,
    /// in order. Returns the number of Writes delivered; a destination
    /// failure stops the replay at that Write and surfaces.
    pub fn replay_into(&self, destination: &dyn PermanentStore) -> LimboResult<usize> {
        let writes = self.scan()?;
        for write in &writes {
            destination.accept(write)?;
        }
        Ok(writes.len())
    }
}
