//! Append-only listing of co-located pairs, one `<ref_1>:<ref_2>` per line.
//!
//! The writer loads the pairs already present in the file when it is opened,
//! so appending a pair that is already listed (in either order) is a no-op,
//! including across runs.
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::engine::PairKey;
use crate::io::writers::WriterError;

/// Every pair a listing line can stand for. References may contain `:`
/// themselves (URIs, drive letters), so each separator position is a candidate;
/// any of them renders back to the same line.
fn line_keys(line: &str) -> impl Iterator<Item = PairKey> + '_ {
    line.match_indices(':')
        .map(move |(i, _)| (&line[..i], &line[i + 1..]))
        .filter(|(a, b)| !a.is_empty() && !b.is_empty())
        .map(|(a, b)| PairKey::new(a, b))
}

#[derive(Debug)]
pub struct ListingWriter {
    path: PathBuf,
    seen: HashSet<PairKey>,
    file: Option<File>,
}

impl ListingWriter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WriterError> {
        let path = path.as_ref().to_path_buf();
        let mut seen = HashSet::new();
        if path.exists() {
            let file = File::open(&path).map_err(|e| WriterError::io(&path, e))?;
            for line in BufReader::new(file).lines() {
                let line = line.map_err(|e| WriterError::io(&path, e))?;
                seen.extend(line_keys(line.trim()));
            }
        }
        Ok(Self {
            path,
            seen,
            file: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, a: &str, b: &str) -> bool {
        self.seen.contains(&PairKey::new(a, b))
    }

    /// Append `a:b` unless the pair is already listed. Returns whether a line was written.
    pub fn append(&mut self, a: &str, b: &str) -> Result<bool, WriterError> {
        let key = PairKey::new(a, b);
        if self.seen.contains(&key) {
            debug!("Pair {} already listed in {:?}", key, self.path);
            return Ok(false);
        }
        if self.file.is_none() {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| WriterError::io(parent, e))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| WriterError::io(&self.path, e))?;
            self.file = Some(file);
        }
        if let Some(file) = self.file.as_mut() {
            writeln!(file, "{}:{}", a, b).map_err(|e| WriterError::io(&self.path, e))?;
            file.flush().map_err(|e| WriterError::io(&self.path, e))?;
        }
        self.seen.insert(key);
        Ok(true)
    }
}
