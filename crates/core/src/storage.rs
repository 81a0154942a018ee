// NibSnap - 4-bit Microcontroller Snapshot Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{SnapResult, SnapshotError};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Byte-oriented storage the snapshot files live in.
pub trait Storage {
    fn open_read(&self, path: &Path) -> SnapResult<Box<dyn Read>>;
    fn open_write(&self, path: &Path) -> SnapResult<Box<dyn Write>>;
    fn exists(&self, path: &Path) -> bool;
}

fn open_failure(path: &Path, source: std::io::Error) -> SnapshotError {
    SnapshotError::StorageOpen {
        path: path.to_path_buf(),
        source,
    }
}

/// Plain files on the host file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStorage;

impl Storage for FileStorage {
    fn open_read(&self, path: &Path) -> SnapResult<Box<dyn Read>> {
        let f = File::open(path).map_err(|e| open_failure(path, e))?;
        Ok(Box::new(BufReader::new(f)))
    }

    fn open_write(&self, path: &Path) -> SnapResult<Box<dyn Write>> {
        let f = File::create(path).map_err(|e| open_failure(path, e))?;
        Ok(Box::new(BufWriter::new(f)))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

type FileMap = Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>;

/// In-memory file map. Clones share the same files.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    files: FileMap,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, data: Vec<u8>) {
        self.lock().insert(path.into(), data);
    }

    pub fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.lock().get(path).cloned()
    }

    pub fn remove(&self, path: &Path) -> Option<Vec<u8>> {
        self.lock().remove(path)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Vec<u8>>> {
        self.files
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn open_read(&self, path: &Path) -> SnapResult<Box<dyn Read>> {
        let data = self.get(path).ok_or_else(|| {
            open_failure(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            )
        })?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn open_write(&self, path: &Path) -> SnapResult<Box<dyn Write>> {
        self.insert(path, Vec::new());
        Ok(Box::new(MemoryFile {
            path: path.to_path_buf(),
            files: self.files.clone(),
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }
}

/// Write handle that appends straight into the shared map.
struct MemoryFile {
    path: PathBuf,
    files: FileMap,
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut files = self
            .files
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        files.entry(self.path.clone()).or_default().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
