// NibSnap - 4-bit Microcontroller Snapshot Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::storage::Storage;
use nibsnap_config::SlotConfig;
use std::path::{Path, PathBuf};

pub const DEFAULT_TEMPLATE: &str = nibsnap_config::DEFAULT_SLOT_TEMPLATE;
const PLACEHOLDER: &str = "{}";

/// Numbered save file names such as `save0.bin`, `save1.bin`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTemplate {
    directory: Option<PathBuf>,
    prefix: String,
    suffix: String,
}

impl Default for SlotTemplate {
    fn default() -> Self {
        Self {
            directory: None,
            prefix: "save".to_string(),
            suffix: ".bin".to_string(),
        }
    }
}

impl SlotTemplate {
    /// Split a template around its single `{}` placeholder.
    pub fn parse(template: &str) -> Option<Self> {
        let (prefix, suffix) = template.split_once(PLACEHOLDER)?;
        if suffix.contains(PLACEHOLDER) {
            return None;
        }
        Some(Self {
            directory: None,
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    pub fn from_config(cfg: &SlotConfig) -> Option<Self> {
        let template = Self::parse(&cfg.template)?;
        Some(match &cfg.directory {
            Some(dir) => template.in_dir(dir),
            None => template,
        })
    }

    pub fn in_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.directory = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn path_for(&self, index: u32) -> PathBuf {
        let name = format!("{}{}{}", self.prefix, index, self.suffix);
        match &self.directory {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    /// First index whose file does not exist yet.
    pub fn next_free(&self, storage: &dyn Storage) -> u32 {
        let mut index = 0;
        while storage.exists(&self.path_for(index)) {
            index += 1;
        }
        index
    }

    /// Highest contiguous index that exists, if any.
    pub fn most_recent(&self, storage: &dyn Storage) -> Option<u32> {
        self.next_free(storage).checked_sub(1)
    }

    pub fn next_free_path(&self, storage: &dyn Storage) -> PathBuf {
        self.path_for(self.next_free(storage))
    }

    pub fn most_recent_path(&self, storage: &dyn Storage) -> Option<PathBuf> {
        self.most_recent(storage).map(|i| self.path_for(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};

    #[test]
    fn test_default_names() {
        let t = SlotTemplate::default();
        assert_eq!(t.path_for(0), PathBuf::from("save0.bin"));
        assert_eq!(t.path_for(12), PathBuf::from("save12.bin"));
        assert_eq!(SlotTemplate::parse(DEFAULT_TEMPLATE), Some(t));
    }

    #[test]
    fn test_parse_rejects_bad_templates() {
        assert!(SlotTemplate::parse("save.bin").is_none());
        assert!(SlotTemplate::parse("save{}-{}.bin").is_none());
        let t = SlotTemplate::parse("{}.state").unwrap();
        assert_eq!(t.path_for(3), PathBuf::from("3.state"));
    }

    #[test]
    fn test_no_slots() {
        let storage = MemoryStorage::new();
        let t = SlotTemplate::default();
        assert_eq!(t.next_free(&storage), 0);
        assert_eq!(t.most_recent(&storage), None);
        assert_eq!(t.most_recent_path(&storage), None);
    }

    #[test]
    fn test_two_slots() {
        let storage = MemoryStorage::new();
        storage.insert("save0.bin", vec![]);
        storage.insert("save1.bin", vec![]);
        let t = SlotTemplate::default();
        assert_eq!(t.next_free(&storage), 2);
        assert_eq!(t.most_recent(&storage), Some(1));
        assert_eq!(t.next_free_path(&storage), PathBuf::from("save2.bin"));
    }

    #[test]
    fn test_probe_stops_at_first_gap() {
        let storage = MemoryStorage::new();
        storage.insert("save0.bin", vec![]);
        storage.insert("save2.bin", vec![]);
        let t = SlotTemplate::default();
        assert_eq!(t.next_free(&storage), 1);
        assert_eq!(t.most_recent(&storage), Some(0));
    }

    #[test]
    fn test_directory_from_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("slot-0.sav"), b"x").unwrap();

        let cfg = SlotConfig {
            directory: Some(dir.path().to_string_lossy().into_owned()),
            template: "slot-{}.sav".to_string(),
        };
        let t = SlotTemplate::from_config(&cfg).unwrap();
        assert_eq!(t.next_free(&FileStorage), 1);
        assert_eq!(
            t.most_recent_path(&FileStorage),
            Some(dir.path().join("slot-0.sav"))
        );
    }
}
