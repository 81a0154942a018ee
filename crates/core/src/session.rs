// NibSnap - 4-bit Microcontroller Snapshot Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::slots::SlotTemplate;
use crate::snapshot::{self, Format, SnapshotRecord, TickBase};
use crate::storage::Storage;
use crate::{Geometry, MachineState, SnapResult};
use std::path::{Path, PathBuf};
use tracing::info;

/// Save and load snapshots through a storage backend, including numbered
/// slots for continuing a session.
pub struct SessionStore<S: Storage> {
    pub storage: S,
    pub slots: SlotTemplate,
}

impl<S: Storage> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self::with_slots(storage, SlotTemplate::default())
    }

    pub fn with_slots(storage: S, slots: SlotTemplate) -> Self {
        Self { storage, slots }
    }

    pub fn save(&self, path: &Path, state: &dyn MachineState, format: Format) -> SnapResult<()> {
        // capture first so a rejected state never truncates an existing file
        let record = SnapshotRecord::capture(state, format)?;
        self.save_record(path, &record)?;
        Ok(())
    }

    /// Write an already captured or converted record. Returns bytes written.
    pub fn save_record(&self, path: &Path, record: &SnapshotRecord) -> SnapResult<usize> {
        let sink = self.storage.open_write(path)?;
        let written = record.encode(sink)?;
        info!(
            "Saved {:?} snapshot to {:?} ({} bytes)",
            record.format(),
            path,
            written
        );
        Ok(written)
    }

    pub fn load(
        &self,
        path: &Path,
        state: &mut dyn MachineState,
        tick_base: TickBase,
    ) -> SnapResult<Format> {
        let source = self.storage.open_read(path)?;
        let format = snapshot::restore(source, state, tick_base)?;
        info!("Loaded {:?} snapshot from {:?}", format, path);
        Ok(format)
    }

    /// Parse a snapshot without applying it to any machine.
    pub fn inspect(&self, path: &Path, geometry: Geometry) -> SnapResult<SnapshotRecord> {
        let source = self.storage.open_read(path)?;
        SnapshotRecord::decode(source, geometry)
    }

    pub fn next_free(&self) -> u32 {
        self.slots.next_free(&self.storage)
    }

    pub fn most_recent(&self) -> Option<u32> {
        self.slots.most_recent(&self.storage)
    }

    /// Save into the first unused slot and return its path.
    pub fn save_next(&self, state: &dyn MachineState, format: Format) -> SnapResult<PathBuf> {
        let path = self.slots.next_free_path(&self.storage);
        self.save(&path, state, format)?;
        Ok(path)
    }

    /// Load the most recent slot. Returns `None` when no slot exists.
    pub fn load_latest(
        &self,
        state: &mut dyn MachineState,
        tick_base: TickBase,
    ) -> SnapResult<Option<PathBuf>> {
        let Some(path) = self.slots.most_recent_path(&self.storage) else {
            return Ok(None);
        };
        self.load(&path, state, tick_base)?;
        Ok(Some(path))
    }
}
