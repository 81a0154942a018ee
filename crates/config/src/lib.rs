// NibSnap - 4-bit Microcontroller Snapshot Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SUPPORTED_SCHEMA_VERSION: &str = "1.0";
pub const DEFAULT_SLOT_TEMPLATE: &str = "save{}.bin";
pub const DEFAULT_INTERRUPT_SLOTS: usize = 6;
pub const DEFAULT_MEMORY_CELLS: usize = 4096;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FormatName {
    Compact,
    #[default]
    Legacy,
}

/// How Compact timer deltas are resolved on load.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TickBasePolicy {
    /// Use whatever tick counter the target state already holds.
    #[default]
    Current,
    /// Overwrite the tick counter with this value before resolving.
    Reset(u32),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GeometryConfig {
    #[serde(default = "default_interrupt_slots")]
    pub interrupt_slots: usize,
    #[serde(default = "default_memory_cells")]
    pub memory_cells: usize,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            interrupt_slots: DEFAULT_INTERRUPT_SLOTS,
            memory_cells: DEFAULT_MEMORY_CELLS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SlotConfig {
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default = "default_template")]
    pub template: String,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            directory: None,
            template: DEFAULT_SLOT_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct SaveConfig {
    #[serde(default)]
    pub format: FormatName,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct LoadConfig {
    #[serde(default)]
    pub tick_base: TickBasePolicy,
}

/// Snapshot profile: emulated machine geometry plus save/load defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SnapshotProfile {
    pub schema_version: String,
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub slots: SlotConfig,
    #[serde(default)]
    pub save: SaveConfig,
    #[serde(default)]
    pub load: LoadConfig,
}

impl Default for SnapshotProfile {
    fn default() -> Self {
        Self {
            schema_version: SUPPORTED_SCHEMA_VERSION.to_string(),
            geometry: GeometryConfig::default(),
            slots: SlotConfig::default(),
            save: SaveConfig::default(),
            load: LoadConfig::default(),
        }
    }
}

fn default_interrupt_slots() -> usize {
    DEFAULT_INTERRUPT_SLOTS
}

fn default_memory_cells() -> usize {
    DEFAULT_MEMORY_CELLS
}

fn default_template() -> String {
    DEFAULT_SLOT_TEMPLATE.to_string()
}

impl SnapshotProfile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open snapshot profile at {:?}", path.as_ref()))?;
        let profile: Self =
            serde_yaml::from_reader(f).context("Failed to parse Snapshot Profile YAML")?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SUPPORTED_SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '{}'",
                self.schema_version,
                SUPPORTED_SCHEMA_VERSION
            );
        }

        if self.geometry.memory_cells == 0 {
            anyhow::bail!("Geometry 'memory_cells' must be greater than zero");
        }

        let placeholders = self.slots.template.matches("{}").count();
        if placeholders != 1 {
            anyhow::bail!(
                "Slot 'template' must contain exactly one '{{}}' placeholder, found {}",
                placeholders
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_profile() {
        let yaml = r#"
schema_version: "1.0"
geometry:
  interrupt_slots: 6
  memory_cells: 4096
slots:
  directory: "saves"
  template: "slot-{}.bin"
save:
  format: compact
load:
  tick_base: !reset 1000
"#;
        let profile: SnapshotProfile = serde_yaml::from_str(yaml).unwrap();
        assert!(profile.validate().is_ok());
        assert_eq!(profile.slots.directory.as_deref(), Some("saves"));
        assert_eq!(profile.save.format, FormatName::Compact);
        assert_eq!(profile.load.tick_base, TickBasePolicy::Reset(1000));
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let yaml = r#"
schema_version: "1.0"
"#;
        let profile: SnapshotProfile = serde_yaml::from_str(yaml).unwrap();
        assert!(profile.validate().is_ok());
        assert_eq!(profile, SnapshotProfile::default());
        assert_eq!(profile.slots.template, "save{}.bin");
        assert_eq!(profile.load.tick_base, TickBasePolicy::Current);
    }

    #[test]
    fn test_invalid_version() {
        let yaml = r#"
schema_version: "2.0"
"#;
        let profile: SnapshotProfile = serde_yaml::from_str(yaml).unwrap();
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("Unsupported schema_version"));
    }

    #[test]
    fn test_template_without_placeholder() {
        let yaml = r#"
schema_version: "1.0"
slots:
  template: "save.bin"
"#;
        let profile: SnapshotProfile = serde_yaml::from_str(yaml).unwrap();
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("placeholder"));
    }

    #[test]
    fn test_zero_memory_rejected() {
        let yaml = r#"
schema_version: "1.0"
geometry:
  memory_cells: 0
"#;
        let profile: SnapshotProfile = serde_yaml::from_str(yaml).unwrap();
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("memory_cells"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
schema_version: "1.0"
geometry:
  memory_nibbles: 12
"#;
        assert!(serde_yaml::from_str::<SnapshotProfile>(yaml).is_err());
    }
}
