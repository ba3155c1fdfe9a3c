//! Explicit level registry.
//!
//! Levels are registered once at startup and kept sorted by level index.
//! Registration rejects duplicate indices and duplicate report keys; a dojo
//! additionally requires the indices to be contiguous from 0.

use std::fmt;

use thiserror::Error;

use dojo_core::LevelKeys;

use crate::level::TrainingLevel;

/// Errors detected while assembling the ladder. Fatal before any training.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("found two levels with index {level}: {existing} and {duplicate}")]
    DuplicateLevel {
        level: u32,
        existing: String,
        duplicate: String,
    },

    #[error("report key '{key}' claimed by both {existing} and {duplicate}")]
    DuplicateReportKey {
        key: String,
        existing: String,
        duplicate: String,
    },

    #[error("level indices must be contiguous from 0: expected {expected}, found {found}")]
    LevelGap { expected: u32, found: u32 },

    #[error("no training levels registered")]
    Empty,
}

/// Training levels sorted by ascending level index.
#[derive(Default)]
pub struct LevelRegistry {
    levels: Vec<Box<dyn TrainingLevel>>,
}

impl LevelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a set of level implementations.
    pub fn from_levels(
        levels: impl IntoIterator<Item = Box<dyn TrainingLevel>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register_levels(levels)?;
        Ok(registry)
    }

    /// Register one level, keeping the ladder sorted.
    pub fn register(&mut self, level: Box<dyn TrainingLevel>) -> Result<(), RegistryError> {
        if let Some(existing) = self.levels.iter().find(|l| l.level() == level.level()) {
            return Err(RegistryError::DuplicateLevel {
                level: level.level(),
                existing: existing.name().to_string(),
                duplicate: level.name().to_string(),
            });
        }

        if let Some(existing) = self
            .levels
            .iter()
            .find(|l| l.report_key() == level.report_key())
        {
            return Err(RegistryError::DuplicateReportKey {
                key: level.report_key().to_string(),
                existing: existing.name().to_string(),
                duplicate: level.name().to_string(),
            });
        }

        let pos = self
            .levels
            .partition_point(|l| l.level() < level.level());
        self.levels.insert(pos, level);
        Ok(())
    }

    pub fn register_levels(
        &mut self,
        levels: impl IntoIterator<Item = Box<dyn TrainingLevel>>,
    ) -> Result<(), RegistryError> {
        for level in levels {
            self.register(level)?;
        }
        Ok(())
    }

    /// Check the ladder is non-empty and its indices run 0, 1, 2, ...
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.levels.is_empty() {
            return Err(RegistryError::Empty);
        }
        for (expected, level) in self.levels.iter().enumerate() {
            if level.level() != expected as u32 {
                return Err(RegistryError::LevelGap {
                    expected: expected as u32,
                    found: level.level(),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn TrainingLevel> {
        self.levels.iter().map(|l| l.as_ref())
    }

    /// Level with the given index.
    pub fn get(&self, level: u32) -> Option<&dyn TrainingLevel> {
        self.iter().find(|l| l.level() == level)
    }

    /// Level index owning a report key.
    pub fn level_for_key(&self, key: &str) -> Option<u32> {
        self.iter()
            .find(|l| l.report_key() == key)
            .map(|l| l.level())
    }

    /// Report keys in level order.
    pub fn keys(&self) -> LevelKeys {
        LevelKeys::new(self.iter().map(|l| l.report_key().to_string()).collect())
    }
}

impl fmt::Debug for LevelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.iter()
                    .map(|l| (l.level(), l.name().to_string(), l.report_key().to_string())),
            )
            .finish()
    }
}
