use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use tracing::info;

use crate::error::PipelineError;
use crate::schema::{plant, store};

/// Validated plant identifier, canonical form `plant_<n>` with `n` in the
/// fixed fleet range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PlantId(String);

impl PlantId {
    /// Parse a raw identifier. Trims and lowercases before validating, so
    /// `" Plant_3 "` is accepted and normalized to `plant_3`.
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let folded = raw.trim().to_lowercase();
        let number = folded
            .strip_prefix(plant::PREFIX)
            .and_then(|n| n.parse::<u8>().ok());
        match number {
            // Rebuild the id so "plant_05" and "plant_5" share one key.
            Some(n) if (plant::MIN..=plant::MAX).contains(&n) => {
                Ok(Self(format!("{}{}", plant::PREFIX, n)))
            }
            _ => Err(PipelineError::UnknownPlant(format!(
                "'{}' is not a valid plant id (expected {}{}..{}{})",
                raw.trim(),
                plant::PREFIX,
                plant::MIN,
                plant::PREFIX,
                plant::MAX
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PlantId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PlantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unit a plant records raw downtime in. Canonical storage is always minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DowntimeUnit {
    #[default]
    Minutes,
    Hours,
}

impl DowntimeUnit {
    /// Multiplier taking a raw downtime value to minutes.
    pub fn to_minutes_factor(self) -> f64 {
        match self {
            Self::Minutes => 1.0,
            Self::Hours => 60.0,
        }
    }

    fn parse(raw: &str) -> Result<Self, PipelineError> {
        match raw.trim().to_lowercase().as_str() {
            "minutes" | "min" => Ok(Self::Minutes),
            "hours" | "h" => Ok(Self::Hours),
            other => Err(PipelineError::Config(format!(
                "invalid downtime_unit '{}' (expected 'minutes' or 'hours')",
                other
            ))),
        }
    }
}

/// Per-plant normalization rules from the mapping document.
#[derive(Debug, Clone)]
pub struct PlantRules {
    /// Raw column name (case-folded, trimmed) → canonical field name.
    pub columns: HashMap<String, String>,
    pub downtime_unit: DowntimeUnit,
}

/// Registry of per-plant column renames and unit conventions.
///
/// Loaded once at startup from a JSON document whose top-level keys are plant
/// ids and whose values are flat string-to-string rename maps. The reserved
/// key `downtime_unit` inside a plant's map declares the unit its raw
/// downtime is recorded in (minutes if absent). Read-only after load; pick up
/// changes by restarting the process.
#[derive(Debug, Clone)]
pub struct MappingRegistry {
    plants: HashMap<PlantId, PlantRules>,
}

impl MappingRegistry {
    /// Load the registry from a JSON file. Any problem with the source is a
    /// `Config` error: missing file, invalid JSON, a value that is not a flat
    /// string-to-string map, an unrecognized plant key, or a bad unit value.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read mapping file {}: {e}", path.display()))
        })?;
        let registry = Self::from_json(&text)?;
        info!(
            plants = registry.plants.len(),
            path = %path.display(),
            "loaded plant mapping registry"
        );
        Ok(registry)
    }

    /// Parse the registry from a JSON string. Same validation as `load`.
    pub fn from_json(text: &str) -> Result<Self, PipelineError> {
        let raw: HashMap<String, HashMap<String, String>> = serde_json::from_str(text)
            .map_err(|e| PipelineError::Config(format!("malformed mapping document: {e}")))?;

        let mut plants = HashMap::with_capacity(raw.len());
        for (key, entry) in raw {
            let plant = PlantId::parse(&key)
                .map_err(|_| PipelineError::Config(format!("invalid plant key '{key}'")))?;

            let mut columns = HashMap::with_capacity(entry.len());
            let mut downtime_unit = DowntimeUnit::default();
            for (raw_col, target) in entry {
                let folded = raw_col.trim().to_lowercase();
                if folded == store::DOWNTIME_UNIT_KEY {
                    downtime_unit = DowntimeUnit::parse(&target)?;
                } else {
                    columns.insert(folded, target.trim().to_string());
                }
            }

            plants.insert(
                plant,
                PlantRules {
                    columns,
                    downtime_unit,
                },
            );
        }

        Ok(Self { plants })
    }

    /// Look up the rules for a plant. Absence is an `UnknownPlant` error:
    /// every plant id used anywhere in the system must be registered here.
    pub fn rules(&self, plant: &PlantId) -> Result<&PlantRules, PipelineError> {
        self.plants.get(plant).ok_or_else(|| {
            PipelineError::UnknownPlant(format!("plant '{plant}' is not in the mapping registry"))
        })
    }

    pub fn contains(&self, plant: &PlantId) -> bool {
        self.plants.contains_key(plant)
    }

    /// Registered plant ids, sorted.
    pub fn plant_ids(&self) -> Vec<PlantId> {
        let mut ids: Vec<PlantId> = self.plants.keys().cloned().collect();
        ids.sort();
        ids
    }
}
