//! Mitigation effectiveness scale
//!
//! An ordered list of four levels. A level's 1-based position is its column
//! on the net axis; its coefficient is the share of the brut score that
//! mitigation removes.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Level assumed when a risk carries no valid effectiveness
pub const DEFAULT_MITIGATION_LEVEL: &str = "insuffisant";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MitigationLevel {
    pub value: String,
    pub label: String,
    pub coefficient: f64,
}

/// Ordered mitigation levels, weakest first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MitigationScale {
    levels: Vec<MitigationLevel>,
    default_index: usize,
}

impl Default for MitigationScale {
    fn default() -> Self {
        let levels = vec![
            level("inefficace", "Inefficace", 0.0),
            level("insuffisant", "Insuffisant", 0.25),
            level("ameliorable", "Améliorable", 0.5),
            level("efficace", "Efficace", 0.75),
        ];
        MitigationScale {
            levels,
            default_index: 1,
        }
    }
}

fn level(value: &str, label: &str, coefficient: f64) -> MitigationLevel {
    MitigationLevel {
        value: value.to_string(),
        label: label.to_string(),
        coefficient,
    }
}

impl MitigationScale {
    /// Build a scale from configured levels
    ///
    /// Fails when the list is empty or the default level is not part of it.
    pub fn new(levels: Vec<MitigationLevel>, default_level: &str) -> Result<Self> {
        if levels.is_empty() {
            anyhow::bail!("mitigation scale needs at least one level");
        }
        let default_index = levels
            .iter()
            .position(|l| l.value == default_level)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "default mitigation level '{}' is not one of the configured levels",
                    default_level
                )
            })?;
        Ok(MitigationScale {
            levels,
            default_index,
        })
    }

    pub fn levels(&self) -> &[MitigationLevel] {
        &self.levels
    }

    pub fn default_level(&self) -> &MitigationLevel {
        &self.levels[self.default_index]
    }

    /// Level by value, ignoring surrounding whitespace
    pub fn get(&self, value: &str) -> Option<&MitigationLevel> {
        let value = value.trim();
        self.levels.iter().find(|l| l.value == value)
    }

    pub fn is_valid(&self, value: &str) -> bool {
        self.get(value).is_some()
    }

    /// Zero-based position, unknown values resolve to the default level
    pub fn index_of(&self, value: &str) -> usize {
        let value = value.trim();
        self.levels
            .iter()
            .position(|l| l.value == value)
            .unwrap_or(self.default_index)
    }

    /// Level for a possibly missing or invalid value
    pub fn resolve(&self, value: Option<&str>) -> &MitigationLevel {
        value
            .and_then(|v| self.get(v))
            .unwrap_or_else(|| self.default_level())
    }

    /// Net-axis column (1-based) for a level
    pub fn column(&self, value: &str) -> u8 {
        let index = self.index_of(value);
        u8::try_from(index + 1).unwrap_or(u8::MAX)
    }
}
