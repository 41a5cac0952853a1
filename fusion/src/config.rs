//! External fusion configuration.
//!
//! Two JSON documents drive the plan builder: the built-in document shipped
//! with the compiler and an optional custom document supplied by the user.
//! Both share the same shape:
//!
//! ```json
//! {
//!     "Switch": { "GraphFusion": { "MatMulBiasAdd": "on", "ALL": "off" } },
//!     "Priority": { "GraphFusion": { "MatMulBiasAdd": 4100 } }
//! }
//! ```
//!
//! Categories are fusion phase names; the reserved `ALL` switch entry toggles
//! a whole category. Priority values index into the band scheme described in
//! the `priority` module.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{self, Result};

/// Switch position of one item or one whole category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchState {
    #[serde(rename = "on")]
    On,
    #[serde(rename = "off")]
    Off,
}

impl SwitchState {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

/// Reserved switch entry name that toggles an entire category.
pub const ALL_ENTRY: &str = "ALL";

/// The `Switch` document section: category name to per-item states.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwitchSection(HashMap<String, HashMap<String, SwitchState>>);

impl SwitchSection {
    /// Explicit state of one item in one category, if declared.
    pub fn entry(&self, category: &str, name: &str) -> Option<SwitchState> {
        self.0.get(category).and_then(|c| c.get(name)).copied()
    }

    /// The category-wide `ALL` state, if declared.
    pub fn category_all(&self, category: &str) -> Option<SwitchState> {
        self.entry(category, ALL_ENTRY)
    }
}

/// The `Priority` document section: category name to per-item override
/// values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrioritySection(HashMap<String, HashMap<String, i64>>);

impl PrioritySection {
    /// Flatten the section into one name-to-value map.
    ///
    /// Categories are visited in sorted order so failures are deterministic;
    /// a name declared in more than one category is an error.
    pub fn overrides(&self) -> Result<HashMap<String, i64>> {
        let mut out = HashMap::new();
        let mut categories: Vec<&String> = self.0.keys().collect();
        categories.sort();
        for cat in categories {
            for (name, &value) in &self.0[cat] {
                if out.insert(name.clone(), value).is_some() {
                    return error::DuplicatePriorityNameSnafu { name: name.clone() }.fail();
                }
            }
        }
        Ok(out)
    }

    /// Whether the section declares an override for `name` in any category.
    pub fn contains(&self, name: &str) -> bool {
        self.0.values().any(|c| c.contains_key(name))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(HashMap::is_empty)
    }
}

/// One parsed configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FusionConfig {
    #[serde(rename = "Switch", default)]
    pub switch: SwitchSection,
    #[serde(rename = "Priority", default)]
    pub priority: PrioritySection,
}

impl FusionConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context(error::ConfigParseSnafu)
    }
}
