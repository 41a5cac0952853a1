//! On/off resolution for catalog entries.
//!
//! Resolution order, first hit wins:
//!
//! 1. the forbidden-closed list (always on),
//! 2. an explicit per-name switch entry, custom document before built-in,
//! 3. the category-wide `ALL` entry, custom document before built-in,
//! 4. the license gate, when the entry names a required feature,
//! 5. default on.

use crate::config::FusionConfig;
use crate::priority::catalog::{CatalogEntry, FORBIDDEN_CLOSED};

/// Decides whether a license feature is granted.
pub trait LicenseGate {
    fn allows(&self, feature: &str) -> bool;
}

/// Grants every feature. The default gate for unrestricted deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenLicense;

impl LicenseGate for OpenLicense {
    fn allows(&self, _feature: &str) -> bool {
        true
    }
}

/// Whether one catalog entry participates in the plan.
pub fn is_enabled(
    entry: &CatalogEntry,
    custom: &FusionConfig,
    builtin: &FusionConfig,
    gate: &dyn LicenseGate,
) -> bool {
    if FORBIDDEN_CLOSED.contains(&entry.name()) {
        return true;
    }
    let category = entry.phase().as_str();
    if let Some(state) = custom
        .switch
        .entry(category, entry.name())
        .or_else(|| builtin.switch.entry(category, entry.name()))
    {
        return state.is_on();
    }
    if let Some(state) =
        custom.switch.category_all(category).or_else(|| builtin.switch.category_all(category))
    {
        return state.is_on();
    }
    if let Some(feature) = entry.needs_license() {
        return gate.allows(feature);
    }
    true
}
