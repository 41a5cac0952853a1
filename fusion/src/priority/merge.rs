//! Plan construction: switch filtering, priority bands, ordering.
//!
//! Override values live in six bands of a thousand:
//!
//! ```text
//! 0..1000     custom top        3000..4000  built-in top
//! 1000..2000  custom main       4000..5000  built-in main
//! 2000..3000  custom down       5000..6000  built-in down
//! ```
//!
//! The sort key of an overridden entry is its value, except that the two
//! down bands are pushed behind everything else with [`DOWN_OFFSET`].
//! Entries without an override get a population default between the top/main
//! bands and the down bands, so overridden-up entries run before defaults
//! and overridden-down entries run after them.

use tracing::warn;

use crate::config::FusionConfig;
use crate::error::{self, Result};
use crate::priority::catalog::{CatalogEntry, FusionCatalog};
use crate::priority::switch::{is_enabled, LicenseGate};
use crate::priority::{FusionPhase, ItemKind, ItemPayload, Origin};

/// Added to the sort key of entries overridden into a down band.
pub const DOWN_OFFSET: i64 = 1_000_000;

/// Upper bound of the override value space.
pub const OVERRIDE_LIMIT: i64 = 6000;

pub const CUSTOM_PASS_DEFAULT: i64 = 100_000;
pub const CUSTOM_RULE_DEFAULT: i64 = 100_100;
pub const BUILTIN_PASS_DEFAULT: i64 = 100_200;
pub const BUILTIN_RULE_DEFAULT: i64 = 100_300;

/// Sort key for an override value, or `None` when the value falls outside
/// every band.
pub fn override_sort_key(value: i64) -> Option<i64> {
    if !(0..OVERRIDE_LIMIT).contains(&value) {
        return None;
    }
    let down = (2000..3000).contains(&value) || (5000..6000).contains(&value);
    Some(if down { value + DOWN_OFFSET } else { value })
}

/// One schedulable unit of the plan.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    name: String,
    kind: ItemKind,
    origin: Origin,
    phase: FusionPhase,
    sort_key: i64,
    payload: ItemPayload,
}

impl PlanEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn phase(&self) -> FusionPhase {
        self.phase
    }

    pub fn sort_key(&self) -> i64 {
        self.sort_key
    }

    pub fn payload(&self) -> &ItemPayload {
        &self.payload
    }
}

/// Ordered fusion work, grouped by phase in phase execution order.
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    entries: Vec<PlanEntry>,
}

impl ExecutionPlan {
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries of one phase, in execution order.
    pub fn phase_entries(&self, phase: FusionPhase) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(move |e| e.phase == phase)
    }
}

/// Build the execution plan from the catalog and both configuration
/// documents.
///
/// Per phase, disabled entries are dropped, survivors get sort keys, and the
/// two populations are merged. When the custom document overrides at least
/// one name the built-in document does not mention, the populations are
/// fully interleaved by sort key; otherwise custom entries keep their
/// registration order ahead of the sorted built-in entries. Both sorts are
/// stable, so equal keys preserve registration order.
pub fn build_plan(
    catalog: &FusionCatalog,
    custom: &FusionConfig,
    builtin: &FusionConfig,
    gate: &dyn LicenseGate,
) -> Result<ExecutionPlan> {
    let custom_over = custom.priority.overrides()?;
    let builtin_over = builtin.priority.overrides()?;
    let full_interleave = custom_over.keys().any(|name| !builtin.priority.contains(name));

    let sort_key_of = |entry: &CatalogEntry, origin: Origin| -> Result<i64> {
        let value = custom_over.get(entry.name()).or_else(|| builtin_over.get(entry.name()));
        match value {
            Some(&v) => override_sort_key(v)
                .ok_or_else(|| error::PriorityOutOfRangeSnafu { name: entry.name().to_owned(), value: v }.build()),
            None => Ok(match (origin, entry.payload().kind()) {
                (Origin::Custom, ItemKind::Pass) => CUSTOM_PASS_DEFAULT,
                (Origin::Custom, ItemKind::Rule) => CUSTOM_RULE_DEFAULT,
                (Origin::BuiltIn, ItemKind::Pass) => BUILTIN_PASS_DEFAULT,
                (Origin::BuiltIn, ItemKind::Rule) => BUILTIN_RULE_DEFAULT,
            }),
        }
    };

    let mut entries = Vec::new();
    for phase in FusionPhase::ALL {
        let mut custom_entries = Vec::new();
        let mut builtin_entries = Vec::new();
        for (source, origin, bucket) in [
            (catalog.custom().collect::<Vec<_>>(), Origin::Custom, &mut custom_entries),
            (catalog.builtin().collect::<Vec<_>>(), Origin::BuiltIn, &mut builtin_entries),
        ] {
            for entry in source {
                if entry.phase() != phase || !is_enabled(entry, custom, builtin, gate) {
                    continue;
                }
                bucket.push(PlanEntry {
                    name: entry.name().to_owned(),
                    kind: entry.payload().kind(),
                    origin,
                    phase,
                    sort_key: sort_key_of(entry, origin)?,
                    payload: entry.payload().clone(),
                });
            }
        }

        if full_interleave {
            let mut merged: Vec<PlanEntry> = custom_entries;
            merged.append(&mut builtin_entries);
            merged.sort_by_key(PlanEntry::sort_key);
            entries.extend(merged);
        } else {
            builtin_entries.sort_by_key(PlanEntry::sort_key);
            entries.extend(custom_entries);
            entries.extend(builtin_entries);
        }
    }

    let known = |name: &str| {
        catalog.custom().chain(catalog.builtin()).any(|e| e.name() == name)
    };
    for name in custom_over.keys().chain(builtin_over.keys()) {
        if !known(name) {
            warn!(name = %name, "priority override does not match any registered pass or rule");
        }
    }

    Ok(ExecutionPlan { entries })
}
