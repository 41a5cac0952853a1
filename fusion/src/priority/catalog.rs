//! Registration of fusion passes and rules.

use std::sync::Arc;

use crate::error::{self, Result};
use crate::pattern::RulePattern;
use crate::priority::{FusionPass, FusionPhase, ItemPayload};

/// Items that are load-bearing for correctness and can never be switched off,
/// not even by an explicit `off` entry.
pub const FORBIDDEN_CLOSED: &[&str] = &["CanonicalizeGraph"];

/// One registered pass or rule.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub(crate) name: String,
    pub(crate) phase: FusionPhase,
    pub(crate) payload: ItemPayload,
    /// License feature this item requires, if any. Checked by the switch
    /// resolver when no explicit switch entry decides first.
    pub(crate) needs_license: Option<String>,
}

impl CatalogEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> FusionPhase {
        self.phase
    }

    pub fn payload(&self) -> &ItemPayload {
        &self.payload
    }

    pub fn needs_license(&self) -> Option<&str> {
        self.needs_license.as_deref()
    }
}

/// All registered fusion work, split into four populations: custom and
/// built-in, passes and rules. Registration order within a population is
/// preserved and observable in the final plan.
#[derive(Debug, Default)]
pub struct FusionCatalog {
    custom_passes: Vec<CatalogEntry>,
    custom_rules: Vec<CatalogEntry>,
    builtin_passes: Vec<CatalogEntry>,
    builtin_rules: Vec<CatalogEntry>,
}

impl FusionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_custom_pass(&mut self, phase: FusionPhase, pass: Arc<dyn FusionPass>) -> Result<()> {
        let entry = CatalogEntry {
            name: pass.name().to_owned(),
            phase,
            payload: ItemPayload::Pass(pass),
            needs_license: None,
        };
        Self::push(&mut self.custom_passes, entry, "custom pass")
    }

    pub fn register_custom_rule(&mut self, phase: FusionPhase, rule: Arc<RulePattern>) -> Result<()> {
        let entry = CatalogEntry {
            name: rule.name().to_owned(),
            phase,
            payload: ItemPayload::Rule(rule),
            needs_license: None,
        };
        Self::push(&mut self.custom_rules, entry, "custom rule")
    }

    pub fn register_builtin_pass(&mut self, phase: FusionPhase, pass: Arc<dyn FusionPass>) -> Result<()> {
        let entry = CatalogEntry {
            name: pass.name().to_owned(),
            phase,
            payload: ItemPayload::Pass(pass),
            needs_license: None,
        };
        Self::push(&mut self.builtin_passes, entry, "built-in pass")
    }

    pub fn register_builtin_rule(&mut self, phase: FusionPhase, rule: Arc<RulePattern>) -> Result<()> {
        let entry = CatalogEntry {
            name: rule.name().to_owned(),
            phase,
            payload: ItemPayload::Rule(rule),
            needs_license: None,
        };
        Self::push(&mut self.builtin_rules, entry, "built-in rule")
    }

    /// Like [`register_builtin_rule`](Self::register_builtin_rule), but the
    /// rule stays off unless the active license grants `feature`.
    pub fn register_licensed_rule(
        &mut self,
        phase: FusionPhase,
        rule: Arc<RulePattern>,
        feature: impl Into<String>,
    ) -> Result<()> {
        let entry = CatalogEntry {
            name: rule.name().to_owned(),
            phase,
            payload: ItemPayload::Rule(rule),
            needs_license: Some(feature.into()),
        };
        Self::push(&mut self.builtin_rules, entry, "built-in rule")
    }

    /// Custom entries in registration order, passes before rules.
    pub fn custom(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.custom_passes.iter().chain(self.custom_rules.iter())
    }

    /// Built-in entries in registration order, passes before rules.
    pub fn builtin(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.builtin_passes.iter().chain(self.builtin_rules.iter())
    }

    /// Registering the same name twice within one population is an error,
    /// unless the phases differ: a name may legitimately appear in several
    /// phases, and the first registration wins for that phase conflict.
    fn push(list: &mut Vec<CatalogEntry>, entry: CatalogEntry, population: &'static str) -> Result<()> {
        if let Some(existing) = list.iter().find(|e| e.name == entry.name) {
            if existing.phase == entry.phase {
                return error::DuplicateRegistrationSnafu { name: entry.name.clone(), population }.fail();
            }
            tracing::warn!(
                name = %entry.name,
                population,
                "name already registered in another phase; keeping the first registration"
            );
            return Ok(());
        }
        list.push(entry);
        Ok(())
    }
}
