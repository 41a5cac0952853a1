use std::sync::Arc;

use axion_graph::Graph;
use test_case::test_case;

use crate::config::FusionConfig;
use crate::error::{Error, Result};
use crate::pattern::{PatternBuilder, RulePattern};
use crate::priority::merge::{
    build_plan, override_sort_key, BUILTIN_RULE_DEFAULT, CUSTOM_RULE_DEFAULT, DOWN_OFFSET,
};
use crate::priority::switch::{is_enabled, LicenseGate, OpenLicense};
use crate::priority::{FusionCatalog, FusionPass, FusionPhase, Origin};

fn rule(name: &str) -> Arc<RulePattern> {
    Arc::new(
        PatternBuilder::new(name)
            .origin("a", &["A"])
            .outer_output("out")
            .edge(("a", 0), ("out", 0))
            .build()
            .unwrap(),
    )
}

struct NoopPass(&'static str);

impl FusionPass for NoopPass {
    fn name(&self) -> &str {
        self.0
    }

    fn run(&self, _graph: &mut Graph) -> Result<()> {
        Ok(())
    }
}

struct DenyAll;

impl LicenseGate for DenyAll {
    fn allows(&self, _feature: &str) -> bool {
        false
    }
}

fn empty() -> FusionConfig {
    FusionConfig::default()
}

fn plan_names(catalog: &FusionCatalog, custom: &FusionConfig, builtin: &FusionConfig) -> Vec<String> {
    build_plan(catalog, custom, builtin, &OpenLicense)
        .unwrap()
        .entries()
        .iter()
        .map(|e| e.name().to_owned())
        .collect()
}

// ============================================================================
// Bands
// ============================================================================

#[test_case(0, Some(0))]
#[test_case(999, Some(999))]
#[test_case(1500, Some(1500))]
#[test_case(2500, Some(2500 + DOWN_OFFSET))]
#[test_case(3000, Some(3000))]
#[test_case(4100, Some(4100))]
#[test_case(5999, Some(5999 + DOWN_OFFSET))]
#[test_case(-1, None)]
#[test_case(6000, None)]
fn override_band_keys(value: i64, expected: Option<i64>) {
    assert_eq!(override_sort_key(value), expected);
}

// ============================================================================
// Catalog
// ============================================================================

#[test]
fn duplicate_name_in_one_population_is_rejected() {
    let mut catalog = FusionCatalog::new();
    catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("R")).unwrap();
    let err = catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("R")).unwrap_err();
    assert!(matches!(err, Error::DuplicateRegistration { .. }));
}

#[test]
fn same_name_across_populations_is_fine() {
    let mut catalog = FusionCatalog::new();
    catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("R")).unwrap();
    catalog.register_custom_rule(FusionPhase::GraphFusion, rule("R")).unwrap();
}

#[test]
fn phase_conflict_keeps_the_first_registration() {
    let mut catalog = FusionCatalog::new();
    catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("R")).unwrap();
    catalog.register_builtin_rule(FusionPhase::BufferFusion, rule("R")).unwrap();
    assert_eq!(catalog.builtin().count(), 1);
    assert_eq!(catalog.builtin().next().unwrap().phase(), FusionPhase::GraphFusion);
}

// ============================================================================
// Switches
// ============================================================================

#[test]
fn custom_switch_entry_beats_builtin() {
    let mut catalog = FusionCatalog::new();
    catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("R")).unwrap();
    let custom = FusionConfig::from_json(r#"{"Switch": {"GraphFusion": {"R": "off"}}}"#).unwrap();
    let builtin = FusionConfig::from_json(r#"{"Switch": {"GraphFusion": {"R": "on"}}}"#).unwrap();
    assert!(plan_names(&catalog, &custom, &builtin).is_empty());
}

#[test]
fn explicit_entry_survives_a_category_wide_off() {
    let mut catalog = FusionCatalog::new();
    catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("R")).unwrap();
    catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("S")).unwrap();
    let custom = FusionConfig::from_json(r#"{"Switch": {"GraphFusion": {"ALL": "off", "R": "on"}}}"#).unwrap();
    assert_eq!(plan_names(&catalog, &custom, &empty()), vec!["R"]);
}

#[test]
fn forbidden_closed_items_cannot_be_switched_off() {
    let mut catalog = FusionCatalog::new();
    catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("CanonicalizeGraph")).unwrap();
    let custom =
        FusionConfig::from_json(r#"{"Switch": {"GraphFusion": {"CanonicalizeGraph": "off", "ALL": "off"}}}"#)
            .unwrap();
    assert_eq!(plan_names(&catalog, &custom, &empty()), vec!["CanonicalizeGraph"]);
}

#[test]
fn license_gate_applies_only_without_explicit_entries() {
    let mut catalog = FusionCatalog::new();
    catalog.register_licensed_rule(FusionPhase::GraphFusion, rule("Pro"), "pro").unwrap();
    let entry = catalog.builtin().next().unwrap();

    assert!(!is_enabled(entry, &empty(), &empty(), &DenyAll));
    assert!(is_enabled(entry, &empty(), &empty(), &OpenLicense));

    let custom = FusionConfig::from_json(r#"{"Switch": {"GraphFusion": {"Pro": "on"}}}"#).unwrap();
    assert!(is_enabled(entry, &custom, &empty(), &DenyAll));
}

#[test]
fn switching_one_pass_off_leaves_the_rest_on() {
    let mut catalog = FusionCatalog::new();
    catalog.register_builtin_pass(FusionPhase::GraphFusion, Arc::new(NoopPass("MyPass"))).unwrap();
    catalog.register_builtin_pass(FusionPhase::GraphFusion, Arc::new(NoopPass("OtherPass"))).unwrap();
    let custom = FusionConfig::from_json(r#"{"Switch": {"GraphFusion": {"MyPass": "off"}}}"#).unwrap();
    assert_eq!(plan_names(&catalog, &custom, &empty()), vec!["OtherPass"]);
}

// ============================================================================
// Plan ordering
// ============================================================================

#[test]
fn default_order_is_customs_then_builtins_passes_first() {
    let mut catalog = FusionCatalog::new();
    catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("br")).unwrap();
    catalog.register_builtin_pass(FusionPhase::GraphFusion, Arc::new(NoopPass("bp"))).unwrap();
    catalog.register_custom_rule(FusionPhase::GraphFusion, rule("cr")).unwrap();
    catalog.register_custom_pass(FusionPhase::GraphFusion, Arc::new(NoopPass("cp"))).unwrap();

    assert_eq!(plan_names(&catalog, &empty(), &empty()), vec!["cp", "cr", "bp", "br"]);

    let plan = build_plan(&catalog, &empty(), &empty(), &OpenLicense).unwrap();
    assert_eq!(plan.entries()[1].sort_key(), CUSTOM_RULE_DEFAULT);
    assert_eq!(plan.entries()[3].sort_key(), BUILTIN_RULE_DEFAULT);
    assert_eq!(plan.entries()[0].origin(), Origin::Custom);
    assert_eq!(plan.entries()[3].origin(), Origin::BuiltIn);
}

#[test]
fn custom_only_override_interleaves_the_populations() {
    let mut catalog = FusionCatalog::new();
    catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("br1")).unwrap();
    catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("br2")).unwrap();
    catalog.register_custom_rule(FusionPhase::GraphFusion, rule("cr")).unwrap();

    // br1 is pulled into the custom-top band by a name the built-in document
    // does not mention, so the whole phase sorts as one list.
    let custom = FusionConfig::from_json(r#"{"Priority": {"GraphFusion": {"br1": 500}}}"#).unwrap();
    assert_eq!(plan_names(&catalog, &custom, &empty()), vec!["br1", "cr", "br2"]);
}

#[test]
fn known_override_names_keep_customs_in_front() {
    let mut catalog = FusionCatalog::new();
    catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("br1")).unwrap();
    catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("br2")).unwrap();
    catalog.register_custom_rule(FusionPhase::GraphFusion, rule("cr")).unwrap();

    // the custom document only re-tunes a name the built-in document already
    // covers; the custom value wins but populations stay separate
    let custom = FusionConfig::from_json(r#"{"Priority": {"GraphFusion": {"br1": 4100}}}"#).unwrap();
    let builtin = FusionConfig::from_json(r#"{"Priority": {"GraphFusion": {"br1": 4200}}}"#).unwrap();
    let names = plan_names(&catalog, &custom, &builtin);
    assert_eq!(names, vec!["cr", "br1", "br2"]);

    let plan = build_plan(&catalog, &custom, &builtin, &OpenLicense).unwrap();
    assert_eq!(plan.entries()[1].sort_key(), 4100);
}

#[test]
fn down_band_runs_after_defaults() {
    let mut catalog = FusionCatalog::new();
    catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("br1")).unwrap();
    catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("br2")).unwrap();

    let builtin = FusionConfig::from_json(r#"{"Priority": {"GraphFusion": {"br1": 5500}}}"#).unwrap();
    assert_eq!(plan_names(&catalog, &empty(), &builtin), vec!["br2", "br1"]);
}

#[test]
fn out_of_range_override_is_an_error() {
    let mut catalog = FusionCatalog::new();
    catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("br")).unwrap();
    let builtin = FusionConfig::from_json(r#"{"Priority": {"GraphFusion": {"br": 6001}}}"#).unwrap();
    let err = build_plan(&catalog, &empty(), &builtin, &OpenLicense).unwrap_err();
    assert!(matches!(err, Error::PriorityOutOfRange { value: 6001, .. }));
}

#[test]
fn phases_stay_in_pipeline_order() {
    let mut catalog = FusionCatalog::new();
    catalog.register_builtin_rule(FusionPhase::QuantFusion, rule("q")).unwrap();
    catalog.register_builtin_rule(FusionPhase::GraphFusion, rule("g")).unwrap();
    catalog.register_builtin_rule(FusionPhase::BufferFusion, rule("b")).unwrap();

    assert_eq!(plan_names(&catalog, &empty(), &empty()), vec!["g", "b", "q"]);
}
