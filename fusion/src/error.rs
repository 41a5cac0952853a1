use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The pattern cannot be matched at all; the caller skips the rule.
    #[snafu(display("rule {rule:?} is malformed: {reason}"))]
    MalformedPattern { rule: String, reason: String },

    /// Two rule nodes share a name inside one pattern.
    #[snafu(display("rule {rule:?} declares node {name:?} more than once"))]
    DuplicateRuleNode { rule: String, name: String },

    /// An edge or attribute references a node the pattern never declared.
    #[snafu(display("rule {rule:?} references unknown node {name:?}"))]
    UnknownRuleNode { rule: String, name: String },

    /// A data input anchor already has a producer edge in the pattern.
    #[snafu(display("rule {rule:?}: input {index:?} of node {name:?} already has a producer"))]
    DuplicatePatternEdge { rule: String, name: String, index: String },

    /// Origin and replacement nodes need at least one acceptable type label.
    #[snafu(display("rule {rule:?}: node {name:?} needs at least one type label"))]
    MissingTypeLabels { rule: String, name: String },

    /// Same name registered twice within one catalog population.
    #[snafu(display("{name:?} is already registered in the {population} population"))]
    DuplicateRegistration { name: String, population: &'static str },

    /// Priority override value outside every declared band.
    #[snafu(display("priority override for {name:?} is out of range: {value} (bands cover 0..6000)"))]
    PriorityOutOfRange { name: String, value: i64 },

    /// Same name appears in more than one category of a priority section.
    #[snafu(display("{name:?} appears in more than one priority category"))]
    DuplicatePriorityName { name: String },

    /// Configuration document failed to deserialize.
    #[snafu(display("failed to parse fusion config: {source}"))]
    ConfigParse { source: serde_json::Error },

    /// The replace step failed in a non-recoverable way.
    #[snafu(display("replacement for rule {rule:?} failed: {reason}"))]
    ReplaceFailed { rule: String, reason: String },

    #[snafu(context(false), display("graph error: {source}"))]
    Graph { source: axion_graph::Error },
}
