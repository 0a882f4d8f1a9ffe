//! Core types for plan document crosswalks: items, fingerprints, mappings,
//! comparisons, and the Arrow report schema.

pub mod fingerprint;
pub mod hierarchy;
pub mod item;
pub mod mapping;
pub mod schema;

pub use fingerprint::{FingerprintStyle, fingerprint};
pub use hierarchy::SectionHierarchy;
pub use item::{
    Anchor, CompletionStatus, DocumentItems, Election, ElectionOption, ElectionPayload, FillIn,
    Item, ItemError, MultiSelectValue, Provenance, Provision, ProvisionType, SingleSelectValue,
};
pub use mapping::{
    CheckOutcome, Classification, Comparison, ComparisonStatistics, ConfidenceCounts,
    ConfidenceLevel, ConsistencyChecks, DependencyStatus, ElectionDependency, ImpactCounts,
    ImpactLevel, LLM_FAILURE, Mapping, MatchType, MatchTypeCounts, OptionDescriptor,
    OptionMapping, OptionRelationship, QuestionAlignment, SCHEMA_VERSION, StructureAnalysis,
    ValueAlignment,
};
pub use schema::crosswalk;
