//! Comparable units extracted from plan documents.
//!
//! A Basic Plan Document yields free-text [`Provision`]s; an Adoption
//! Agreement yields structured [`Election`]s whose payload is discriminated
//! by `kind` (text, single_select, multi_select). Both are wrapped in
//! [`Item`] so the crosswalk pipeline can treat them uniformly.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ItemError {
    #[error("election {election}: option {option} is_selected={flag} disagrees with selected ids")]
    SelectionMismatch {
        election: String,
        option: String,
        flag: bool,
    },

    #[error("election {election}: selected option {option} is not among its options")]
    UnknownOption { election: String, option: String },

    #[error("item {0}: confidence must be within [0, 1]")]
    ConfidenceOutOfRange(String),

    #[error("item has an empty identifier")]
    EmptyId,

    #[error("item id {0} appears more than once")]
    DuplicateId(String),
}

// ── Shared enums ──

/// Completion status of an election or fill-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    #[default]
    Unanswered,
    Answered,
    Ambiguous,
    Conflict,
}

/// Provision taxonomy for common retirement plan provision categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionType {
    Eligibility,
    CompensationDefinition,
    EmployerContribution,
    EmployeeDeferral,
    VestingSchedule,
    DistributionTrigger,
    LoanProvision,
    HardshipWithdrawal,
    TopHeavy,
    CoverageTesting,
    ForfeitureUsage,
    PlanYear,
    NormalRetirementAge,
    #[serde(rename = "QACA_EACA")]
    QacaEaca,
    #[default]
    #[serde(other)]
    Other,
}

impl ProvisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eligibility => "eligibility",
            Self::CompensationDefinition => "compensation_definition",
            Self::EmployerContribution => "employer_contribution",
            Self::EmployeeDeferral => "employee_deferral",
            Self::VestingSchedule => "vesting_schedule",
            Self::DistributionTrigger => "distribution_trigger",
            Self::LoanProvision => "loan_provision",
            Self::HardshipWithdrawal => "hardship_withdrawal",
            Self::TopHeavy => "top_heavy",
            Self::CoverageTesting => "coverage_testing",
            Self::ForfeitureUsage => "forfeiture_usage",
            Self::PlanYear => "plan_year",
            Self::NormalRetirementAge => "normal_retirement_age",
            Self::QacaEaca => "QACA_EACA",
            Self::Other => "other",
        }
    }
}

// ── Provisions ──

/// A free-text clause extracted from a Basic Plan Document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provision {
    pub provision_id: String,
    pub document_id: String,
    /// Section number/letter as printed, e.g. "Section 2.01" or "Article IV(A)".
    pub section_reference: String,
    #[serde(default)]
    pub section_title: Option<String>,
    pub provision_text: String,
    #[serde(default)]
    pub provision_type: ProvisionType,
    pub confidence_score: f32,
    #[serde(default)]
    pub page_number: Option<u32>,
    /// Detected document vendor, when extraction identified one.
    #[serde(default)]
    pub vendor: Option<String>,
}

// ── Elections ──

/// Where an election was found in its source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub page: u32,
    pub question_number: String,
}

/// Text sub-field nested inside an option, e.g. "Other (specify): ____".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillIn {
    pub id: String,
    pub question_text: String,
    #[serde(default)]
    pub status: CompletionStatus,
    pub confidence: f32,
    #[serde(default)]
    pub value: Option<String>,
}

/// A selectable option of a single_select or multi_select election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionOption {
    pub option_id: String,
    /// Printed label ("a", "(b)", "1.").
    pub label: String,
    pub option_text: String,
    pub is_selected: bool,
    #[serde(default)]
    pub fill_ins: Vec<FillIn>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleSelectValue {
    #[serde(default)]
    pub option_id: Option<String>,
}

/// Selected option ids of a multi_select election. A set: duplicates
/// collapse on construction and order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSelectValue {
    #[serde(default)]
    pub option_ids: BTreeSet<String>,
}

/// Kind-discriminated election payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElectionPayload {
    Text {
        #[serde(default)]
        value: Option<String>,
    },
    SingleSelect {
        options: Vec<ElectionOption>,
        #[serde(default)]
        value: SingleSelectValue,
    },
    MultiSelect {
        options: Vec<ElectionOption>,
        #[serde(default)]
        value: MultiSelectValue,
    },
}

impl ElectionPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::SingleSelect { .. } => "single_select",
            Self::MultiSelect { .. } => "multi_select",
        }
    }

    /// Options in document order; empty for text elections.
    pub fn options(&self) -> &[ElectionOption] {
        match self {
            Self::Text { .. } => &[],
            Self::SingleSelect { options, .. } | Self::MultiSelect { options, .. } => options,
        }
    }

    fn is_option_selected(&self, option_id: &str) -> bool {
        match self {
            Self::Text { .. } => false,
            Self::SingleSelect { value, .. } => value.option_id.as_deref() == Some(option_id),
            Self::MultiSelect { value, .. } => value.option_ids.contains(option_id),
        }
    }

    fn selected_ids(&self) -> Vec<&str> {
        match self {
            Self::Text { .. } => Vec::new(),
            Self::SingleSelect { value, .. } => value.option_id.iter().map(String::as_str).collect(),
            Self::MultiSelect { value, .. } => value.option_ids.iter().map(String::as_str).collect(),
        }
    }
}

/// A structured question/answer unit extracted from an Adoption Agreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Election {
    pub id: String,
    /// Question number as printed (e.g. "2.03"). Provenance only.
    pub question_number: String,
    pub question_text: String,
    pub section_context: String,
    #[serde(default)]
    pub status: CompletionStatus,
    pub confidence: f32,
    pub provenance: Provenance,
    #[serde(flatten)]
    pub payload: ElectionPayload,
}

impl Election {
    /// Check the selection invariants between options and the selected value.
    pub fn validate(&self) -> Result<(), ItemError> {
        if self.id.trim().is_empty() {
            return Err(ItemError::EmptyId);
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ItemError::ConfidenceOutOfRange(self.id.clone()));
        }

        let options = self.payload.options();
        for selected in self.payload.selected_ids() {
            if !options.iter().any(|o| o.option_id == selected) {
                return Err(ItemError::UnknownOption {
                    election: self.id.clone(),
                    option: selected.to_string(),
                });
            }
        }

        for option in options {
            if option.is_selected != self.payload.is_option_selected(&option.option_id) {
                return Err(ItemError::SelectionMismatch {
                    election: self.id.clone(),
                    option: option.option_id.clone(),
                    flag: option.is_selected,
                });
            }
        }
        Ok(())
    }
}

// ── Items ──

/// Either comparable unit kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Item {
    Provision(Provision),
    Election(Election),
}

/// Location of an item in its source document, for audit traceability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub item_id: String,
    #[serde(default)]
    pub section_context: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

impl Item {
    pub fn id(&self) -> &str {
        match self {
            Self::Provision(p) => &p.provision_id,
            Self::Election(e) => &e.id,
        }
    }

    pub fn page(&self) -> Option<u32> {
        match self {
            Self::Provision(p) => p.page_number,
            Self::Election(e) => Some(e.provenance.page),
        }
    }

    /// Section heading used for hierarchy hints and anchors.
    pub fn section_context(&self) -> Option<&str> {
        match self {
            Self::Provision(p) => p.section_title.as_deref().or(Some(p.section_reference.as_str())),
            Self::Election(e) => Some(&e.section_context),
        }
    }

    /// Structural number of the item (question number or section reference).
    pub fn section_number(&self) -> &str {
        match self {
            Self::Provision(p) => &p.section_reference,
            Self::Election(e) => &e.question_number,
        }
    }

    pub fn anchor(&self) -> Anchor {
        Anchor {
            item_id: self.id().to_string(),
            section_context: self.section_context().map(str::to_string),
            page: self.page(),
        }
    }

    pub fn validate(&self) -> Result<(), ItemError> {
        match self {
            Self::Provision(p) => {
                if p.provision_id.trim().is_empty() {
                    return Err(ItemError::EmptyId);
                }
                if !(0.0..=1.0).contains(&p.confidence_score) {
                    return Err(ItemError::ConfidenceOutOfRange(p.provision_id.clone()));
                }
                Ok(())
            }
            Self::Election(e) => e.validate(),
        }
    }
}

/// All items extracted from one document, as handed over by extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentItems {
    pub document_id: String,
    #[serde(default)]
    pub provisions: Vec<Provision>,
    #[serde(default)]
    pub elections: Vec<Election>,
}

impl DocumentItems {
    /// Provisions first, then elections, each in extraction order.
    pub fn items(&self) -> Vec<Item> {
        self.provisions
            .iter()
            .cloned()
            .map(Item::Provision)
            .chain(self.elections.iter().cloned().map(Item::Election))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.provisions.len() + self.elections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
