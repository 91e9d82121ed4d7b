use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionField {
    Entity,
    Category,
    Subcategory,
    Origin,
    Destination,
}

impl CorrectionField {
    pub const ALL: [Self; 5] = [
        Self::Entity,
        Self::Category,
        Self::Subcategory,
        Self::Origin,
        Self::Destination,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Category => "category",
            Self::Subcategory => "subcategory",
            Self::Origin => "origin",
            Self::Destination => "destination",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "entity" => Some(Self::Entity),
            "category" => Some(Self::Category),
            "subcategory" => Some(Self::Subcategory),
            "origin" => Some(Self::Origin),
            "destination" => Some(Self::Destination),
            _ => None,
        }
    }
}

/// Input to the classification tracker: one user edit.
#[derive(Debug, Clone)]
pub struct NewCorrection {
    pub tenant_id: String,
    pub transaction_ref: String,
    pub field: CorrectionField,
    pub old_value: Option<String>,
    pub new_value: String,
    pub description: String,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub actor: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationEvent {
    pub event_id: String,
    pub tenant_id: String,
    pub transaction_ref: String,
    pub field: CorrectionField,
    pub old_value: Option<String>,
    pub new_value: String,
    pub description: String,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

impl ClassificationEvent {
    /// An edit that leaves the value unchanged is not a real correction.
    pub fn is_noop(&self) -> bool {
        match &self.old_value {
            Some(old) => old.trim() == self.new_value.trim(),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SuggestionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub const fn is_decided(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternSuggestion {
    pub suggestion_id: String,
    pub tenant_id: String,
    pub pattern_type: CorrectionField,
    pub keywords: Vec<String>,
    pub target_value: String,
    pub origin: String,
    pub destination: String,
    pub occurrence_count: i64,
    pub event_ids: Vec<String>,
    pub first_event_at: DateTime<Utc>,
    pub status: SuggestionStatus,
    pub confidence: Option<f64>,
    pub justification: Option<String>,
    pub pattern_id: Option<String>,
    pub validation_attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
}

impl PatternSuggestion {
    pub fn match_expression(&self) -> MatchExpression {
        MatchExpression::Keywords {
            keywords: self.keywords.clone(),
        }
    }
}

/// How a pattern recognizes a transaction.
///
/// Stored and seeded as a tagged value, e.g.
/// `{"kind":"keywords","keywords":["received","btc"]}` or
/// `{"kind":"exact","text":"Monthly rent"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchExpression {
    Keywords { keywords: Vec<String> },
    Exact { text: String },
}

impl MatchExpression {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Keywords { .. } => "keywords",
            Self::Exact { .. } => "exact",
        }
    }

    /// Canonical text used for storage and the idempotency key.
    pub fn storage_text(&self) -> String {
        match self {
            Self::Keywords { keywords } => keywords
                .iter()
                .map(|keyword| keyword.trim().to_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .collect::<Vec<String>>()
                .join(" "),
            Self::Exact { text } => text
                .split_whitespace()
                .collect::<Vec<&str>>()
                .join(" ")
                .to_lowercase(),
        }
    }

    pub fn from_storage(kind: &str, text: &str) -> Option<Self> {
        match kind {
            "keywords" => Some(Self::Keywords {
                keywords: text
                    .split_whitespace()
                    .map(std::string::ToString::to_string)
                    .collect(),
            }),
            "exact" => Some(Self::Exact {
                text: text.to_string(),
            }),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.storage_text().is_empty()
    }

    /// Number of words the expression pins down; longer is more specific.
    pub fn specificity(&self) -> usize {
        self.storage_text().split_whitespace().count()
    }

    /// Precise trigger test: keyword expressions must appear as a contiguous,
    /// in-order run of the transaction's keywords; exact expressions must
    /// equal the whole description.
    pub fn matches(&self, keywords: &[String], description: &str) -> bool {
        match self {
            Self::Keywords { .. } => {
                let text = self.storage_text();
                let wanted: Vec<&str> = text.split_whitespace().collect();
                if wanted.is_empty() || wanted.len() > keywords.len() {
                    return false;
                }
                keywords.windows(wanted.len()).any(|window| {
                    window
                        .iter()
                        .zip(wanted.iter())
                        .all(|(have, want)| have == want)
                })
            }
            Self::Exact { .. } => {
                let normalized = description
                    .split_whitespace()
                    .collect::<Vec<&str>>()
                    .join(" ")
                    .to_lowercase();
                !normalized.is_empty() && normalized == self.storage_text()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationPattern {
    pub pattern_id: String,
    pub tenant_id: String,
    pub expression: MatchExpression,
    pub target_field: CorrectionField,
    pub target_value: String,
    pub confidence: f64,
    pub created_by: String,
    pub usage_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPattern {
    pub tenant_id: String,
    pub expression: MatchExpression,
    pub target_field: CorrectionField,
    pub target_value: String,
    pub confidence: f64,
    pub created_by: String,
}

/// A transaction as seen by the matcher, either the one being classified or
/// an already-classified candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
}

impl TransactionRecord {
    pub fn classification_value(&self, field: CorrectionField) -> Option<&str> {
        let value = match field {
            CorrectionField::Entity => self.entity.as_deref(),
            CorrectionField::Category => self.category.as_deref(),
            CorrectionField::Subcategory => self.subcategory.as_deref(),
            CorrectionField::Origin => self.origin.as_deref(),
            CorrectionField::Destination => self.destination.as_deref(),
        };
        value.map(str::trim).filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedField {
    Origin,
    Destination,
    Description,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldScores {
    pub origin: f64,
    pub destination: f64,
    pub description: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchCandidate {
    pub transaction: TransactionRecord,
    pub scores: FieldScores,
    pub amount_penalty: f64,
    pub matched_fields: Vec<MatchedField>,
    pub confidence: f64,
    pub tier: ConfidenceTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchSource {
    Pattern { pattern_id: String },
    SimilarTransaction { transaction_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    pub field: CorrectionField,
    pub value: String,
    pub confidence: f64,
    pub tier: ConfidenceTier,
    pub matched_fields: Vec<MatchedField>,
    pub justification: String,
    pub source: MatchSource,
}
