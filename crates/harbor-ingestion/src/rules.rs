//! Permanence and expiry-status rules

use chrono::NaiveDate;

use harbor_core::{DocumentCategory, DocumentStatus};

use crate::dates::parse_date;

/// Default number of days before expiry at which a document becomes
/// `expiring_soon`
pub const EXPIRING_SOON_DAYS: i64 = 30;

/// Substrings that mark a document type as something that expires
const EXPIRING_KEYWORDS: &[&str] = &[
    "certificate",
    "certification",
    "licence",
    "license",
    "permit",
    "endorsement",
    "document of compliance",
    "safety",
    "security",
    "medical",
    "competency",
    "proficiency",
    "insurance",
    "p&i",
    "class",
    "survey",
];

/// Whether a document of this type and category must carry an expiry date
pub fn requires_expiry(document_type: &str, category: DocumentCategory) -> bool {
    if category == DocumentCategory::Statutory {
        return true;
    }
    let haystacks = [document_type.to_lowercase(), category.as_str().to_string()];
    EXPIRING_KEYWORDS
        .iter()
        .any(|keyword| haystacks.iter().any(|h| h.contains(keyword)))
}

/// Inputs to the permanence decision
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermanenceInputs<'a> {
    pub document_type: &'a str,
    pub category: Option<DocumentCategory>,
    pub ai_expiry_date: Option<&'a str>,
    pub caller_is_permanent: Option<bool>,
    pub caller_expiry_date: Option<&'a str>,
}

/// Exactly one of `is_permanent` and `expiry_date` is set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permanence {
    Permanent,
    Expires(String),
}

impl Permanence {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Permanence::Permanent)
    }

    pub fn expiry_date(&self) -> Option<&str> {
        match self {
            Permanence::Permanent => None,
            Permanence::Expires(date) => Some(date),
        }
    }
}

/// Decide permanence: types that never expire are permanent; otherwise the
/// AI-extracted expiry wins, then a caller-declared permanence, then the
/// caller's expiry date, then permanent.
pub fn resolve_permanence(inputs: &PermanenceInputs<'_>) -> Permanence {
    let category = inputs.category.unwrap_or(DocumentCategory::General);
    if !requires_expiry(inputs.document_type, category) {
        return Permanence::Permanent;
    }

    let non_blank = |v: Option<&str>| v.map(str::trim).filter(|s| !s.is_empty()).map(String::from);

    if let Some(date) = non_blank(inputs.ai_expiry_date) {
        return Permanence::Expires(date);
    }
    if inputs.caller_is_permanent == Some(true) {
        return Permanence::Permanent;
    }
    match non_blank(inputs.caller_expiry_date) {
        Some(date) => Permanence::Expires(date),
        None => Permanence::Permanent,
    }
}

/// Whole days from `today` until the expiry date, if the date parses
pub fn days_until_expiry(expiry_date: &str, today: NaiveDate) -> Option<i64> {
    parse_date(expiry_date).map(|expiry| (expiry - today).num_days())
}

pub fn status_for_days(days: i64, expiring_soon_days: i64) -> DocumentStatus {
    if days <= 0 {
        DocumentStatus::Expired
    } else if days <= expiring_soon_days {
        DocumentStatus::ExpiringSoon
    } else {
        DocumentStatus::Valid
    }
}

/// Status a document should have today. `None` when the expiry date cannot
/// be interpreted, in which case the stored status is left alone.
pub fn compute_status(
    is_permanent: bool,
    expiry_date: Option<&str>,
    today: NaiveDate,
    expiring_soon_days: i64,
) -> Option<DocumentStatus> {
    if is_permanent {
        return Some(DocumentStatus::Permanent);
    }
    expiry_date
        .and_then(|date| days_until_expiry(date, today))
        .map(|days| status_for_days(days, expiring_soon_days))
}

/// Status assigned at creation, before the first recompute runs
pub fn initial_status(
    permanence: &Permanence,
    today: NaiveDate,
    expiring_soon_days: i64,
) -> DocumentStatus {
    compute_status(
        permanence.is_permanent(),
        permanence.expiry_date(),
        today,
        expiring_soon_days,
    )
    .unwrap_or(DocumentStatus::Valid)
}
