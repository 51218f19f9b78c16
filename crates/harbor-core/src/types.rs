use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// Newtype wrappers for type safety

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parse from the textual form, `None` when malformed.
            pub fn parse(value: &str) -> Option<Self> {
                Uuid::parse_str(value.trim()).ok().map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a stored document
    DocumentId
);
uuid_id!(
    /// Identifier of a vessel (the owning entity of documents)
    VesselId
);
uuid_id!(UserId);
uuid_id!(
    /// Identifier of a tenant company
    CompanyId
);
uuid_id!(ShareId);

// Classification types

/// Top-level document category. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentCategory {
    Statutory,
    Classification,
    Crew,
    Commercial,
    Inspection,
    General,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 6] = [
        DocumentCategory::Statutory,
        DocumentCategory::Classification,
        DocumentCategory::Crew,
        DocumentCategory::Commercial,
        DocumentCategory::Inspection,
        DocumentCategory::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::Statutory => "statutory",
            DocumentCategory::Classification => "classification",
            DocumentCategory::Crew => "crew",
            DocumentCategory::Commercial => "commercial",
            DocumentCategory::Inspection => "inspection",
            DocumentCategory::General => "general",
        }
    }
}

impl std::fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        DocumentCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown document category: {}", s))
    }
}

/// Self-reported AI confidence in a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
        }
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Confidence::Medium
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            other => Err(format!("unknown confidence level: {}", other)),
        }
    }
}

/// Classification exactly as the model returned it, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawClassification {
    #[serde(default)]
    pub primary_category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub specific_document_type: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Classification after taxonomy enforcement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedClassification {
    pub category: DocumentCategory,
    pub subcategory: String,
    pub original_ai_classification: RawClassification,
    pub confidence: Confidence,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

// Document types

/// Lifecycle status derived from the expiry date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Valid,
    ExpiringSoon,
    Expired,
    Permanent,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Valid => "valid",
            DocumentStatus::ExpiringSoon => "expiring_soon",
            DocumentStatus::Expired => "expired",
            DocumentStatus::Permanent => "permanent",
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded file bound to a vessel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub vessel_id: VesselId,
    pub title: String,
    pub document_type: String,
    pub category: DocumentCategory,
    pub subcategory: String,
    pub classification_confidence: Confidence,
    pub classification_explanation: String,
    #[serde(default)]
    pub original_ai_classification: Option<RawClassification>,
    pub issuer: Option<String>,
    pub certificate_number: Option<String>,
    /// DD/MM/YYYY when the source date could be parsed
    pub issue_date: Option<String>,
    /// DD/MM/YYYY when the source date could be parsed
    pub expiry_date: Option<String>,
    pub is_permanent: bool,
    pub status: DocumentStatus,
    pub is_archived: bool,
    pub full_text: String,
    pub file_path: String,
    pub file_type: String,
    pub file_size: u64,
    pub original_filename: Option<String>,
    #[serde(default)]
    pub key_value_pairs: Vec<KeyValuePair>,
    pub uploaded_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Exactly one of "has an expiry date" and "is permanent" must hold.
    pub fn permanence_is_consistent(&self) -> bool {
        self.is_permanent != self.expiry_date.is_some()
    }
}

/// camelCase form of a [`Document`] for API responses. `Document` itself
/// keeps the column names of the `documents` table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentJson<'a> {
    pub id: DocumentId,
    pub vessel_id: VesselId,
    pub title: &'a str,
    pub document_type: &'a str,
    pub category: DocumentCategory,
    pub subcategory: &'a str,
    pub classification_confidence: Confidence,
    pub classification_explanation: &'a str,
    pub original_ai_classification: Option<&'a RawClassification>,
    pub issuer: Option<&'a str>,
    pub certificate_number: Option<&'a str>,
    pub issue_date: Option<&'a str>,
    pub expiry_date: Option<&'a str>,
    pub is_permanent: bool,
    pub status: DocumentStatus,
    pub is_archived: bool,
    pub full_text: &'a str,
    pub file_path: &'a str,
    pub file_type: &'a str,
    pub file_size: u64,
    pub original_filename: Option<&'a str>,
    pub key_value_pairs: &'a [KeyValuePair],
    pub uploaded_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<&'a str>,
}

impl<'a> DocumentJson<'a> {
    pub fn with_download_url(mut self, url: Option<&'a str>) -> Self {
        self.download_url = url;
        self
    }
}

impl<'a> From<&'a Document> for DocumentJson<'a> {
    fn from(d: &'a Document) -> Self {
        Self {
            id: d.id,
            vessel_id: d.vessel_id,
            title: &d.title,
            document_type: &d.document_type,
            category: d.category,
            subcategory: &d.subcategory,
            classification_confidence: d.classification_confidence,
            classification_explanation: &d.classification_explanation,
            original_ai_classification: d.original_ai_classification.as_ref(),
            issuer: d.issuer.as_deref(),
            certificate_number: d.certificate_number.as_deref(),
            issue_date: d.issue_date.as_deref(),
            expiry_date: d.expiry_date.as_deref(),
            is_permanent: d.is_permanent,
            status: d.status,
            is_archived: d.is_archived,
            full_text: &d.full_text,
            file_path: &d.file_path,
            file_type: &d.file_type,
            file_size: d.file_size,
            original_filename: d.original_filename.as_deref(),
            key_value_pairs: &d.key_value_pairs,
            uploaded_by: d.uploaded_by,
            created_at: d.created_at,
            updated_at: d.updated_at,
            download_url: None,
        }
    }
}

/// A vessel owned by a tenant company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vessel {
    pub id: VesselId,
    pub company_id: CompanyId,
    pub name: String,
    #[serde(default)]
    pub imo_number: Option<String>,
}

// Access log types

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessAction {
    View,
    Download,
    Upload,
    Update,
    Archive,
    Share,
}

impl AccessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessAction::View => "view",
            AccessAction::Download => "download",
            AccessAction::Upload => "upload",
            AccessAction::Update => "update",
            AccessAction::Archive => "archive",
            AccessAction::Share => "share",
        }
    }
}

/// Append-only access record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub id: Uuid,
    /// `None` for share-level actions
    pub document_id: Option<DocumentId>,
    pub user_id: Option<UserId>,
    pub action: AccessAction,
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AccessLogEntry {
    pub fn new(action: AccessAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id: None,
            user_id: None,
            action,
            timestamp: Utc::now(),
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_document(mut self, document_id: DocumentId) -> Self {
        self.document_id = Some(document_id);
        self
    }

    /// Copy user, IP and user agent from the acting caller
    pub fn with_actor(mut self, actor: &Actor) -> Self {
        self.user_id = Some(actor.user_id);
        self.ip_address = actor.ip_address.clone();
        self.user_agent = actor.user_agent.clone();
        self
    }
}

/// The caller on whose behalf an operation runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub company_id: Option<CompanyId>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Actor {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            company_id: None,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

// Share types

/// A time-boxed, token-addressed bundle of documents for external recipients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    pub id: ShareId,
    pub token: String,
    pub company_id: CompanyId,
    pub document_ids: Vec<DocumentId>,
    pub recipients: Vec<String>,
    pub created_by: UserId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Share {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
