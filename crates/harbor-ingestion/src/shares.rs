//! Token-addressed document shares for external recipients

use chrono::{Duration, Utc};
use futures::future::join_all;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use validator::{Validate, ValidationError};

use harbor_backend::EmailMessage;
use harbor_core::{
    AccessAction, AccessLogEntry, Actor, AppError, AppResult, CompanyId, Document, DocumentId,
    Share, ShareId,
};

use crate::documents::{DocumentService, DocumentView};

const TOKEN_LENGTH: usize = 32;
const MAX_SHARE_DAYS: i64 = 90;

fn valid_recipients(recipients: &Vec<String>) -> Result<(), ValidationError> {
    if recipients.iter().all(|r| validator::validate_email(r.trim())) {
        Ok(())
    } else {
        Err(ValidationError::new("email"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareRequest {
    #[validate(length(min = 1, message = "At least one document is required"))]
    pub document_ids: Vec<DocumentId>,
    #[validate(
        length(min = 1, message = "At least one recipient is required"),
        custom = "valid_recipients"
    )]
    pub recipients: Vec<String>,
    #[validate(range(min = 1, max = 90))]
    pub expires_in_days: Option<i64>,
    pub message: Option<String>,
}

/// Delivery result for one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientDelivery {
    pub email: String,
    pub sent: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareOutcome {
    pub share: Share,
    pub link: String,
    pub deliveries: Vec<RecipientDelivery>,
}

impl ShareOutcome {
    pub fn all_delivered(&self) -> bool {
        self.deliveries.iter().all(|d| d.sent)
    }
}

/// What an external recipient sees when opening a share link
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedShare {
    pub share_id: ShareId,
    pub expires_at: chrono::DateTime<Utc>,
    pub documents: Vec<DocumentView>,
}

#[derive(Clone)]
pub struct ShareService {
    documents: DocumentService,
    public_base_url: String,
    from_address: String,
    default_days: i64,
}

impl ShareService {
    pub fn new(
        documents: DocumentService,
        public_base_url: impl Into<String>,
        from_address: impl Into<String>,
    ) -> Self {
        Self {
            documents,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            from_address: from_address.into(),
            default_days: 7,
        }
    }

    pub fn with_default_days(mut self, days: i64) -> Self {
        self.default_days = days.clamp(1, MAX_SHARE_DAYS);
        self
    }

    pub fn link_for(&self, token: &str) -> String {
        format!("{}/shared/{}", self.public_base_url, token)
    }

    #[instrument(skip(self, request, actor), fields(user_id = %actor.user_id))]
    pub async fn create_share(
        &self,
        request: CreateShareRequest,
        company_id: CompanyId,
        actor: &Actor,
    ) -> AppResult<ShareOutcome> {
        request
            .validate()
            .map_err(|e| AppError::validation(format!("Invalid share request: {}", e)))?;

        let backends = self.documents.backends();
        let documents = backends
            .documents
            .get_many(&request.document_ids)
            .await
            .map_err(|e| AppError::upstream(e.to_string()))?;
        if documents.len() != dedup_count(&request.document_ids) {
            return Err(AppError::not_found("One or more documents were not found"));
        }
        self.documents.ensure_company(&documents, company_id).await?;

        let now = Utc::now();
        let days = request.expires_in_days.unwrap_or(self.default_days);
        let recipients: Vec<String> = request
            .recipients
            .iter()
            .map(|r| r.trim().to_lowercase())
            .collect();

        let share = Share {
            id: ShareId::new(),
            token: generate_token(),
            company_id,
            document_ids: documents.iter().map(|d| d.id).collect(),
            recipients: recipients.clone(),
            created_by: actor.user_id,
            expires_at: now + Duration::days(days),
            created_at: now,
        };
        let share = backends
            .shares
            .insert(&share)
            .await
            .map_err(|e| AppError::upstream(format!("Failed to create share: {}", e)))?;

        let link = self.link_for(&share.token);
        let html = share_email_html(&documents, &link, days, request.message.as_deref());

        let sends = recipients.iter().map(|email| {
            let message = EmailMessage {
                from: self.from_address.clone(),
                to: vec![email.clone()],
                subject: format!("{} vessel document(s) shared with you", documents.len()),
                html: html.clone(),
            };
            async move {
                let result = backends.email.send(&message).await;
                (email.clone(), result)
            }
        });
        let deliveries: Vec<RecipientDelivery> = join_all(sends)
            .await
            .into_iter()
            .map(|(email, result)| match result {
                Ok(()) => RecipientDelivery {
                    email,
                    sent: true,
                    error: None,
                },
                Err(e) => {
                    warn!(recipient = %email, error = %e, "Share email failed");
                    RecipientDelivery {
                        email,
                        sent: false,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect();

        backends
            .record_access(AccessLogEntry::new(AccessAction::Share).with_actor(actor))
            .await;

        info!(
            share_id = %share.id,
            documents = share.document_ids.len(),
            delivered = deliveries.iter().filter(|d| d.sent).count(),
            "Share created"
        );
        Ok(ShareOutcome {
            share,
            link,
            deliveries,
        })
    }

    #[instrument(skip(self, token))]
    pub async fn resolve_share(&self, token: &str) -> AppResult<ResolvedShare> {
        let backends = self.documents.backends();
        let share = backends
            .shares
            .get_by_token(token)
            .await
            .map_err(|e| AppError::upstream(e.to_string()))?
            .ok_or_else(|| AppError::not_found("Share not found"))?;

        if share.is_expired_at(Utc::now()) {
            return Err(AppError::gone("This share link has expired"));
        }

        let documents: Vec<Document> = backends
            .documents
            .get_many(&share.document_ids)
            .await
            .map_err(|e| AppError::upstream(e.to_string()))?
            .into_iter()
            .filter(|d| !d.is_archived)
            .collect();

        let urls = join_all(documents.iter().map(|d| self.documents.signed_url(d))).await;
        let documents = documents
            .into_iter()
            .zip(urls)
            .map(|(document, url)| DocumentView {
                download_url: url.ok(),
                document,
            })
            .collect();

        Ok(ResolvedShare {
            share_id: share.id,
            expires_at: share.expires_at,
            documents,
        })
    }
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

fn dedup_count(ids: &[DocumentId]) -> usize {
    let mut ids = ids.to_vec();
    ids.sort();
    ids.dedup();
    ids.len()
}

fn share_email_html(documents: &[Document], link: &str, days: i64, note: Option<&str>) -> String {
    let items: String = documents
        .iter()
        .map(|d| format!("<li>{} ({})</li>", escape(&d.title), escape(&d.document_type)))
        .collect();
    let note = note
        .map(|n| format!("<p>{}</p>", escape(n)))
        .unwrap_or_default();

    format!(
        "<p>The following vessel documents have been shared with you:</p>\
         <ul>{items}</ul>{note}\
         <p><a href=\"{link}\">View documents</a></p>\
         <p>This link expires in {days} day(s).</p>"
    )
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_request_validation() {
        let ok = CreateShareRequest {
            document_ids: vec![DocumentId::new()],
            recipients: vec!["master@vessel.example".to_string()],
            expires_in_days: Some(7),
            message: None,
        };
        assert!(ok.validate().is_ok());

        let bad_email = CreateShareRequest {
            recipients: vec!["not an email".to_string()],
            ..ok.clone()
        };
        assert!(bad_email.validate().is_err());

        let no_docs = CreateShareRequest {
            document_ids: vec![],
            ..ok.clone()
        };
        assert!(no_docs.validate().is_err());

        let too_long = CreateShareRequest {
            expires_in_days: Some(365),
            ..ok
        };
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_email_html_escapes_titles() {
        assert_eq!(escape("<b>&\"x\""), "&lt;b&gt;&amp;&quot;x&quot;");
        let html = share_email_html(&[], "https://app/shared/abc", 3, Some("Please review"));
        assert!(html.contains("https://app/shared/abc"));
        assert!(html.contains("3 day(s)"));
        assert!(html.contains("Please review"));
    }

    #[test]
    fn test_dedup_count() {
        let id = DocumentId::new();
        assert_eq!(dedup_count(&[id, id, DocumentId::new()]), 2);
    }
}
