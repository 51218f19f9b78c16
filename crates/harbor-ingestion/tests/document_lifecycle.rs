//! Status, edit, read and share flows after a document exists.

mod common;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use common::{analysis_reply, Harness, ScriptedLlm};
use harbor_backend::{DocumentRepository, ShareRepository, VesselRepository};
use harbor_core::{
    AccessAction, Actor, CompanyId, DocumentCategory, DocumentId, DocumentStatus, Job,
    JobPublisher, Share, ShareId, Vessel, VesselId,
};
use harbor_ingestion::{
    CreateShareRequest, DocumentPatch, DocumentWorker, JobQueue, ShareService,
};

fn ddmmyyyy_in_days(days: i64) -> String {
    (Utc::now().date_naive() + Duration::days(days))
        .format("%d/%m/%Y")
        .to_string()
}

fn actor(h: &Harness) -> Actor {
    Actor::new(h.user_id).with_company(h.company_id)
}

fn no_llm() -> std::sync::Arc<ScriptedLlm> {
    ScriptedLlm::replying(serde_json::json!({}))
}

// ==================== Status recompute ====================

#[tokio::test]
async fn test_recompute_moves_status_forward_once() {
    let h = Harness::new();
    let service = h.service(no_llm());
    let doc = h
        .seed_document(Some(ddmmyyyy_in_days(-1)), DocumentStatus::Valid)
        .await;

    let change = service.recompute_status(doc.id).await.unwrap();
    assert_eq!(change.previous, DocumentStatus::Valid);
    assert_eq!(change.current, DocumentStatus::Expired);
    assert!(change.changed);

    let again = service.recompute_status(doc.id).await.unwrap();
    assert!(!again.changed);
    assert_eq!(again.current, DocumentStatus::Expired);
}

#[tokio::test]
async fn test_recompute_keeps_permanent_and_unparseable() {
    let h = Harness::new();
    let service = h.service(no_llm());

    let permanent = h.seed_document(None, DocumentStatus::Permanent).await;
    let change = service.recompute_status(permanent.id).await.unwrap();
    assert_eq!(change.current, DocumentStatus::Permanent);
    assert!(!change.changed);

    let vague = h
        .seed_document(Some("end of next year".to_string()), DocumentStatus::Valid)
        .await;
    let change = service.recompute_status(vague.id).await.unwrap();
    assert_eq!(change.current, DocumentStatus::Valid);
    assert!(!change.changed);
}

#[tokio::test]
async fn test_recompute_unknown_document_is_not_found() {
    let h = Harness::new();
    let err = h
        .service(no_llm())
        .recompute_status(DocumentId::new())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_worker_drains_queued_jobs() {
    let h = Harness::new();
    let (queue, receiver) = JobQueue::channel(8);
    let doc = h
        .seed_document(Some(ddmmyyyy_in_days(5)), DocumentStatus::Valid)
        .await;

    let handle = DocumentWorker::new(h.service(no_llm()), receiver).spawn();
    queue
        .publish(Job::RecomputeStatus { document_id: doc.id })
        .await
        .unwrap();
    queue
        .publish(Job::RecomputeStatus {
            document_id: DocumentId::new(),
        })
        .await
        .unwrap();
    drop(queue);
    handle.await.unwrap();

    let stored = DocumentRepository::get(&h.tables, doc.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, DocumentStatus::ExpiringSoon);
}

// ==================== Edits ====================

#[tokio::test]
async fn test_update_sets_expiry_and_requeues() {
    let mut h = Harness::new();
    let service = h.service(no_llm());
    let doc = h.seed_document(None, DocumentStatus::Permanent).await;

    let updated = service
        .update_document(
            doc.id,
            DocumentPatch {
                title: Some("  Renewed SEC  ".to_string()),
                issuer: Some(" Lloyd's Register ".to_string()),
                certificate_number: Some("SEC-2020-114".to_string()),
                expiry_date: Some("2020-06-01".to_string()),
                ..Default::default()
            },
            &actor(&h),
        )
        .await
        .unwrap();

    assert_eq!(updated.title, "Renewed SEC");
    assert_eq!(updated.issuer.as_deref(), Some("Lloyd's Register"));
    assert_eq!(updated.certificate_number.as_deref(), Some("SEC-2020-114"));
    assert_eq!(updated.expiry_date.as_deref(), Some("01/06/2020"));
    assert!(!updated.is_permanent);
    assert_eq!(updated.status, DocumentStatus::Expired);
    assert!(updated.permanence_is_consistent());

    let logs = h.tables.access_logs();
    assert_eq!(logs.last().map(|l| l.action), Some(AccessAction::Update));
    assert_eq!(
        h.jobs.try_recv().unwrap().job,
        Job::RecomputeStatus { document_id: doc.id }
    );
}

#[tokio::test]
async fn test_update_revalidates_classification() {
    let h = Harness::new();
    let service = h.service(no_llm());
    let doc = h.seed_document(None, DocumentStatus::Permanent).await;

    let updated = service
        .update_document(
            doc.id,
            DocumentPatch {
                category: Some("inspection".to_string()),
                subcategory: Some("not-a-real-one".to_string()),
                ..Default::default()
            },
            &actor(&h),
        )
        .await
        .unwrap();

    assert_eq!(updated.category, DocumentCategory::Inspection);
    assert_eq!(updated.subcategory, "port_state_control");
}

#[tokio::test]
async fn test_update_rejects_empty_and_contradictory_patches() {
    let h = Harness::new();
    let service = h.service(no_llm());
    let doc = h.seed_document(None, DocumentStatus::Permanent).await;

    let err = service
        .update_document(doc.id, DocumentPatch::default(), &actor(&h))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    let err = service
        .update_document(
            doc.id,
            DocumentPatch {
                is_permanent: Some(true),
                expiry_date: Some("01/01/2030".to_string()),
                ..Default::default()
            },
            &actor(&h),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_archive_hides_from_default_listing() {
    let h = Harness::new();
    let service = h.service(no_llm());
    let kept = h.seed_document(None, DocumentStatus::Permanent).await;
    let archived = h.seed_document(None, DocumentStatus::Permanent).await;

    let result = service.archive_document(archived.id, &actor(&h)).await.unwrap();
    assert!(result.is_archived);

    let listed = service
        .list_vessel_documents(h.vessel.id, false, &actor(&h))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].document.id, kept.id);
    assert!(listed[0].download_url.is_some());

    let all = service
        .list_vessel_documents(h.vessel.id, true, &actor(&h))
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    assert!(h
        .tables
        .access_logs()
        .iter()
        .any(|l| l.action == AccessAction::Archive && l.document_id == Some(archived.id)));
}

#[tokio::test]
async fn test_reprocess_rewrites_classification() {
    let h = Harness::new();
    let first = ScriptedLlm::replying(analysis_reply("Letter", "general", Some("correspondence"), None));
    let doc = h
        .pipeline(first)
        .upload(b"img", h.request("Scan", "Unknown", "image/png"))
        .await
        .unwrap()
        .document;
    assert_eq!(doc.category, DocumentCategory::General);

    let expiry = (Utc::now().date_naive() + Duration::days(365))
        .format("%Y-%m-%d")
        .to_string();
    let second = ScriptedLlm::replying(analysis_reply(
        "P&I Certificate of Entry",
        "commercial",
        Some("insurance"),
        Some(&expiry),
    ));
    let service = h.service(second.clone());

    let updated = service.reprocess_document(doc.id).await.unwrap();
    assert_eq!(second.calls(), 1);
    assert_eq!(updated.category, DocumentCategory::Commercial);
    assert_eq!(updated.subcategory, "insurance");
    assert_eq!(updated.file_path, doc.file_path);
}

// ==================== Reads ====================

#[tokio::test]
async fn test_view_logs_access_and_signs_url() {
    let h = Harness::new();
    let service = h.service(no_llm());
    let doc = h.seed_document(None, DocumentStatus::Permanent).await;

    let view = service.view_document(doc.id, &actor(&h)).await.unwrap();
    assert!(view.download_url.is_some());

    let logs = h.tables.access_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, AccessAction::View);
    assert_eq!(logs[0].user_id, Some(h.user_id));

    let outsider = Actor::new(h.user_id).with_company(CompanyId::new());
    let err = service.view_document(doc.id, &outsider).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_actor_without_company_is_forbidden() {
    let h = Harness::new();
    let service = h.service(no_llm());
    let doc = h
        .seed_document(Some(ddmmyyyy_in_days(-1)), DocumentStatus::Valid)
        .await;
    let anonymous = Actor::new(h.user_id);

    let patch = DocumentPatch {
        title: Some("Renamed".to_string()),
        ..Default::default()
    };
    let errors = vec![
        service.view_document(doc.id, &anonymous).await.unwrap_err(),
        service
            .update_document(doc.id, patch, &anonymous)
            .await
            .unwrap_err(),
        service.archive_document(doc.id, &anonymous).await.unwrap_err(),
        service
            .recompute_status_for(doc.id, &anonymous)
            .await
            .unwrap_err(),
        service.request_reprocess(doc.id, &anonymous).await.unwrap_err(),
        service
            .list_vessel_documents(h.vessel.id, true, &anonymous)
            .await
            .unwrap_err(),
    ];
    for err in errors {
        assert_eq!(err.status_code(), 403, "{:?}", err);
    }

    let stored = DocumentRepository::get(&h.tables, doc.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "Seeded");
    assert!(!stored.is_archived);
    assert_eq!(stored.status, DocumentStatus::Valid);
    assert!(h.tables.access_logs().is_empty());
}

#[tokio::test]
async fn test_manual_recompute_is_not_logged_as_view() {
    let h = Harness::new();
    let service = h.service(no_llm());
    let doc = h
        .seed_document(Some(ddmmyyyy_in_days(10)), DocumentStatus::Valid)
        .await;

    let change = service
        .recompute_status_for(doc.id, &actor(&h))
        .await
        .unwrap();
    assert_eq!(change.current, DocumentStatus::ExpiringSoon);
    assert!(h.tables.access_logs().is_empty());

    let outsider = Actor::new(h.user_id).with_company(CompanyId::new());
    let err = service
        .recompute_status_for(doc.id, &outsider)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_batch_download() {
    let h = Harness::new();
    let service = h.service(no_llm());
    let a = h.seed_document(None, DocumentStatus::Permanent).await;
    let b = h.seed_document(None, DocumentStatus::Permanent).await;
    let ghost = DocumentId::new();

    let batch = service
        .batch_download(&[a.id, b.id, ghost], h.company_id, &actor(&h))
        .await
        .unwrap();
    assert_eq!(batch.items.len(), 2);
    assert!(batch.items.iter().all(|i| i.download_url.is_some() && i.error.is_none()));
    assert_eq!(batch.missing, vec![ghost]);
    let downloads = h
        .tables
        .access_logs()
        .into_iter()
        .filter(|l| l.action == AccessAction::Download)
        .count();
    assert_eq!(downloads, 2);

    let err = service
        .batch_download(&[ghost], h.company_id, &actor(&h))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);

    let err = service
        .batch_download(&[a.id], CompanyId::new(), &actor(&h))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
}

// ==================== Shares ====================

#[tokio::test]
async fn test_create_and_resolve_share() {
    let h = Harness::new();
    let service = h.service(no_llm());
    let shares = ShareService::new(service, "https://docs.example.com/", "noreply@example.com");
    let doc = h.seed_document(None, DocumentStatus::Permanent).await;

    let outcome = shares
        .create_share(
            CreateShareRequest {
                document_ids: vec![doc.id],
                recipients: vec![
                    "Surveyor@Class.example".to_string(),
                    "agent@port.example".to_string(),
                ],
                expires_in_days: Some(3),
                message: Some("For the upcoming audit".to_string()),
            },
            h.company_id,
            &actor(&h),
        )
        .await
        .unwrap();

    assert!(outcome.all_delivered());
    assert_eq!(
        outcome.link,
        format!("https://docs.example.com/shared/{}", outcome.share.token)
    );
    assert_eq!(outcome.share.recipients[0], "surveyor@class.example");

    let sent = h.email.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].html.contains(&outcome.link));

    let share_logs: Vec<_> = h
        .tables
        .access_logs()
        .into_iter()
        .filter(|l| l.action == AccessAction::Share)
        .collect();
    assert_eq!(share_logs.len(), 1);
    assert_eq!(share_logs[0].document_id, None);

    let resolved = shares.resolve_share(&outcome.share.token).await.unwrap();
    assert_eq!(resolved.documents.len(), 1);
    assert!(resolved.documents[0].download_url.is_some());
}

#[tokio::test]
async fn test_share_rejects_foreign_documents() {
    let h = Harness::new();
    let other_company = CompanyId::new();
    h.tables.add_vessel(Vessel {
        id: VesselId::new(),
        company_id: other_company,
        name: "MV Elsewhere".to_string(),
        imo_number: None,
    });
    let shares = ShareService::new(h.service(no_llm()), "https://docs.example.com", "noreply@example.com");
    let doc = h.seed_document(None, DocumentStatus::Permanent).await;

    let err = shares
        .create_share(
            CreateShareRequest {
                document_ids: vec![doc.id],
                recipients: vec!["agent@port.example".to_string()],
                expires_in_days: None,
                message: None,
            },
            other_company,
            &Actor::new(h.user_id).with_company(other_company),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
    assert!(h.email.sent().is_empty());
}

#[tokio::test]
async fn test_expired_and_unknown_shares() {
    let h = Harness::new();
    let shares = ShareService::new(h.service(no_llm()), "https://docs.example.com", "noreply@example.com");
    let doc = h.seed_document(None, DocumentStatus::Permanent).await;

    let now = Utc::now();
    let expired = Share {
        id: ShareId::new(),
        token: "expiredtoken".to_string(),
        company_id: h.company_id,
        document_ids: vec![doc.id],
        recipients: vec!["agent@port.example".to_string()],
        created_by: h.user_id,
        expires_at: now - Duration::hours(1),
        created_at: now - Duration::days(8),
    };
    ShareRepository::insert(&h.tables, &expired).await.unwrap();

    let err = shares.resolve_share("expiredtoken").await.unwrap_err();
    assert_eq!(err.status_code(), 410);

    let err = shares.resolve_share("nosuchtoken").await.unwrap_err();
    assert_eq!(err.status_code(), 404);

    assert!(VesselRepository::get(&h.tables, h.vessel.id).await.unwrap().is_some());
}
