//! Review queue and verification session flows over the in-memory store.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Utc};
use safescan_core::{
    AuditAction, CanonicalIdentifier, ConfidenceLevel, Error, ExtractionJob, ExtractionResult,
    JobEvent, ReviewFilter, ReviewStatus, SessionStatus, Symbology, VerificationConfig,
};
use safescan_review::{ReviewQueue, VerificationService};
use safescan_store::Store;

async fn completed_job(store: &Store, level: ConfidenceLevel, score: f64) -> ExtractionJob {
    let mut job = ExtractionJob::new("uploads/label.jpg", "submitter-7");
    let now = Utc::now();
    job.apply(JobEvent::Start, now).unwrap();
    job.confidence_level = Some(level);
    job.confidence_score = score;
    job.needs_review = level.needs_review();
    job.apply(JobEvent::Complete, now).unwrap();
    store.jobs.insert(&job).await.unwrap();

    let mut id = CanonicalIdentifier::new("(01)00012345678905(10)ABC123", Symbology::Gs1128);
    id.gtin = Some("00012345678905".into());
    id.lot_number = Some("ABC123".into());
    id.expiry_date = NaiveDate::from_ymd_opt(2025, 1, 1);
    let mut result = ExtractionResult::new(job.id, id);
    result.brand = Some("Acme".into());
    store.results.upsert(&result).await.unwrap();
    job
}

fn claims(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_list_orders_by_priority_then_age() {
    let store = Store::in_memory();
    let queue = ReviewQueue::new(store.clone());

    let medium = completed_job(&store, ConfidenceLevel::Medium, 0.7).await;
    let low = completed_job(&store, ConfidenceLevel::Low, 0.3).await;
    let medium_item = queue.enqueue(&medium, "medium").await.unwrap();
    let low_item = queue.enqueue(&low, "low").await.unwrap();

    let items = queue.list_queue(&ReviewFilter::default()).await.unwrap();
    let ids: Vec<_> = items.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![low_item.id, medium_item.id]);

    let next = queue.claim_next("alice").await.unwrap().unwrap();
    assert_eq!(next.id, low_item.id);
    let next = queue.claim_next("bob").await.unwrap().unwrap();
    assert_eq!(next.id, medium_item.id);
    assert!(queue.claim_next("carol").await.unwrap().is_none());

    let filter = ReviewFilter {
        claimed_by: Some("bob".into()),
        ..Default::default()
    };
    let mine = queue.list_queue(&filter).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].status, ReviewStatus::Claimed);
}

#[tokio::test]
async fn test_passed_session_self_resolves_medium() {
    let store = Store::in_memory();
    let queue = ReviewQueue::new(store.clone());
    let service = VerificationService::new(store.clone(), VerificationConfig::default());
    let job = completed_job(&store, ConfidenceLevel::Medium, 0.7).await;
    let item = queue.enqueue(&job, "medium").await.unwrap();

    let session_id = service.start_session(job.id).await.unwrap();
    let session = service
        .confirm(
            session_id,
            claims(&[("gtin", "012345678905"), ("lot_number", "abc123"), ("brand", "ACME")]),
        )
        .await
        .unwrap();
    assert!(session.passed);
    assert_eq!(session.status, SessionStatus::Confirmed);
    assert!((session.overall_match_score - 1.0).abs() < 1e-9);

    let item = queue.get(item.id).await.unwrap();
    assert_eq!(item.status, ReviewStatus::Approved);
    assert_eq!(item.audit_log().last().unwrap().action, AuditAction::SelfResolved);

    let job = store.jobs.get(job.id).await.unwrap().unwrap();
    assert!(!job.needs_review);
    // Fields left as extracted.
    let result = store.results.get(job.id).await.unwrap().unwrap();
    assert_eq!(result.identifier.lot_number.as_deref(), Some("ABC123"));
}

#[tokio::test]
async fn test_passed_session_on_low_only_annotates() {
    let store = Store::in_memory();
    let queue = ReviewQueue::new(store.clone());
    let service = VerificationService::new(store.clone(), VerificationConfig::default());
    let job = completed_job(&store, ConfidenceLevel::Low, 0.4).await;
    let item = queue.enqueue(&job, "low").await.unwrap();

    let session_id = service.start_session(job.id).await.unwrap();
    let session = service
        .confirm(session_id, claims(&[("lot_number", "ABC123")]))
        .await
        .unwrap();
    assert!(session.passed);

    let item = queue.get(item.id).await.unwrap();
    assert_eq!(item.status, ReviewStatus::Queued);
    assert_eq!(
        item.audit_log().last().unwrap().action,
        AuditAction::SubmitterVerified
    );
}

#[tokio::test]
async fn test_failed_session_overwrites_result() {
    let store = Store::in_memory();
    let queue = ReviewQueue::new(store.clone());
    let service = VerificationService::new(store.clone(), VerificationConfig::default());
    let job = completed_job(&store, ConfidenceLevel::Medium, 0.65).await;
    let item = queue.enqueue(&job, "medium").await.unwrap();

    let session_id = service.start_session(job.id).await.unwrap();
    // 1 of 3 fields match: 0.33 < 0.6.
    let session = service
        .confirm(
            session_id,
            claims(&[
                ("lot_number", "XYZ789"),
                ("expiry_date", "2026-06-30"),
                ("brand", "acme"),
            ]),
        )
        .await
        .unwrap();
    assert!(!session.passed);
    assert_eq!(session.field_matches.get("brand"), Some(&true));
    assert_eq!(session.field_matches.get("lot_number"), Some(&false));

    let result = store.results.get(job.id).await.unwrap().unwrap();
    assert_eq!(result.identifier.lot_number.as_deref(), Some("XYZ789"));
    assert_eq!(result.identifier.expiry_date, NaiveDate::from_ymd_opt(2026, 6, 30));
    assert_eq!(result.identifier.gtin.as_deref(), Some("00012345678905"));

    let item = queue.get(item.id).await.unwrap();
    assert_eq!(item.status, ReviewStatus::Queued);
    assert_eq!(
        item.audit_log().last().unwrap().action,
        AuditAction::SubmitterCorrected
    );
}

#[tokio::test]
async fn test_confirm_refused_while_reviewer_holds_item() {
    let store = Store::in_memory();
    let queue = ReviewQueue::new(store.clone());
    let service = VerificationService::new(store.clone(), VerificationConfig::default());
    let job = completed_job(&store, ConfidenceLevel::Medium, 0.65).await;
    let item = queue.enqueue(&job, "medium").await.unwrap();
    let session_id = service.start_session(job.id).await.unwrap();
    queue.claim(item.id, "alice").await.unwrap();

    let err = service
        .confirm(session_id, claims(&[("lot_number", "XYZ789"), ("brand", "other")]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition(_)));
    assert!(err.to_string().contains("alice"));

    // Neither the result nor the session moved.
    let result = store.results.get(job.id).await.unwrap().unwrap();
    assert_eq!(result.identifier.lot_number.as_deref(), Some("ABC123"));
    let session = service.get_session(session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Open);
}

#[tokio::test]
async fn test_field_missing_from_extraction_counts_as_mismatch() {
    let store = Store::in_memory();
    let service = VerificationService::new(store.clone(), VerificationConfig::default());
    let job = completed_job(&store, ConfidenceLevel::Medium, 0.7).await;

    let session_id = service.start_session(job.id).await.unwrap();
    let session = service
        .confirm(session_id, claims(&[("serial_number", "SN1"), ("lot_number", "ABC123")]))
        .await
        .unwrap();
    assert!((session.overall_match_score - 0.5).abs() < 1e-9);
    assert!(!session.passed);
}

#[tokio::test]
async fn test_session_is_single_shot() {
    let store = Store::in_memory();
    let service = VerificationService::new(store.clone(), VerificationConfig::default());
    let job = completed_job(&store, ConfidenceLevel::Medium, 0.7).await;

    let session_id = service.start_session(job.id).await.unwrap();
    service
        .confirm(session_id, claims(&[("lot_number", "ABC123")]))
        .await
        .unwrap();
    let err = service
        .confirm(session_id, claims(&[("lot_number", "ABC123")]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition(_)));
}

#[tokio::test]
async fn test_expired_session() {
    let store = Store::in_memory();
    let config = VerificationConfig::default().with_session_ttl(Duration::minutes(5));
    let service = VerificationService::new(store.clone(), config);
    let job = completed_job(&store, ConfidenceLevel::Medium, 0.7).await;

    let session_id = service.start_session(job.id).await.unwrap();
    let later = Utc::now() + Duration::minutes(6);
    let err = service
        .confirm_at(session_id, claims(&[("lot_number", "ABC123")]), later)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Expired(_)));

    let session = service.get_session(session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Expired);
}

#[tokio::test]
async fn test_high_job_cannot_start_session() {
    let store = Store::in_memory();
    let service = VerificationService::new(store.clone(), VerificationConfig::default());
    let job = completed_job(&store, ConfidenceLevel::High, 0.95).await;
    assert!(matches!(
        service.start_session(job.id).await,
        Err(Error::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_unfinished_job_cannot_start_session() {
    let store = Store::in_memory();
    let service = VerificationService::new(store.clone(), VerificationConfig::default());
    let job = ExtractionJob::new("uploads/x.png", "owner");
    store.jobs.insert(&job).await.unwrap();
    assert!(matches!(
        service.start_session(job.id).await,
        Err(Error::InvalidTransition(_))
    ));
}
