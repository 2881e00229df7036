//! Submitter verification sessions.
//!
//! A session snapshots the extracted fields of a MEDIUM or LOW job. The
//! submitter confirms once: fields are compared tolerantly, and when the
//! overall score misses the pass threshold the submitter's values overwrite
//! the extraction result.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use safescan_core::models::field;
use safescan_core::{
    Error, FieldCorrections, JobStatus, Result, ReviewStatus, SessionStatus, VerificationConfig,
    VerificationSession,
};
use safescan_decode::{dates, gtin};
use safescan_store::Store;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::queue::ReviewQueue;

/// Case-insensitive equality or substring containment in either direction.
///
/// Blank values never match.
pub fn tolerant_match(extracted: &str, claimed: &str) -> bool {
    let extracted = extracted.trim().to_lowercase();
    let claimed = claimed.trim().to_lowercase();
    if extracted.is_empty() || claimed.is_empty() {
        return false;
    }
    extracted == claimed || extracted.contains(&claimed) || claimed.contains(&extracted)
}

/// Starts and confirms verification sessions.
#[derive(Clone)]
pub struct VerificationService {
    store: Store,
    queue: ReviewQueue,
    config: VerificationConfig,
}

impl VerificationService {
    pub fn new(store: Store, config: VerificationConfig) -> Self {
        Self {
            queue: ReviewQueue::new(store.clone()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    /// Open a session for a completed job that needs review.
    #[instrument(skip(self), fields(subsystem = "verification", op = "start_session"))]
    pub async fn start_session(&self, job_id: Uuid) -> Result<Uuid> {
        let job = self
            .store
            .jobs
            .get(job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;
        if job.status != JobStatus::Completed {
            return Err(Error::InvalidTransition(format!(
                "job {} is {}; verification requires a completed job",
                job_id,
                job.status.as_str()
            )));
        }
        match job.confidence_level {
            Some(level) if level.needs_review() => {}
            _ => {
                return Err(Error::InvalidInput(format!(
                    "job {} does not need verification",
                    job_id
                )))
            }
        }
        let result = self
            .store
            .results
            .get(job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("result for job {}", job_id)))?;

        let now = Utc::now();
        let session = VerificationSession {
            id: Uuid::now_v7(),
            job_id,
            owner: job.owner.clone(),
            status: SessionStatus::Open,
            extracted_fields: result.field_map(),
            claimed_fields: BTreeMap::new(),
            field_matches: BTreeMap::new(),
            overall_match_score: 0.0,
            passed: false,
            created_at: now,
            expires_at: now + self.config.session_ttl,
            confirmed_at: None,
            version: 0,
        };
        self.store.sessions.insert(&session).await?;
        info!(session_id = %session.id, fields = session.extracted_fields.len(), "Verification session opened");
        Ok(session.id)
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<VerificationSession> {
        self.store
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("verification session {}", session_id)))
    }

    /// Confirm a session with the submitter's claimed fields.
    pub async fn confirm(
        &self,
        session_id: Uuid,
        claimed: BTreeMap<String, String>,
    ) -> Result<VerificationSession> {
        self.confirm_at(session_id, claimed, Utc::now()).await
    }

    /// [`confirm`](Self::confirm) evaluated at `now`.
    #[instrument(skip(self, claimed, now), fields(subsystem = "verification", op = "confirm"))]
    pub async fn confirm_at(
        &self,
        session_id: Uuid,
        claimed: BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<VerificationSession> {
        let mut session = self.get_session(session_id).await?;
        if session.status != SessionStatus::Open {
            return Err(Error::InvalidTransition(format!(
                "verification session {} is no longer open",
                session_id
            )));
        }
        let expected = session.version;
        if now >= session.expires_at {
            session.status = SessionStatus::Expired;
            self.store.sessions.compare_and_swap(&session, expected).await?;
            warn!(session_id = %session_id, "Verification session expired before confirmation");
            return Err(Error::Expired(format!(
                "verification session {} expired at {}",
                session_id, session.expires_at
            )));
        }

        if let Some(item) = self.store.reviews.find_open_for_job(session.job_id).await? {
            if item.status == ReviewStatus::Claimed {
                return Err(Error::InvalidTransition(format!(
                    "job {} is being reviewed by {}; confirm after the review is resolved",
                    session.job_id,
                    item.claimed_by.as_deref().unwrap_or("a reviewer")
                )));
            }
        }

        let claimed = normalize_claims(claimed)?;
        let corrections = corrections_from(&claimed)?;

        let field_matches: BTreeMap<String, bool> = claimed
            .iter()
            .map(|(name, value)| {
                let matched = session
                    .extracted_fields
                    .get(name)
                    .map(|extracted| tolerant_match(extracted, value))
                    .unwrap_or(false);
                (name.clone(), matched)
            })
            .collect();
        let matched = field_matches.values().filter(|m| **m).count();
        let score = matched as f64 / field_matches.len() as f64;
        let passed = score >= self.config.pass_threshold;

        session.status = SessionStatus::Confirmed;
        session.claimed_fields = claimed;
        session.field_matches = field_matches;
        session.overall_match_score = score;
        session.passed = passed;
        session.confirmed_at = Some(now);

        if !self.store.sessions.compare_and_swap(&session, expected).await? {
            return Err(Error::InvalidTransition(format!(
                "verification session {} was already confirmed",
                session_id
            )));
        }
        session.version = expected + 1;

        if !passed {
            let mut result = self
                .store
                .results
                .get(session.job_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("result for job {}", session.job_id)))?;
            corrections.apply_to(&mut result);
            self.store.results.upsert(&result).await?;
        }

        let job = self
            .store
            .jobs
            .get(session.job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", session.job_id)))?;
        if let Some(level) = job.confidence_level {
            let detail = format!("session {} matched {}/{}", session.id, matched, session.field_matches.len());
            self.queue
                .record_verification(session.job_id, &session.owner, level, passed, detail)
                .await?;
        }

        info!(
            session_id = %session.id,
            job_id = %session.job_id,
            confidence = score,
            passed,
            "Verification session confirmed"
        );
        Ok(session)
    }
}

/// Validate field names, drop blank values, and put dates and product
/// codes into their canonical text form.
fn normalize_claims(claimed: BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for (name, value) in claimed {
        let name = name.trim().to_lowercase();
        if !field::ALL.contains(&name.as_str()) {
            return Err(Error::InvalidInput(format!("unknown field: {}", name)));
        }
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let value = match name.as_str() {
            field::EXPIRY_DATE | field::PRODUCTION_DATE => dates::parse_loose(value)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .ok_or_else(|| Error::InvalidInput(format!("unreadable date for {}: {}", name, value)))?,
            field::GTIN => gtin::normalize(value)
                .ok_or_else(|| Error::InvalidInput(format!("invalid product code: {}", value)))?,
            _ => value.to_string(),
        };
        out.insert(name, value);
    }
    if out.is_empty() {
        return Err(Error::InvalidInput("no claimed fields to compare".into()));
    }
    Ok(out)
}

fn corrections_from(claimed: &BTreeMap<String, String>) -> Result<FieldCorrections> {
    let text = |name: &str| claimed.get(name).cloned();
    let date = |name: &str| {
        claimed
            .get(name)
            .map(|v| {
                dates::parse_loose(v)
                    .ok_or_else(|| Error::InvalidInput(format!("unreadable date for {}: {}", name, v)))
            })
            .transpose()
    };
    Ok(FieldCorrections {
        gtin: text(field::GTIN),
        lot_number: text(field::LOT_NUMBER),
        serial_number: text(field::SERIAL_NUMBER),
        expiry_date: date(field::EXPIRY_DATE)?,
        production_date: date(field::PRODUCTION_DATE)?,
        batch_code: text(field::BATCH_CODE),
        brand: text(field::BRAND),
        model: text(field::MODEL),
        age_recommendation: text(field::AGE_RECOMMENDATION),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerant_match() {
        assert!(tolerant_match("ABC123", "abc123"));
        assert!(tolerant_match("Acme Toys", "acme"));
        assert!(tolerant_match("L1", "Lot L1"));
        assert!(!tolerant_match("ABC123", "XYZ"));
        assert!(!tolerant_match("", "x"));
        assert!(!tolerant_match("x", "   "));
    }

    #[test]
    fn test_normalize_claims_rejects_unknown_field() {
        let mut claimed = BTreeMap::new();
        claimed.insert("colour".to_string(), "red".to_string());
        assert!(matches!(normalize_claims(claimed), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_normalize_claims_canonicalizes_values() {
        let mut claimed = BTreeMap::new();
        claimed.insert("GTIN".to_string(), "012345678905".to_string());
        claimed.insert("expiry_date".to_string(), "2025/01/01".to_string());
        claimed.insert("lot_number".to_string(), "  ".to_string());
        let out = normalize_claims(claimed).unwrap();
        assert_eq!(out.get("gtin").map(String::as_str), Some("00012345678905"));
        assert_eq!(out.get("expiry_date").map(String::as_str), Some("2025-01-01"));
        assert!(!out.contains_key("lot_number"));
    }

    #[test]
    fn test_blank_claims_rejected() {
        let mut claimed = BTreeMap::new();
        claimed.insert("brand".to_string(), "".to_string());
        assert!(matches!(normalize_claims(claimed), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_corrections_from_claims() {
        let mut claimed = BTreeMap::new();
        claimed.insert("lot_number".to_string(), "L9".to_string());
        claimed.insert("expiry_date".to_string(), "2026-03-31".to_string());
        let c = corrections_from(&claimed).unwrap();
        assert_eq!(c.lot_number.as_deref(), Some("L9"));
        assert_eq!(
            c.expiry_date,
            chrono::NaiveDate::from_ymd_opt(2026, 3, 31)
        );
        assert_eq!(c.corrected_fields(), vec!["lot_number", "expiry_date"]);
    }
}
