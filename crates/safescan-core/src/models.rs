//! Core data models for safescan.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, ErrorKind, Result};

// =============================================================================
// IDENTIFIER TYPES
// =============================================================================

/// Symbology (or payload encoding) an identifier was read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbology {
    Ean8,
    Ean13,
    UpcA,
    UpcE,
    Itf14,
    Code128,
    Gs1128,
    DataBar,
    QrCode,
    DataMatrix,
    Gs1DataMatrix,
    Json,
    Url,
    Text,
    #[default]
    Unknown,
}

impl Symbology {
    /// Parse a scanner-supplied symbology hint.
    ///
    /// Case, dashes, underscores, and spaces are ignored, so `EAN-13`,
    /// `ean_13`, and `ean13` are the same hint. Returns `None` for
    /// unrecognized names.
    pub fn from_hint(hint: &str) -> Option<Self> {
        let key: String = hint
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' ' | '.'))
            .flat_map(char::to_lowercase)
            .collect();
        let symbology = match key.as_str() {
            "ean8" => Symbology::Ean8,
            "ean13" | "ean" | "jan" => Symbology::Ean13,
            "upca" | "upc" => Symbology::UpcA,
            "upce" => Symbology::UpcE,
            "itf14" | "itf" => Symbology::Itf14,
            "code128" => Symbology::Code128,
            "gs1128" | "ucc128" | "ean128" => Symbology::Gs1128,
            "databar" | "gs1databar" | "rss14" => Symbology::DataBar,
            "qr" | "qrcode" => Symbology::QrCode,
            "datamatrix" | "dm" => Symbology::DataMatrix,
            "gs1datamatrix" => Symbology::Gs1DataMatrix,
            "json" => Symbology::Json,
            "url" | "uri" | "digitallink" => Symbology::Url,
            "text" | "ocr" => Symbology::Text,
            _ => return None,
        };
        Some(symbology)
    }

    /// Symbology implied by the length of a bare numeric product code.
    pub fn for_numeric_length(len: usize) -> Self {
        match len {
            8 => Symbology::Ean8,
            12 => Symbology::UpcA,
            13 => Symbology::Ean13,
            14 => Symbology::Itf14,
            _ => Symbology::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Symbology::Ean8 => "ean8",
            Symbology::Ean13 => "ean13",
            Symbology::UpcA => "upc_a",
            Symbology::UpcE => "upc_e",
            Symbology::Itf14 => "itf14",
            Symbology::Code128 => "code128",
            Symbology::Gs1128 => "gs1128",
            Symbology::DataBar => "data_bar",
            Symbology::QrCode => "qr_code",
            Symbology::DataMatrix => "data_matrix",
            Symbology::Gs1DataMatrix => "gs1_data_matrix",
            Symbology::Json => "json",
            Symbology::Url => "url",
            Symbology::Text => "text",
            Symbology::Unknown => "unknown",
        }
    }
}

/// Field names shared by extraction results, corrections, and verification.
pub mod field {
    pub const GTIN: &str = "gtin";
    pub const LOT_NUMBER: &str = "lot_number";
    pub const SERIAL_NUMBER: &str = "serial_number";
    pub const EXPIRY_DATE: &str = "expiry_date";
    pub const PRODUCTION_DATE: &str = "production_date";
    pub const BATCH_CODE: &str = "batch_code";
    pub const BRAND: &str = "brand";
    pub const MODEL: &str = "model";
    pub const AGE_RECOMMENDATION: &str = "age_recommendation";

    /// Every field a submitter or reviewer may confirm or correct.
    pub const ALL: [&str; 9] = [
        GTIN,
        LOT_NUMBER,
        SERIAL_NUMBER,
        EXPIRY_DATE,
        PRODUCTION_DATE,
        BATCH_CODE,
        BRAND,
        MODEL,
        AGE_RECOMMENDATION,
    ];
}

/// Canonical product identifier record produced by the decoder.
///
/// `gtin`, when present, is always 14 digits. A record with no gtin, lot,
/// or serial is "unidentified" but still carries `raw_payload` for audit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalIdentifier {
    pub gtin: Option<String>,
    pub lot_number: Option<String>,
    pub serial_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub production_date: Option<NaiveDate>,
    pub batch_code: Option<String>,
    pub raw_payload: String,
    pub symbology: Symbology,
    #[serde(default)]
    pub extra_fields: BTreeMap<String, String>,
}

impl CanonicalIdentifier {
    pub fn new(raw_payload: impl Into<String>, symbology: Symbology) -> Self {
        Self {
            raw_payload: raw_payload.into(),
            symbology,
            ..Default::default()
        }
    }

    /// True when at least one of gtin, lot, or serial is present.
    pub fn is_identified(&self) -> bool {
        self.gtin.is_some() || self.lot_number.is_some() || self.serial_number.is_some()
    }

    /// Lot number, falling back to the batch code.
    pub fn lot_or_batch(&self) -> Option<&str> {
        self.lot_number
            .as_deref()
            .or(self.batch_code.as_deref())
    }

    /// Number of key fields (gtin, lot, serial, expiry) present.
    pub fn key_fields_present(&self) -> usize {
        [
            self.gtin.is_some(),
            self.lot_or_batch().is_some(),
            self.serial_number.is_some(),
            self.expiry_date.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    /// Fill every absent field from `other`. Present fields are never overwritten.
    pub fn fill_missing_from(&mut self, other: &CanonicalIdentifier) {
        fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(value);
            }
        }
        fill(&mut self.gtin, &other.gtin);
        fill(&mut self.lot_number, &other.lot_number);
        fill(&mut self.serial_number, &other.serial_number);
        fill(&mut self.expiry_date, &other.expiry_date);
        fill(&mut self.production_date, &other.production_date);
        fill(&mut self.batch_code, &other.batch_code);
        for (key, value) in &other.extra_fields {
            self.extra_fields
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        if self.symbology == Symbology::Unknown {
            self.symbology = other.symbology;
        }
    }
}

/// Decoder output. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeResult {
    pub identifier: CanonicalIdentifier,
    pub success: bool,
    pub confidence: f64,
    pub error: Option<ErrorKind>,
}

impl DecodeResult {
    /// A decode that produced a candidate product code.
    pub fn succeeded(identifier: CanonicalIdentifier, confidence: f64) -> Self {
        Self {
            identifier,
            success: true,
            confidence: confidence.clamp(0.0, 1.0),
            error: None,
        }
    }

    /// A decode with no candidate product code. Any partial fields are kept.
    pub fn malformed(identifier: CanonicalIdentifier, confidence: f64) -> Self {
        Self {
            identifier,
            success: false,
            confidence: confidence.clamp(0.0, 1.0),
            error: Some(ErrorKind::MalformedPayload),
        }
    }
}

// =============================================================================
// CONFIDENCE
// =============================================================================

/// Confidence band of a scored extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// MEDIUM and LOW results are routed to the review queue.
    pub fn needs_review(&self) -> bool {
        !matches!(self, ConfidenceLevel::High)
    }

    /// Whether a passed verification session may close the review alone.
    pub fn allows_self_resolution(&self) -> bool {
        matches!(self, ConfidenceLevel::Medium)
    }

    /// Review queue priority (lower is claimed first), `None` for HIGH.
    pub fn review_priority(&self) -> Option<i32> {
        match self {
            ConfidenceLevel::High => None,
            ConfidenceLevel::Medium => Some(crate::defaults::REVIEW_PRIORITY_MEDIUM),
            ConfidenceLevel::Low => Some(crate::defaults::REVIEW_PRIORITY_LOW),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "HIGH",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::Low => "LOW",
        }
    }
}

// =============================================================================
// EXTRACTION JOB TYPES
// =============================================================================

/// Extraction job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Timeout,
}

/// Event driving a [`JobStatus`] transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEvent {
    /// A worker began processing.
    Start,
    /// All steps ran and the result was scored.
    Complete,
    /// A fatal step failure (integrity check).
    Fail,
    /// The soft budget or a hard deadline was exceeded.
    TimeOut,
    /// A reviewer rejected the result; the job runs again.
    Requeue,
}

impl JobEvent {
    pub const ALL: [JobEvent; 5] = [
        JobEvent::Start,
        JobEvent::Complete,
        JobEvent::Fail,
        JobEvent::TimeOut,
        JobEvent::Requeue,
    ];
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Timeout,
    ];

    /// Target state for `event`, or `InvalidTransition`.
    ///
    /// Transitions are strictly forward. The only backward edge is
    /// `Completed --Requeue--> Queued` (review rejection).
    pub fn next(self, event: JobEvent) -> Result<JobStatus> {
        use JobEvent as E;
        use JobStatus as S;
        match (self, event) {
            (S::Queued, E::Start) => Ok(S::Processing),
            (S::Processing, E::Complete) => Ok(S::Completed),
            (S::Processing, E::Fail) => Ok(S::Failed),
            (S::Processing, E::TimeOut) => Ok(S::Timeout),
            (S::Completed, E::Requeue) => Ok(S::Queued),
            (from, event) => Err(Error::InvalidTransition(format!(
                "{} --{:?}--> (not permitted)",
                from.as_str(),
                event
            ))),
        }
    }

    /// Terminal states end a processing run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Timeout
        )
    }

    /// Position in the forward order; used to assert monotonic transitions.
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Timeout => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Timeout => "timeout",
        }
    }
}

/// Pipeline step inside PROCESSING, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    IntegrityCheck,
    Normalize,
    DecodeBarcodes,
    ExtractText,
    ExtractLabels,
}

impl PipelineStep {
    pub const ORDER: [PipelineStep; 5] = [
        PipelineStep::IntegrityCheck,
        PipelineStep::Normalize,
        PipelineStep::DecodeBarcodes,
        PipelineStep::ExtractText,
        PipelineStep::ExtractLabels,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::IntegrityCheck => "integrity_check",
            PipelineStep::Normalize => "normalize",
            PipelineStep::DecodeBarcodes => "decode_barcodes",
            PipelineStep::ExtractText => "extract_text",
            PipelineStep::ExtractLabels => "extract_labels",
        }
    }
}

/// One completion flag per pipeline step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFlags {
    pub integrity_checked: bool,
    pub normalized: bool,
    pub barcode_decoded: bool,
    pub text_extracted: bool,
    pub labels_extracted: bool,
}

impl StepFlags {
    pub fn is_done(&self, step: PipelineStep) -> bool {
        match step {
            PipelineStep::IntegrityCheck => self.integrity_checked,
            PipelineStep::Normalize => self.normalized,
            PipelineStep::DecodeBarcodes => self.barcode_decoded,
            PipelineStep::ExtractText => self.text_extracted,
            PipelineStep::ExtractLabels => self.labels_extracted,
        }
    }

    pub fn mark_done(&mut self, step: PipelineStep) {
        match step {
            PipelineStep::IntegrityCheck => self.integrity_checked = true,
            PipelineStep::Normalize => self.normalized = true,
            PipelineStep::DecodeBarcodes => self.barcode_decoded = true,
            PipelineStep::ExtractText => self.text_extracted = true,
            PipelineStep::ExtractLabels => self.labels_extracted = true,
        }
    }

    /// First step in order that has not completed.
    pub fn next_pending(&self) -> Option<PipelineStep> {
        PipelineStep::ORDER
            .into_iter()
            .find(|step| !self.is_done(*step))
    }

    pub fn all_done(&self) -> bool {
        self.next_pending().is_none()
    }
}

/// OCR boundary output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrOutput {
    pub text: String,
    pub confidence: f64,
    pub provider: String,
}

/// A label detected in an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedLabel {
    pub name: String,
    pub confidence: f64,
}

/// Label boundary output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelOutput {
    #[serde(default)]
    pub labels: Vec<DetectedLabel>,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// A raw symbol payload located in an image by a symbol reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolPayload {
    pub payload: String,
    /// Symbology name as reported by the reader, if any.
    pub symbology: Option<String>,
}

/// Step outputs persisted alongside the step flags so a redelivered job
/// resumes instead of restarting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineCheckpoint {
    pub source_sha256: Option<String>,
    pub normalized_key: Option<String>,
    #[serde(default)]
    pub decodes: Vec<DecodeResult>,
    pub ocr: Option<OcrOutput>,
    pub labels: Option<LabelOutput>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Processing time spent across deliveries, in milliseconds.
    #[serde(default)]
    pub elapsed_ms: u64,
}

/// A single image extraction job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionJob {
    pub id: Uuid,
    pub owner: String,
    /// Object-store key of the submitted image.
    pub image_ref: String,
    pub status: JobStatus,
    pub step_flags: StepFlags,
    #[serde(default)]
    pub checkpoint: PipelineCheckpoint,
    pub confidence_score: f64,
    pub confidence_level: Option<ConfidenceLevel>,
    pub needs_review: bool,
    pub error: Option<String>,
    /// Times a review rejection sent this job back to the queue.
    pub retry_count: u32,
    /// Deliveries of the current run (reset on requeue).
    pub delivery_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExtractionJob {
    pub fn new(image_ref: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            owner: owner.into(),
            image_ref: image_ref.into(),
            status: JobStatus::Queued,
            step_flags: StepFlags::default(),
            checkpoint: PipelineCheckpoint::default(),
            confidence_score: 0.0,
            confidence_level: None,
            needs_review: false,
            error: None,
            retry_count: 0,
            delivery_attempts: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Apply a lifecycle event, updating timestamps and counters.
    pub fn apply(&mut self, event: JobEvent, now: DateTime<Utc>) -> Result<()> {
        let next = self.status.next(event)?;
        match event {
            JobEvent::Start => {
                self.started_at = Some(now);
            }
            JobEvent::Complete | JobEvent::Fail | JobEvent::TimeOut => {
                self.completed_at = Some(now);
            }
            JobEvent::Requeue => {
                self.retry_count += 1;
                self.delivery_attempts = 0;
                self.step_flags = StepFlags::default();
                self.checkpoint = PipelineCheckpoint::default();
                self.confidence_score = 0.0;
                self.confidence_level = None;
                self.needs_review = false;
                self.error = None;
                self.started_at = None;
                self.completed_at = None;
            }
        }
        self.status = next;
        Ok(())
    }
}

// =============================================================================
// EXTRACTION RESULT
// =============================================================================

/// Extraction output attached 1:1 to a completed or failed job.
///
/// After creation only review resolution and verification sessions mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub job_id: Uuid,
    pub identifier: CanonicalIdentifier,
    pub ocr_text: Option<String>,
    pub ocr_confidence: Option<f64>,
    pub ocr_provider: Option<String>,
    #[serde(default)]
    pub labels: Vec<DetectedLabel>,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Processing warnings (degraded steps, late providers).
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Warning statements read from the product label.
    #[serde(default)]
    pub hazard_warnings: Vec<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub age_recommendation: Option<String>,
    pub source_sha256: Option<String>,
    pub normalized_key: Option<String>,
    /// Set once a human reviewer or the submitter confirmed or corrected it.
    pub human_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExtractionResult {
    pub fn new(job_id: Uuid, identifier: CanonicalIdentifier) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            identifier,
            ocr_text: None,
            ocr_confidence: None,
            ocr_provider: None,
            labels: Vec::new(),
            categories: Vec::new(),
            warnings: Vec::new(),
            hazard_warnings: Vec::new(),
            brand: None,
            model: None,
            age_recommendation: None,
            source_sha256: None,
            normalized_key: None,
            human_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Present confirmable fields keyed by [`field`] name. Dates are ISO 8601.
    pub fn field_map(&self) -> BTreeMap<String, String> {
        let id = &self.identifier;
        let date = |d: &Option<NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string());
        let pairs = [
            (field::GTIN, id.gtin.clone()),
            (field::LOT_NUMBER, id.lot_number.clone()),
            (field::SERIAL_NUMBER, id.serial_number.clone()),
            (field::EXPIRY_DATE, date(&id.expiry_date)),
            (field::PRODUCTION_DATE, date(&id.production_date)),
            (field::BATCH_CODE, id.batch_code.clone()),
            (field::BRAND, self.brand.clone()),
            (field::MODEL, self.model.clone()),
            (field::AGE_RECOMMENDATION, self.age_recommendation.clone()),
        ];
        pairs
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
            .collect()
    }
}

/// Partial overwrite of an [`ExtractionResult`], supplied by a reviewer or
/// derived from a failed verification session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldCorrections {
    pub gtin: Option<String>,
    pub lot_number: Option<String>,
    pub serial_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub production_date: Option<NaiveDate>,
    pub batch_code: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub age_recommendation: Option<String>,
}

impl FieldCorrections {
    pub fn is_empty(&self) -> bool {
        self.corrected_fields().is_empty()
    }

    /// Names of the fields this correction sets.
    pub fn corrected_fields(&self) -> Vec<&'static str> {
        [
            (field::GTIN, self.gtin.is_some()),
            (field::LOT_NUMBER, self.lot_number.is_some()),
            (field::SERIAL_NUMBER, self.serial_number.is_some()),
            (field::EXPIRY_DATE, self.expiry_date.is_some()),
            (field::PRODUCTION_DATE, self.production_date.is_some()),
            (field::BATCH_CODE, self.batch_code.is_some()),
            (field::BRAND, self.brand.is_some()),
            (field::MODEL, self.model.is_some()),
            (field::AGE_RECOMMENDATION, self.age_recommendation.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    /// Overwrite the fields this correction sets; returns their names.
    pub fn apply_to(&self, result: &mut ExtractionResult) -> Vec<&'static str> {
        fn set<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                slot.clone_from(value);
            }
        }
        let id = &mut result.identifier;
        set(&mut id.gtin, &self.gtin);
        set(&mut id.lot_number, &self.lot_number);
        set(&mut id.serial_number, &self.serial_number);
        set(&mut id.expiry_date, &self.expiry_date);
        set(&mut id.production_date, &self.production_date);
        set(&mut id.batch_code, &self.batch_code);
        set(&mut result.brand, &self.brand);
        set(&mut result.model, &self.model);
        set(&mut result.age_recommendation, &self.age_recommendation);

        let fields = self.corrected_fields();
        if !fields.is_empty() {
            result.updated_at = Utc::now();
        }
        fields
    }
}

// =============================================================================
// REVIEW QUEUE TYPES
// =============================================================================

/// Review item lifecycle state.
///
/// A "needs more info" resolution is recorded in the audit log and returns
/// the item to `Queued`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Queued,
    Claimed,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewStatus::Approved | ReviewStatus::Rejected)
    }
}

/// Reviewer resolution of a claimed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
    NeedsMoreInfo,
}

/// Kind of audit log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Claimed,
    Approved,
    Rejected,
    NeedsMoreInfo,
    SubmitterVerified,
    SubmitterCorrected,
    SelfResolved,
}

/// Immutable audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub detail: Option<String>,
}

/// Human review work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: Uuid,
    pub job_id: Uuid,
    pub status: ReviewStatus,
    /// Lower is claimed first.
    pub priority: i32,
    pub reason: String,
    pub confidence_level: ConfidenceLevel,
    pub confidence_score: f64,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub corrections: Option<FieldCorrections>,
    audit_log: Vec<AuditEntry>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Incremented by every persisted change; used for compare-and-set.
    pub version: u64,
}

impl ReviewItem {
    pub fn new(
        job_id: Uuid,
        level: ConfidenceLevel,
        score: f64,
        priority: i32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            job_id,
            status: ReviewStatus::Queued,
            priority,
            reason: reason.into(),
            confidence_level: level,
            confidence_score: score,
            claimed_by: None,
            claimed_at: None,
            corrections: None,
            audit_log: Vec::new(),
            created_at: Utc::now(),
            resolved_at: None,
            version: 0,
        }
    }

    /// Append-only view of the audit log.
    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit_log
    }

    /// Append an audit entry. Entries are never removed.
    pub fn record(
        &mut self,
        action: AuditAction,
        actor: impl Into<String>,
        detail: Option<String>,
        timestamp: DateTime<Utc>,
    ) {
        self.audit_log.push(AuditEntry {
            action,
            actor: actor.into(),
            timestamp,
            detail,
        });
    }
}

/// Filter for listing review items.
#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    pub status: Option<ReviewStatus>,
    pub confidence_level: Option<ConfidenceLevel>,
    pub claimed_by: Option<String>,
    pub limit: Option<usize>,
}

// =============================================================================
// VERIFICATION SESSION TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Confirmed,
    Expired,
}

/// Submitter confirmation handshake for a MEDIUM/LOW extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationSession {
    pub id: Uuid,
    pub job_id: Uuid,
    pub owner: String,
    pub status: SessionStatus,
    pub extracted_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub claimed_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub field_matches: BTreeMap<String, bool>,
    pub overall_match_score: f64,
    pub passed: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub version: u64,
}

// =============================================================================
// SAFETY MATCH TYPES
// =============================================================================

/// Tier of a registry match, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    ExactUnit,
    LotMatch,
    ExpiryMatch,
    ProductMatch,
    ProductMatchDifferentLot,
    NoMatch,
}

impl MatchType {
    pub fn confidence(&self) -> f64 {
        use crate::defaults::*;
        match self {
            MatchType::ExactUnit => MATCH_CONFIDENCE_EXACT_UNIT,
            MatchType::LotMatch => MATCH_CONFIDENCE_LOT,
            MatchType::ExpiryMatch => MATCH_CONFIDENCE_EXPIRY,
            MatchType::ProductMatch => MATCH_CONFIDENCE_PRODUCT,
            MatchType::ProductMatchDifferentLot => MATCH_CONFIDENCE_DIFFERENT_LOT,
            MatchType::NoMatch => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::ExactUnit => "EXACT_UNIT",
            MatchType::LotMatch => "LOT_MATCH",
            MatchType::ExpiryMatch => "EXPIRY_MATCH",
            MatchType::ProductMatch => "PRODUCT_MATCH",
            MatchType::ProductMatchDifferentLot => "PRODUCT_MATCH_DIFFERENT_LOT",
            MatchType::NoMatch => "NO_MATCH",
        }
    }
}

/// Hazard severity, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

/// A safety-registry entry (recall or incident notice).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub id: String,
    pub product_code: String,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub hazard_text: String,
    #[serde(default)]
    pub lot_numbers: Vec<String>,
    #[serde(default)]
    pub serial_numbers: Vec<String>,
    #[serde(default)]
    pub expiry_dates: Vec<NaiveDate>,
    #[serde(default)]
    pub has_lot_restriction: bool,
    #[serde(default)]
    pub has_serial_restriction: bool,
    #[serde(default)]
    pub source_agency: String,
    #[serde(default)]
    pub recall_date: Option<NaiveDate>,
    #[serde(default)]
    pub remedy: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Severity assigned by the issuing agency, if published.
    #[serde(default)]
    pub agency_severity: Option<Severity>,
}

impl RegistryRecord {
    /// True when the recall is limited to specific lots or serials.
    pub fn is_restricted(&self) -> bool {
        self.has_lot_restriction || self.has_serial_restriction
    }
}

/// Registry lookup criteria. Absent fields do not constrain the lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryQuery {
    pub serial: Option<String>,
    pub lot: Option<String>,
    pub product_code: Option<String>,
    pub expiry: Option<NaiveDate>,
}

/// Safety match outcome. Not persisted by this system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub found: bool,
    pub match_type: MatchType,
    pub confidence: f64,
    pub severity: Severity,
    pub matched_records: Vec<RegistryRecord>,
    /// User-facing summary. Absence of a match is never phrased as safety.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbology_from_hint_ignores_case_and_punctuation() {
        assert_eq!(Symbology::from_hint("EAN-13"), Some(Symbology::Ean13));
        assert_eq!(Symbology::from_hint("upc_a"), Some(Symbology::UpcA));
        assert_eq!(Symbology::from_hint("QR Code"), Some(Symbology::QrCode));
        assert_eq!(Symbology::from_hint("GS1-128"), Some(Symbology::Gs1128));
        assert_eq!(Symbology::from_hint("aztec"), None);
    }

    #[test]
    fn test_symbology_for_numeric_length() {
        assert_eq!(Symbology::for_numeric_length(8), Symbology::Ean8);
        assert_eq!(Symbology::for_numeric_length(12), Symbology::UpcA);
        assert_eq!(Symbology::for_numeric_length(13), Symbology::Ean13);
        assert_eq!(Symbology::for_numeric_length(14), Symbology::Itf14);
        assert_eq!(Symbology::for_numeric_length(10), Symbology::Unknown);
    }

    #[test]
    fn test_identifier_unidentified_keeps_raw_payload() {
        let id = CanonicalIdentifier::new("garbage", Symbology::Text);
        assert!(!id.is_identified());
        assert_eq!(id.raw_payload, "garbage");
        assert_eq!(id.key_fields_present(), 0);
    }

    #[test]
    fn test_identifier_lot_falls_back_to_batch() {
        let mut id = CanonicalIdentifier::new("", Symbology::Text);
        id.batch_code = Some("B7".into());
        assert_eq!(id.lot_or_batch(), Some("B7"));
        id.lot_number = Some("L1".into());
        assert_eq!(id.lot_or_batch(), Some("L1"));
    }

    #[test]
    fn test_fill_missing_never_overwrites() {
        let mut a = CanonicalIdentifier::new("a", Symbology::Unknown);
        a.gtin = Some("00000000000001".into());
        let mut b = CanonicalIdentifier::new("b", Symbology::QrCode);
        b.gtin = Some("00000000000002".into());
        b.lot_number = Some("LOT9".into());
        b.extra_fields.insert("count".into(), "3".into());

        a.fill_missing_from(&b);
        assert_eq!(a.gtin.as_deref(), Some("00000000000001"));
        assert_eq!(a.lot_number.as_deref(), Some("LOT9"));
        assert_eq!(a.extra_fields.get("count").map(String::as_str), Some("3"));
        assert_eq!(a.symbology, Symbology::QrCode);
        assert_eq!(a.raw_payload, "a");
    }

    #[test]
    fn test_confidence_level_routing() {
        assert!(!ConfidenceLevel::High.needs_review());
        assert!(ConfidenceLevel::Medium.needs_review());
        assert!(ConfidenceLevel::Low.needs_review());
        assert!(ConfidenceLevel::Medium.allows_self_resolution());
        assert!(!ConfidenceLevel::Low.allows_self_resolution());
        assert_eq!(ConfidenceLevel::High.review_priority(), None);
        assert!(
            ConfidenceLevel::Low.review_priority() < ConfidenceLevel::Medium.review_priority()
        );
    }

    #[test]
    fn test_confidence_level_serialization() {
        let json = serde_json::to_string(&ConfidenceLevel::Medium).unwrap();
        assert_eq!(json, "\"MEDIUM\"");
    }

    #[test]
    fn test_step_flags_next_pending_follows_order() {
        let mut flags = StepFlags::default();
        assert_eq!(flags.next_pending(), Some(PipelineStep::IntegrityCheck));
        for step in PipelineStep::ORDER {
            assert_eq!(flags.next_pending(), Some(step));
            flags.mark_done(step);
            assert!(flags.is_done(step));
        }
        assert!(flags.all_done());
        assert_eq!(flags.next_pending(), None);
    }

    #[test]
    fn test_job_apply_sets_timestamps() {
        let mut job = ExtractionJob::new("uploads/a.jpg", "user-1");
        let t0 = Utc::now();
        job.apply(JobEvent::Start, t0).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.started_at, Some(t0));

        job.apply(JobEvent::Complete, t0).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.completed_at, Some(t0));
    }

    #[test]
    fn test_job_requeue_resets_progress_and_counts_retry() {
        let mut job = ExtractionJob::new("uploads/a.jpg", "user-1");
        let now = Utc::now();
        job.apply(JobEvent::Start, now).unwrap();
        job.step_flags.mark_done(PipelineStep::IntegrityCheck);
        job.checkpoint.warnings.push("w".into());
        job.delivery_attempts = 2;
        job.needs_review = true;
        job.apply(JobEvent::Complete, now).unwrap();

        job.apply(JobEvent::Requeue, now).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.retry_count, 1);
        assert_eq!(job.delivery_attempts, 0);
        assert_eq!(job.step_flags, StepFlags::default());
        assert!(job.checkpoint.warnings.is_empty());
        assert!(!job.needs_review);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_job_invalid_transition_leaves_state() {
        let mut job = ExtractionJob::new("k", "o");
        let err = job.apply(JobEvent::Complete, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_field_map_formats_dates() {
        let mut id = CanonicalIdentifier::new("p", Symbology::Gs1128);
        id.gtin = Some("00012345678905".into());
        id.expiry_date = NaiveDate::from_ymd_opt(2025, 1, 1);
        let mut result = ExtractionResult::new(Uuid::now_v7(), id);
        result.brand = Some("Acme".into());

        let map = result.field_map();
        assert_eq!(map.get(field::GTIN).unwrap(), "00012345678905");
        assert_eq!(map.get(field::EXPIRY_DATE).unwrap(), "2025-01-01");
        assert_eq!(map.get(field::BRAND).unwrap(), "Acme");
        assert!(!map.contains_key(field::LOT_NUMBER));
    }

    #[test]
    fn test_corrections_apply_only_set_fields() {
        let mut id = CanonicalIdentifier::new("p", Symbology::Text);
        id.lot_number = Some("OLD".into());
        id.serial_number = Some("SN1".into());
        let mut result = ExtractionResult::new(Uuid::now_v7(), id);

        let corrections = FieldCorrections {
            lot_number: Some("NEW".into()),
            brand: Some("Acme".into()),
            ..Default::default()
        };
        let changed = corrections.apply_to(&mut result);
        assert_eq!(changed, vec![field::LOT_NUMBER, field::BRAND]);
        assert_eq!(result.identifier.lot_number.as_deref(), Some("NEW"));
        assert_eq!(result.identifier.serial_number.as_deref(), Some("SN1"));
        assert_eq!(result.brand.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_review_item_audit_is_append_only() {
        let mut item = ReviewItem::new(Uuid::now_v7(), ConfidenceLevel::Low, 0.4, 1, "low");
        let now = Utc::now();
        item.record(AuditAction::Created, "pipeline", None, now);
        item.record(AuditAction::Claimed, "rev-1", None, now);
        assert_eq!(item.audit_log().len(), 2);
        assert_eq!(item.audit_log()[0].action, AuditAction::Created);
        assert_eq!(item.audit_log()[1].actor, "rev-1");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
        assert_eq!(
            [Severity::Medium, Severity::Critical, Severity::Low]
                .into_iter()
                .max(),
            Some(Severity::Critical)
        );
    }

    #[test]
    fn test_match_type_serialization() {
        let json = serde_json::to_string(&MatchType::ProductMatchDifferentLot).unwrap();
        assert_eq!(json, "\"PRODUCT_MATCH_DIFFERENT_LOT\"");
        assert_eq!(MatchType::NoMatch.confidence(), 0.0);
    }

    #[test]
    fn test_registry_record_sparse_json() {
        let record: RegistryRecord = serde_json::from_str(
            r#"{"id":"R1","product_code":"012345678905","hazard_text":"Choking hazard"}"#,
        )
        .unwrap();
        assert!(!record.is_restricted());
        assert!(record.lot_numbers.is_empty());
        assert_eq!(record.agency_severity, None);
    }
}
