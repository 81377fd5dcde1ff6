use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use super::domain::{CaseLibraryRecord, FinalDecision, LoanProfile, ReferenceStats};

/// Embedding width used by the in-memory corpus. Real deployments index
/// whatever their embedding service produces; the contract only fixes the
/// returned statistics.
pub const EMBEDDING_DIM: usize = 8;

/// Retrieval failures are soft by design: the decision path proceeds with an
/// empty reference sample rather than blocking on the corpus.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("case corpus unavailable: {0}")]
    Unavailable(String),
}

/// One anonymized neighbor returned by the similarity search. No case content
/// crosses this boundary, only decision metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseMatch {
    pub similarity: f32,
    pub approved: bool,
    pub approved_amount: Option<u64>,
}

/// Similarity search over the anonymized case corpus. Results are ranked
/// descending by similarity and may number fewer than `top_k`.
pub trait CaseCorpus: Send + Sync {
    fn similar(&self, profile: &LoanProfile, top_k: usize)
        -> Result<Vec<CaseMatch>, RetrievalError>;

    /// Write-once archival hook invoked when a decided case closes. Read-only
    /// corpora may ignore it.
    fn archive_case(&self, record: CaseLibraryRecord) -> Result<(), RetrievalError> {
        let _ = record;
        Ok(())
    }
}

/// Collapse a ranked sample into the aggregate statistics the decision engine
/// consumes. An empty sample yields `approval_rate = None`, never an error.
pub fn aggregate(sample: &[CaseMatch]) -> ReferenceStats {
    if sample.is_empty() {
        return ReferenceStats {
            approval_rate: None,
            avg_approved_amount: None,
            sample_size: 0,
        };
    }

    let approved: Vec<&CaseMatch> = sample.iter().filter(|m| m.approved).collect();
    let approval_rate = approved.len() as f64 / sample.len() as f64;

    let amounts: Vec<u64> = approved
        .iter()
        .filter_map(|m| m.approved_amount)
        .collect();
    let avg_approved_amount = if amounts.is_empty() {
        None
    } else {
        Some(amounts.iter().sum::<u64>() / amounts.len() as u64)
    };

    ReferenceStats {
        approval_rate: Some(approval_rate),
        avg_approved_amount,
        sample_size: sample.len(),
    }
}

/// Write-once, similarity-searchable corpus held in memory. Serves as the
/// development/test adapter behind the `CaseCorpus` seam.
#[derive(Default)]
pub struct InMemoryCaseCorpus {
    records: RwLock<Vec<CaseLibraryRecord>>,
}

impl InMemoryCaseCorpus {
    pub fn seeded(records: Vec<CaseLibraryRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Append a record at seeding or archival time. Records are never updated
    /// in place.
    pub fn insert(&self, record: CaseLibraryRecord) {
        self.records
            .write()
            .expect("corpus lock poisoned")
            .push(record);
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("corpus lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CaseCorpus for InMemoryCaseCorpus {
    fn similar(
        &self,
        profile: &LoanProfile,
        top_k: usize,
    ) -> Result<Vec<CaseMatch>, RetrievalError> {
        let records = self.records.read().expect("corpus lock poisoned");
        let query = profile_embedding(profile);

        let mut scored: Vec<(f32, &CaseLibraryRecord)> = records
            .iter()
            .map(|record| {
                (
                    cosine_similarity(&query, &record.embedding) as f32,
                    record,
                )
            })
            .collect();

        // Stable sort keeps equal-similarity neighbors in insertion order, so
        // repeated queries rank identically.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(similarity, record)| CaseMatch {
                similarity: similarity.clamp(0.0, 1.0),
                approved: record.final_decision == FinalDecision::Approved,
                approved_amount: record.approved_amount,
            })
            .collect())
    }

    fn archive_case(&self, record: CaseLibraryRecord) -> Result<(), RetrievalError> {
        self.insert(record);
        Ok(())
    }
}

/// Stand-in embedding for the in-memory adapter: a coarse numeric digest of
/// the financially relevant profile axes. Production corpora bring their own
/// vectors; only the dimensionality is shared.
pub fn profile_embedding(profile: &LoanProfile) -> Vec<f32> {
    let income = profile.monthly_income.unwrap_or(0) as f32;
    let amount = profile.amount.unwrap_or(0) as f32;
    let ratio = if income > 0.0 { amount / income } else { 0.0 };

    let mut embedding = vec![0.0f32; EMBEDDING_DIM];
    embedding[0] = (income / 100_000.0).min(1.0);
    embedding[1] = (amount / 1_000_000.0).min(1.0);
    embedding[2] = (ratio / 24.0).min(1.0);
    embedding[3] = text_bucket(profile.purpose.as_deref());
    embedding[4] = text_bucket(profile.job.as_deref());
    embedding[5] = profile.term_months.unwrap_or(0) as f32 / 120.0;
    embedding[6] = profile.annual_rate.unwrap_or(0.0) as f32;
    embedding[7] = 1.0;
    embedding
}

fn text_bucket(value: Option<&str>) -> f32 {
    let Some(value) = value else { return 0.0 };
    let hash: u32 = value
        .trim()
        .to_lowercase()
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    (hash % 97) as f32 / 97.0
}

/// Cosine similarity between two vectors; zero for mismatched lengths or
/// zero-magnitude inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut mag_a, mut mag_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }
    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom < f64::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0)
    }
}
