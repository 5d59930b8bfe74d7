//! Confidence lifecycle for knowledge entries.
//!
//! Fixed deltas on named events, clamped to [0.0, 1.0]:
//!
//! - verified: +0.1
//! - referenced: +0.05
//! - misleading: -0.2
//! - unused for 30 days: -0.1
//!
//! Entries below 0.5 are flagged deprecated. The flag is advisory: nothing is
//! ever deleted, and the stored `status` field is left untouched.

use super::KnowledgeStore;
use crate::error::Result;
use chrono::{Duration, Utc};

pub const VERIFY_BOOST: f64 = 0.1;
pub const REFERENCE_BOOST: f64 = 0.05;
pub const MISLEADING_PENALTY: f64 = -0.2;
pub const UNUSED_DECAY: f64 = -0.1;
pub const UNUSED_THRESHOLD_DAYS: i64 = 30;
pub const DEPRECATION_THRESHOLD: f64 = 0.5;

/// One entry touched by a decay pass.
#[derive(Debug, Clone)]
pub struct DecayRecord {
    pub id: String,
    pub old_confidence: f64,
    pub new_confidence: f64,
    pub deprecated: bool,
}

/// Clamp a confidence score to [0.0, 1.0], rounded to two decimals.
pub fn clamp_confidence(value: f64) -> f64 {
    (value.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

/// Adjusts confidence scores on knowledge entries in place.
#[derive(Debug, Clone)]
pub struct ConfidenceEngine {
    store: KnowledgeStore,
}

impl ConfidenceEngine {
    pub fn new(store: KnowledgeStore) -> Self {
        Self { store }
    }

    /// Entry was verified again: +0.1.
    pub fn on_verified(&self, id: &str) -> Result<Option<f64>> {
        self.adjust(id, VERIFY_BOOST)
    }

    /// Entry was referenced during work: +0.05.
    pub fn on_referenced(&self, id: &str) -> Result<Option<f64>> {
        self.adjust(id, REFERENCE_BOOST)
    }

    /// Entry proved misleading: -0.2.
    pub fn on_misleading(&self, id: &str) -> Result<Option<f64>> {
        self.adjust(id, MISLEADING_PENALTY)
    }

    /// Apply a delta to one entry and save it.
    ///
    /// Returns the new confidence, or `None` when the id does not exist.
    pub fn adjust(&self, id: &str, delta: f64) -> Result<Option<f64>> {
        let Some((path, mut file)) = self.store.find(id)? else {
            return Ok(None);
        };

        let new_confidence = clamp_confidence(file.frontmatter.confidence + delta);
        file.frontmatter.confidence = new_confidence;
        file.save(&path)?;

        Ok(Some(new_confidence))
    }

    /// Decay every entry created at least `days` days ago by -0.1.
    ///
    /// The creation date stands in for the last-active date, as the store
    /// keeps no separate usage timestamp.
    pub fn decay_unused(&self, days: i64) -> Result<Vec<DecayRecord>> {
        let cutoff = Utc::now().date_naive() - Duration::days(days);
        let mut decayed = Vec::new();

        for (path, mut file) in self.store.scan()? {
            if file.frontmatter.created > cutoff {
                continue;
            }

            let old_confidence = file.frontmatter.confidence;
            let new_confidence = clamp_confidence(old_confidence + UNUSED_DECAY);
            file.frontmatter.confidence = new_confidence;
            file.save(&path)?;

            decayed.push(DecayRecord {
                id: file.frontmatter.id.clone(),
                old_confidence,
                new_confidence,
                deprecated: new_confidence < DEPRECATION_THRESHOLD,
            });
        }

        Ok(decayed)
    }

    /// All entries currently below the deprecation threshold.
    pub fn deprecated_entries(&self) -> Result<Vec<(String, String, f64)>> {
        Ok(self
            .store
            .scan()?
            .into_iter()
            .filter(|(_, file)| file.is_deprecated())
            .map(|(_, file)| {
                (
                    file.frontmatter.id,
                    file.frontmatter.title,
                    file.frontmatter.confidence,
                )
            })
            .collect())
    }

    /// Current confidence of an entry.
    pub fn confidence(&self, id: &str) -> Result<Option<f64>> {
        Ok(self
            .store
            .find(id)?
            .map(|(_, file)| file.frontmatter.confidence))
    }
}
