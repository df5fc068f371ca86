//! Session-variable backend.
//!
//! USSD requests carry no state, so the interview engine keeps a small map of
//! per-investigator variables between requests. This module defines the
//! backend contract and an in-memory implementation.
//!
//! # Key Format
//!
//! Variables are grouped under a namespace per investigator
//! (see [`session_namespace`]). Within a namespace, keys are plain strings
//! chosen by the caller.
//!
//! # Expiry
//!
//! Backends have no expiry semantics. Staleness is decided by the engine from
//! timestamps it stores itself.

use crate::{read_guard, write_guard};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use survey_core::{InvestigatorId, SurveyResult};

/// Namespace holding all variables of one investigator.
pub fn session_namespace(investigator_id: InvestigatorId) -> String {
    format!("Investigator-{}", investigator_id)
}

/// Backend for per-investigator session variables.
///
/// Implementations should be thread-safe. A missing key is `Ok(None)`, never
/// an error.
pub trait SessionBackend: Send + Sync {
    /// Get a variable.
    fn get(&self, investigator_id: InvestigatorId, key: &str) -> SurveyResult<Option<Value>>;

    /// Set a variable, replacing any previous value.
    fn set(&self, investigator_id: InvestigatorId, key: &str, value: Value) -> SurveyResult<()>;

    /// Drop every variable of the investigator.
    fn delete(&self, investigator_id: InvestigatorId) -> SurveyResult<()>;
}

/// Counters for session backend access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Number of reads that found a value.
    pub hits: u64,
    /// Number of reads that found nothing.
    pub misses: u64,
    /// Number of investigators with at least one stored variable.
    pub entry_count: u64,
}

impl SessionStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Process-local session backend.
#[derive(Debug, Default)]
pub struct InMemorySessionBackend {
    entries: Arc<RwLock<HashMap<String, HashMap<String, Value>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Access counters and the current number of sessions.
    pub fn stats(&self) -> SurveyResult<SessionStats> {
        Ok(SessionStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: read_guard(&self.entries)?.len() as u64,
        })
    }

    /// Keys currently stored for an investigator, sorted.
    pub fn keys(&self, investigator_id: InvestigatorId) -> SurveyResult<Vec<String>> {
        let entries = read_guard(&self.entries)?;
        let mut keys: Vec<String> = entries
            .get(&session_namespace(investigator_id))
            .map(|vars| vars.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}

impl SessionBackend for InMemorySessionBackend {
    fn get(&self, investigator_id: InvestigatorId, key: &str) -> SurveyResult<Option<Value>> {
        let entries = read_guard(&self.entries)?;
        let value = entries
            .get(&session_namespace(investigator_id))
            .and_then(|vars| vars.get(key))
            .cloned();
        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        Ok(value)
    }

    fn set(&self, investigator_id: InvestigatorId, key: &str, value: Value) -> SurveyResult<()> {
        write_guard(&self.entries)?
            .entry(session_namespace(investigator_id))
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, investigator_id: InvestigatorId) -> SurveyResult<()> {
        write_guard(&self.entries)?.remove(&session_namespace(investigator_id));
        Ok(())
    }
}
