//! External capabilities the engine consumes: a clock and a record store.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::domain::ProgressionRecord;
use crate::error::{EngineError, EngineResult};

pub trait Clock: Send + Sync {
  /// Current calendar date (UTC).
  fn today(&self) -> NaiveDate;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn today(&self) -> NaiveDate {
    Utc::now().date_naive()
  }
}

/// Clock pinned to a settable date.
#[derive(Debug)]
pub struct FixedClock(std::sync::Mutex<NaiveDate>);

impl FixedClock {
  pub fn new(day: NaiveDate) -> Self {
    Self(std::sync::Mutex::new(day))
  }
}

#[cfg(test)]
impl FixedClock {
  pub fn set(&self, day: NaiveDate) {
    *self.0.lock().unwrap_or_else(|e| e.into_inner()) = day;
  }

  pub fn advance_days(&self, days: u64) {
    let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(next) = guard.checked_add_days(chrono::Days::new(days)) {
      *guard = next;
    }
  }
}

impl Clock for FixedClock {
  fn today(&self) -> NaiveDate {
    *self.0.lock().unwrap_or_else(|e| e.into_inner())
  }
}

/// Persistent per-subject records.
///
/// `save` is an atomic replace guarded by `revision`: it must succeed only when the stored
/// revision is `record.revision - 1` (or nothing is stored and `record.revision == 1`).
#[async_trait]
pub trait RecordStore: Send + Sync {
  async fn load(&self, subject_id: &str) -> EngineResult<ProgressionRecord>;

  async fn save(&self, record: &ProgressionRecord) -> EngineResult<()>;

  /// Every stored record; used for the leaderboard.
  async fn list(&self) -> EngineResult<Vec<ProgressionRecord>>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
  records: Arc<RwLock<HashMap<String, ProgressionRecord>>>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Put a record as-is, bypassing the revision check.
  #[cfg(test)]
  pub async fn insert_raw(&self, record: ProgressionRecord) {
    self.records.write().await.insert(record.subject_id.clone(), record);
  }
}

#[async_trait]
impl RecordStore for InMemoryStore {
  #[instrument(level = "debug", skip(self))]
  async fn load(&self, subject_id: &str) -> EngineResult<ProgressionRecord> {
    self.records
      .read()
      .await
      .get(subject_id)
      .cloned()
      .ok_or_else(|| EngineError::NotFound(subject_id.to_string()))
  }

  #[instrument(level = "debug", skip(self, record), fields(subject = %record.subject_id, revision = record.revision))]
  async fn save(&self, record: &ProgressionRecord) -> EngineResult<()> {
    let mut records = self.records.write().await;
    let found = records.get(&record.subject_id).map_or(0, |r| r.revision);
    let expected = record.revision.saturating_sub(1);
    if record.revision == 0 || found != expected {
      return Err(EngineError::RevisionConflict {
        subject_id: record.subject_id.clone(),
        expected,
        found,
      });
    }
    records.insert(record.subject_id.clone(), record.clone());
    debug!(target: "progression", subject = %record.subject_id, revision = record.revision, "Record saved");
    Ok(())
  }

  async fn list(&self) -> EngineResult<Vec<ProgressionRecord>> {
    Ok(self.records.read().await.values().cloned().collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn missing_record_is_not_found() {
    let store = InMemoryStore::new();
    assert!(matches!(store.load("ghost").await, Err(EngineError::NotFound(_))));
  }

  #[tokio::test]
  async fn save_requires_next_revision() {
    let store = InMemoryStore::new();
    let mut r = ProgressionRecord::new("u1");
    assert!(store.save(&r).await.is_err(), "revision 0 is never a valid write");

    r.revision = 1;
    store.save(&r).await.unwrap();
    assert!(matches!(store.save(&r).await, Err(EngineError::RevisionConflict { found: 1, .. })));

    r.revision = 2;
    store.save(&r).await.unwrap();
    assert_eq!(store.load("u1").await.unwrap().revision, 2);
    assert_eq!(store.list().await.unwrap().len(), 1);
  }

  #[test]
  fn fixed_clock_moves() {
    let c = FixedClock::new(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    c.advance_days(1);
    assert_eq!(c.today(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    c.set(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
    assert_eq!(c.today().to_string(), "2025-06-01");
  }
}
