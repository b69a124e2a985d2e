//! Collaborator contracts
//!
//! The engine core owns no persistence. It talks to a decision store and
//! an append-only execution store through async traits, and takes its
//! clock and id generation as injectable collaborators so evaluations are
//! reproducible under test.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Decision, DecisionStatistics, DecisionStatus, ExecutionRecord};

pub use memory::{InMemoryDecisionStore, InMemoryExecutionStore};

/// A store-layer failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store failure: {0}")]
    Backend(String),
}

/// Pagination window; pages are 1-based
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub size: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, size: 20 }
    }
}

impl Page {
    /// Create a page, clamping both fields to at least 1
    pub fn new(page: u64, size: u64) -> Self {
        Self {
            page: page.max(1),
            size: size.max(1),
        }
    }

    /// Number of leading items to skip
    pub fn offset(&self) -> usize {
        ((self.page.max(1) - 1) * self.size.max(1)) as usize
    }
}

/// Filter for decision queries; absent fields match everything
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_key: Option<String>,
    /// Substring match on the display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DecisionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl DecisionFilter {
    /// Whether a decision satisfies every present field
    pub fn matches(&self, decision: &Decision) -> bool {
        if self.id.as_deref().is_some_and(|id| id != decision.id) {
            return false;
        }
        if self
            .decision_key
            .as_deref()
            .is_some_and(|key| key != decision.decision_key)
        {
            return false;
        }
        if self
            .name
            .as_deref()
            .is_some_and(|name| !decision.name.contains(name))
        {
            return false;
        }
        if self.status.is_some_and(|status| status != decision.status) {
            return false;
        }
        if self
            .category
            .as_deref()
            .is_some_and(|category| decision.category.as_deref() != Some(category))
        {
            return false;
        }
        if self
            .tenant_id
            .as_deref()
            .is_some_and(|tenant| decision.tenant_id.as_deref() != Some(tenant))
        {
            return false;
        }
        if self.version.is_some_and(|version| version != decision.version) {
            return false;
        }
        true
    }
}

/// Versioned decision storage
#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// Look up by opaque id
    async fn find_by_id(&self, id: &str) -> Result<Option<Decision>, StoreError>;

    /// Look up by logical key; `version` absent selects the highest version
    /// regardless of status
    async fn find_by_key(
        &self,
        decision_key: &str,
        tenant_id: Option<&str>,
        version: Option<u32>,
    ) -> Result<Option<Decision>, StoreError>;

    /// Highest published version for a key
    async fn find_highest_published_by_key(
        &self,
        decision_key: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<Decision>, StoreError>;

    /// Insert or replace by id
    async fn save(&self, decision: &Decision) -> Result<(), StoreError>;

    /// Remove by id
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Filtered page ordered by `create_time` descending; returns the page
    /// plus the total match count
    async fn query(
        &self,
        filter: &DecisionFilter,
        page: Page,
    ) -> Result<(Vec<Decision>, u64), StoreError>;
}

/// Append-only execution-record storage.
///
/// Must tolerate concurrent appends; no cross-request transactional
/// guarantees are required.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Append one record
    async fn append(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

    /// Filtered page ordered by `create_time` descending
    async fn query(
        &self,
        decision_id: Option<&str>,
        process_instance_id: Option<&str>,
        page: Page,
    ) -> Result<(Vec<ExecutionRecord>, u64), StoreError>;

    /// Aggregated statistics for one decision; empty stores yield zeros
    async fn stats(&self, decision_id: &str) -> Result<DecisionStatistics, StoreError>;
}

/// Injectable time source
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed instant, for deterministic tests
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Injectable id source for decisions and execution records
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random UUIDv4 ids
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Prefixed sequential ids, for deterministic tests
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    counter: std::sync::atomic::AtomicU64,
    prefix: String,
}

impl SequentialIdGenerator {
    /// Ids look like `<prefix>-1`, `<prefix>-2`, ...
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            counter: std::sync::atomic::AtomicU64::new(0),
            prefix: prefix.into(),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            + 1;
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_offset() {
        let page = Page::default();
        assert_eq!(page.page, 1);
        assert_eq!(page.size, 20);
        assert_eq!(page.offset(), 0);
        assert_eq!(Page::new(3, 10).offset(), 20);
        // zero values clamp to 1
        assert_eq!(Page::new(0, 0), Page { page: 1, size: 1 });
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIdGenerator::new("exec");
        assert_eq!(ids.next_id(), "exec-1");
        assert_eq!(ids.next_id(), "exec-2");
    }

    #[test]
    fn test_filter_matching() {
        use chrono::TimeZone;
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let decision = Decision::new("d1", "grading", "Age Grading", now).with_category("hr");

        assert!(DecisionFilter::default().matches(&decision));
        assert!(DecisionFilter {
            decision_key: Some("grading".into()),
            ..Default::default()
        }
        .matches(&decision));
        assert!(DecisionFilter {
            name: Some("Grading".into()),
            ..Default::default()
        }
        .matches(&decision));
        assert!(!DecisionFilter {
            status: Some(DecisionStatus::Published),
            ..Default::default()
        }
        .matches(&decision));
        assert!(!DecisionFilter {
            tenant_id: Some("acme".into()),
            ..Default::default()
        }
        .matches(&decision));
    }
}
