//! In-memory reference stores
//!
//! RwLock'd maps implementing the store contracts. These back the test
//! suite and small embedded deployments; production callers bring their
//! own implementations.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{DecisionFilter, DecisionStore, ExecutionStore, Page, StoreError};
use crate::models::{Decision, DecisionStatistics, DecisionStatus, ExecutionRecord, ExecutionStatus};

/// In-memory decision store
#[derive(Debug, Default)]
pub struct InMemoryDecisionStore {
    decisions: RwLock<HashMap<String, Decision>>,
}

impl InMemoryDecisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Decision>>, StoreError> {
        self.decisions
            .read()
            .map_err(|_| StoreError::Backend("decision store lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Decision>>, StoreError> {
        self.decisions
            .write()
            .map_err(|_| StoreError::Backend("decision store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DecisionStore for InMemoryDecisionStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Decision>, StoreError> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn find_by_key(
        &self,
        decision_key: &str,
        tenant_id: Option<&str>,
        version: Option<u32>,
    ) -> Result<Option<Decision>, StoreError> {
        let guard = self.read()?;
        let mut candidates: Vec<&Decision> = guard
            .values()
            .filter(|d| d.decision_key == decision_key && d.tenant_id.as_deref() == tenant_id)
            .collect();
        match version {
            Some(version) => Ok(candidates
                .into_iter()
                .find(|d| d.version == version)
                .cloned()),
            None => {
                candidates.sort_by_key(|d| d.version);
                Ok(candidates.last().cloned().cloned())
            }
        }
    }

    async fn find_highest_published_by_key(
        &self,
        decision_key: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<Decision>, StoreError> {
        let guard = self.read()?;
        Ok(guard
            .values()
            .filter(|d| {
                d.decision_key == decision_key
                    && d.tenant_id.as_deref() == tenant_id
                    && d.status == DecisionStatus::Published
            })
            .max_by_key(|d| d.version)
            .cloned())
    }

    async fn save(&self, decision: &Decision) -> Result<(), StoreError> {
        self.write()?
            .insert(decision.id.clone(), decision.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.write()?.remove(id);
        Ok(())
    }

    async fn query(
        &self,
        filter: &DecisionFilter,
        page: Page,
    ) -> Result<(Vec<Decision>, u64), StoreError> {
        let guard = self.read()?;
        let mut matches: Vec<Decision> = guard
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        // newest first; id as tie-breaker keeps paging stable
        matches.sort_by(|a, b| b.create_time.cmp(&a.create_time).then(a.id.cmp(&b.id)));
        let total = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(page.offset())
            .take(page.size.max(1) as usize)
            .collect();
        Ok((items, total))
    }
}

/// In-memory append-only execution store
#[derive(Debug, Default)]
pub struct InMemoryExecutionStore {
    records: RwLock<Vec<ExecutionRecord>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<ExecutionRecord>>, StoreError> {
        self.records
            .read()
            .map_err(|_| StoreError::Backend("execution store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn append(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .map_err(|_| StoreError::Backend("execution store lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }

    async fn query(
        &self,
        decision_id: Option<&str>,
        process_instance_id: Option<&str>,
        page: Page,
    ) -> Result<(Vec<ExecutionRecord>, u64), StoreError> {
        let guard = self.read()?;
        let mut matches: Vec<ExecutionRecord> = guard
            .iter()
            .filter(|r| {
                decision_id.is_none_or(|id| r.decision_id == id)
                    && process_instance_id
                        .is_none_or(|pid| r.process_instance_id.as_deref() == Some(pid))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.create_time.cmp(&a.create_time).then(a.id.cmp(&b.id)));
        let total = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(page.offset())
            .take(page.size.max(1) as usize)
            .collect();
        Ok((items, total))
    }

    async fn stats(&self, decision_id: &str) -> Result<DecisionStatistics, StoreError> {
        let guard = self.read()?;
        let mut stats = DecisionStatistics::default();
        let mut total_time: u64 = 0;
        for record in guard.iter().filter(|r| r.decision_id == decision_id) {
            stats.total_executions += 1;
            total_time += record.execution_time_ms;
            match record.status {
                ExecutionStatus::Success => stats.success_count += 1,
                ExecutionStatus::Failed => stats.failed_count += 1,
                ExecutionStatus::NoMatch => stats.no_match_count += 1,
            }
        }
        // empty aggregates coerce to zero rather than null
        if stats.total_executions > 0 {
            stats.avg_execution_time_ms = total_time as f64 / stats.total_executions as f64;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn decision(id: &str, key: &str, version: u32, status: DecisionStatus) -> Decision {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, version).unwrap();
        let mut d = Decision::new(id, key, key, now);
        d.version = version;
        d.status = status;
        d
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_find_by_key_picks_highest_version() {
        let rt = runtime();
        rt.block_on(async {
            let store = InMemoryDecisionStore::new();
            store
                .save(&decision("d1", "grading", 1, DecisionStatus::Published))
                .await
                .unwrap();
            store
                .save(&decision("d2", "grading", 2, DecisionStatus::Draft))
                .await
                .unwrap();

            let latest = store.find_by_key("grading", None, None).await.unwrap().unwrap();
            assert_eq!(latest.version, 2);

            let pinned = store
                .find_by_key("grading", None, Some(1))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(pinned.id, "d1");

            // highest published skips the draft v2
            let published = store
                .find_highest_published_by_key("grading", None)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(published.version, 1);
        });
    }

    #[test]
    fn test_tenant_isolation() {
        let rt = runtime();
        rt.block_on(async {
            let store = InMemoryDecisionStore::new();
            let mut tenanted = decision("d1", "grading", 1, DecisionStatus::Published);
            tenanted.tenant_id = Some("acme".to_string());
            store.save(&tenanted).await.unwrap();

            assert!(store.find_by_key("grading", None, None).await.unwrap().is_none());
            assert!(store
                .find_by_key("grading", Some("acme"), None)
                .await
                .unwrap()
                .is_some());
        });
    }

    #[test]
    fn test_query_orders_newest_first_and_pages() {
        let rt = runtime();
        rt.block_on(async {
            let store = InMemoryDecisionStore::new();
            for i in 1..=5 {
                store
                    .save(&decision(&format!("d{}", i), &format!("k{}", i), i, DecisionStatus::Draft))
                    .await
                    .unwrap();
            }
            let (items, total) = store
                .query(&DecisionFilter::default(), Page::new(1, 2))
                .await
                .unwrap();
            assert_eq!(total, 5);
            assert_eq!(items.len(), 2);
            // versions double as creation seconds; newest first
            assert_eq!(items[0].id, "d5");
            assert_eq!(items[1].id, "d4");
        });
    }

    #[test]
    fn test_stats_zero_for_unknown_decision() {
        let rt = runtime();
        rt.block_on(async {
            let store = InMemoryExecutionStore::new();
            let stats = store.stats("missing").await.unwrap();
            assert_eq!(stats, DecisionStatistics::default());
            assert_eq!(stats.avg_execution_time_ms, 0.0);
        });
    }
}
