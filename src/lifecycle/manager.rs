//! Decision lifecycle manager
//!
//! Enforces the definition invariants:
//! - `(decision_key, version, tenant_id)` is unique
//! - a published definition body is immutable; edits require a new version
//! - only a Draft may be deleted
//! - only Published may be suspended, only Suspended re-activated

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::export::{DmnExporter, ExportError, ExportOptions};
use crate::import::{convert_to_decisions, DmnParser, ImportError, ValidationOutcome};
use crate::models::{
    Aggregation, Decision, DecisionInput, DecisionOutput, DecisionStatistics, DecisionStatus,
    HitPolicy, Rule,
};
use crate::store::{
    Clock, DecisionFilter, DecisionStore, ExecutionStore, IdGenerator, Page, StoreError,
};
use crate::validation::{validate_decision, DecisionValidationResult};

/// Lifecycle failure taxonomy
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0:?}")]
    Validation(Vec<String>),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Definition body accepted by create/update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionDefinition {
    pub decision_key: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub hit_policy: HitPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
    #[serde(default)]
    pub inputs: Vec<DecisionInput>,
    #[serde(default)]
    pub outputs: Vec<DecisionOutput>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

/// Lifecycle manager, generic over its collaborators
pub struct DecisionManager<DS, ES, C, I> {
    decisions: Arc<DS>,
    executions: Arc<ES>,
    clock: Arc<C>,
    ids: Arc<I>,
}

impl<DS, ES, C, I> DecisionManager<DS, ES, C, I>
where
    DS: DecisionStore,
    ES: ExecutionStore,
    C: Clock,
    I: IdGenerator,
{
    /// Create a manager over the given collaborators
    pub fn new(decisions: Arc<DS>, executions: Arc<ES>, clock: Arc<C>, ids: Arc<I>) -> Self {
        Self {
            decisions,
            executions,
            clock,
            ids,
        }
    }

    /// Create a new Draft decision at version 1.
    ///
    /// Fails with a conflict when the key already exists for the tenant;
    /// use [`DecisionManager::create_new_version`] to add versions.
    pub async fn create(&self, definition: DecisionDefinition) -> Result<Decision, LifecycleError> {
        if definition.decision_key.trim().is_empty() {
            return Err(LifecycleError::InvalidState(
                "decisionKey must not be empty".to_string(),
            ));
        }
        let existing = self
            .decisions
            .find_by_key(
                &definition.decision_key,
                definition.tenant_id.as_deref(),
                None,
            )
            .await?;
        if let Some(existing) = existing {
            return Err(LifecycleError::Conflict(format!(
                "decision key '{}' already exists at version {}",
                existing.decision_key, existing.version
            )));
        }

        let now = self.clock.now();
        let mut decision = Decision::new(
            self.ids.next_id(),
            definition.decision_key.clone(),
            definition.name.clone(),
            now,
        );
        apply_definition(&mut decision, definition, false);
        decision.touch_rule_count();
        self.decisions.save(&decision).await?;
        info!(
            decision_key = decision.decision_key.as_str(),
            id = decision.id.as_str(),
            "created decision draft"
        );
        Ok(decision)
    }

    /// Update a Draft's definition body
    pub async fn update(
        &self,
        id: &str,
        definition: DecisionDefinition,
    ) -> Result<Decision, LifecycleError> {
        let mut decision = self.get(id).await?;
        if !decision.is_editable() {
            return Err(LifecycleError::InvalidState(format!(
                "decision '{}' is {}; only a DRAFT may be edited",
                id, decision.status
            )));
        }
        apply_definition(&mut decision, definition, true);
        decision.touch_rule_count();
        decision.update_time = self.clock.now();
        self.decisions.save(&decision).await?;
        Ok(decision)
    }

    /// Fetch by id
    pub async fn get(&self, id: &str) -> Result<Decision, LifecycleError> {
        self.decisions
            .find_by_id(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("decision '{}' not found", id)))
    }

    /// Validate a stored decision
    pub async fn validate(&self, id: &str) -> Result<DecisionValidationResult, LifecycleError> {
        let decision = self.get(id).await?;
        Ok(validate_decision(&decision))
    }

    /// Publish a Draft, making it executable.
    ///
    /// Validation is a prerequisite: any validation error blocks the
    /// publish.
    pub async fn publish(&self, id: &str) -> Result<Decision, LifecycleError> {
        let mut decision = self.get(id).await?;
        if decision.status != DecisionStatus::Draft {
            return Err(LifecycleError::InvalidState(format!(
                "decision '{}' is {}; only a DRAFT may be published",
                id, decision.status
            )));
        }
        let validation = validate_decision(&decision);
        if !validation.valid {
            return Err(LifecycleError::Validation(validation.errors));
        }
        let now = self.clock.now();
        decision.status = DecisionStatus::Published;
        decision.publish_time = Some(now);
        decision.update_time = now;
        self.decisions.save(&decision).await?;
        info!(
            decision_key = decision.decision_key.as_str(),
            version = decision.version,
            "published decision"
        );
        Ok(decision)
    }

    /// Temporarily block execution of a Published decision
    pub async fn suspend(&self, id: &str) -> Result<Decision, LifecycleError> {
        let mut decision = self.get(id).await?;
        if decision.status != DecisionStatus::Published {
            return Err(LifecycleError::InvalidState(format!(
                "decision '{}' is {}; only PUBLISHED may be suspended",
                id, decision.status
            )));
        }
        decision.status = DecisionStatus::Suspended;
        decision.update_time = self.clock.now();
        self.decisions.save(&decision).await?;
        Ok(decision)
    }

    /// Re-publish a Suspended decision; the original publish time is kept
    pub async fn activate(&self, id: &str) -> Result<Decision, LifecycleError> {
        let mut decision = self.get(id).await?;
        if decision.status != DecisionStatus::Suspended {
            return Err(LifecycleError::InvalidState(format!(
                "decision '{}' is {}; only SUSPENDED may be activated",
                id, decision.status
            )));
        }
        decision.status = DecisionStatus::Published;
        decision.update_time = self.clock.now();
        self.decisions.save(&decision).await?;
        Ok(decision)
    }

    /// Copy an existing decision into a new Draft at `max(version) + 1`,
    /// leaving prior versions intact
    pub async fn create_new_version(&self, id: &str) -> Result<Decision, LifecycleError> {
        let source = self.get(id).await?;
        let highest = self
            .decisions
            .find_by_key(&source.decision_key, source.tenant_id.as_deref(), None)
            .await?
            .map(|d| d.version)
            .unwrap_or(source.version);

        let now = self.clock.now();
        let mut next = source.clone();
        next.id = self.ids.next_id();
        next.version = highest + 1;
        next.status = DecisionStatus::Draft;
        next.publish_time = None;
        next.create_time = now;
        next.update_time = now;
        self.decisions.save(&next).await?;
        info!(
            decision_key = next.decision_key.as_str(),
            version = next.version,
            "created new decision version"
        );
        Ok(next)
    }

    /// Delete a Draft
    pub async fn delete(&self, id: &str) -> Result<(), LifecycleError> {
        let decision = self.get(id).await?;
        if decision.status != DecisionStatus::Draft {
            return Err(LifecycleError::InvalidState(format!(
                "decision '{}' is {}; only a DRAFT may be deleted",
                id, decision.status
            )));
        }
        self.decisions.delete(id).await?;
        Ok(())
    }

    /// Filtered, paginated listing ordered by creation time descending
    pub async fn query(
        &self,
        filter: DecisionFilter,
        page: Page,
    ) -> Result<(Vec<Decision>, u64), LifecycleError> {
        Ok(self.decisions.query(&filter, page).await?)
    }

    /// Aggregated execution statistics; zeroed when nothing has run yet
    pub async fn get_statistics(&self, id: &str) -> Result<DecisionStatistics, LifecycleError> {
        let decision = self.get(id).await?;
        Ok(self.executions.stats(&decision.id).await?)
    }

    /// Parse DMN XML and persist each contained decision table as a Draft.
    ///
    /// Keys already present for the tenant get the next free version
    /// instead of a conflict.
    pub async fn import_xml(
        &self,
        xml: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<Decision>, LifecycleError> {
        let converted = convert_to_decisions(xml, tenant_id)?;
        let mut saved = Vec::with_capacity(converted.len());
        for mut decision in converted {
            let now = self.clock.now();
            let existing = self
                .decisions
                .find_by_key(&decision.decision_key, tenant_id, None)
                .await?;
            decision.version = existing.map(|d| d.version + 1).unwrap_or(1);
            decision.id = self.ids.next_id();
            decision.create_time = now;
            decision.update_time = now;
            self.decisions.save(&decision).await?;
            saved.push(decision);
        }
        Ok(saved)
    }

    /// Check DMN XML without persisting anything
    pub fn validate_xml(&self, xml: &str) -> ValidationOutcome {
        DmnParser::new().validate(xml)
    }

    /// Render a stored decision as DMN XML
    pub async fn export_xml(
        &self,
        id: &str,
        options: &ExportOptions,
    ) -> Result<String, LifecycleError> {
        let decision = self.get(id).await?;
        Ok(DmnExporter::new().export(&decision, options)?)
    }
}

/// Copy a definition body onto a decision. Identity fields (key, tenant)
/// are only written on create.
fn apply_definition(decision: &mut Decision, definition: DecisionDefinition, update_only: bool) {
    if !update_only {
        decision.tenant_id = definition.tenant_id;
    }
    decision.name = definition.name;
    decision.description = definition.description;
    decision.hit_policy = definition.hit_policy;
    decision.aggregation = definition.aggregation;
    decision.inputs = definition.inputs;
    decision.outputs = definition.outputs;
    decision.rules = definition.rules;
    decision.category = definition.category;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Condition, RuleOutput};
    use crate::store::{FixedClock, InMemoryDecisionStore, InMemoryExecutionStore, SequentialIdGenerator};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    type TestManager = DecisionManager<
        InMemoryDecisionStore,
        InMemoryExecutionStore,
        FixedClock,
        SequentialIdGenerator,
    >;

    fn manager() -> TestManager {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
        DecisionManager::new(
            Arc::new(InMemoryDecisionStore::new()),
            Arc::new(InMemoryExecutionStore::new()),
            Arc::new(clock),
            Arc::new(SequentialIdGenerator::new("dec")),
        )
    }

    fn grading_definition() -> DecisionDefinition {
        DecisionDefinition {
            decision_key: "grading".to_string(),
            name: "Age Grading".to_string(),
            hit_policy: HitPolicy::First,
            inputs: vec![DecisionInput::new("age", "Age", "age").with_type("number")],
            outputs: vec![DecisionOutput::new("level", "Level", "level").with_type("string")],
            rules: vec![
                Rule::new("rule_0")
                    .add_condition(Condition::new("age", ">=", json!(18)))
                    .add_output(RuleOutput::new("level", json!("adult"))),
            ],
            ..Default::default()
        }
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_create_then_duplicate_key_conflicts() {
        let rt = runtime();
        rt.block_on(async {
            let manager = manager();
            let created = manager.create(grading_definition()).await.unwrap();
            assert_eq!(created.version, 1);
            assert_eq!(created.status, DecisionStatus::Draft);
            assert_eq!(created.rule_count, 1);

            let err = manager.create(grading_definition()).await.unwrap_err();
            assert!(matches!(err, LifecycleError::Conflict(_)));
        });
    }

    #[test]
    fn test_publish_requires_valid_definition() {
        let rt = runtime();
        rt.block_on(async {
            let manager = manager();
            let mut definition = grading_definition();
            definition.outputs.clear();
            let created = manager.create(definition).await.unwrap();
            let err = manager.publish(&created.id).await.unwrap_err();
            assert!(matches!(err, LifecycleError::Validation(_)));
        });
    }

    #[test]
    fn test_state_machine_transitions() {
        let rt = runtime();
        rt.block_on(async {
            let manager = manager();
            let created = manager.create(grading_definition()).await.unwrap();

            // suspend before publish is rejected
            assert!(matches!(
                manager.suspend(&created.id).await.unwrap_err(),
                LifecycleError::InvalidState(_)
            ));

            let published = manager.publish(&created.id).await.unwrap();
            assert_eq!(published.status, DecisionStatus::Published);
            assert!(published.publish_time.is_some());

            // double publish is rejected
            assert!(matches!(
                manager.publish(&created.id).await.unwrap_err(),
                LifecycleError::InvalidState(_)
            ));
            // editing a published decision is rejected
            assert!(matches!(
                manager.update(&created.id, grading_definition()).await.unwrap_err(),
                LifecycleError::InvalidState(_)
            ));
            // deleting a published decision is rejected
            assert!(matches!(
                manager.delete(&created.id).await.unwrap_err(),
                LifecycleError::InvalidState(_)
            ));
            // activate requires suspended
            assert!(matches!(
                manager.activate(&created.id).await.unwrap_err(),
                LifecycleError::InvalidState(_)
            ));

            let suspended = manager.suspend(&created.id).await.unwrap();
            assert_eq!(suspended.status, DecisionStatus::Suspended);

            let reactivated = manager.activate(&created.id).await.unwrap();
            assert_eq!(reactivated.status, DecisionStatus::Published);
            // original publish time is preserved
            assert_eq!(reactivated.publish_time, published.publish_time);
        });
    }

    #[test]
    fn test_versioning_leaves_prior_versions_intact() {
        let rt = runtime();
        rt.block_on(async {
            let manager = manager();
            let v1 = manager.create(grading_definition()).await.unwrap();
            manager.publish(&v1.id).await.unwrap();

            let v2 = manager.create_new_version(&v1.id).await.unwrap();
            assert_eq!(v2.version, 2);
            assert_eq!(v2.status, DecisionStatus::Draft);
            assert!(v2.publish_time.is_none());
            assert_ne!(v2.id, v1.id);

            // prior version still published
            let original = manager.get(&v1.id).await.unwrap();
            assert_eq!(original.status, DecisionStatus::Published);

            let v3 = manager.create_new_version(&v1.id).await.unwrap();
            assert_eq!(v3.version, 3);
        });
    }

    #[test]
    fn test_delete_draft_only() {
        let rt = runtime();
        rt.block_on(async {
            let manager = manager();
            let created = manager.create(grading_definition()).await.unwrap();
            manager.delete(&created.id).await.unwrap();
            assert!(matches!(
                manager.get(&created.id).await.unwrap_err(),
                LifecycleError::NotFound(_)
            ));
        });
    }

    #[test]
    fn test_query_pagination_defaults() {
        let rt = runtime();
        rt.block_on(async {
            let manager = manager();
            manager.create(grading_definition()).await.unwrap();
            let (items, total) = manager
                .query(DecisionFilter::default(), Page::default())
                .await
                .unwrap();
            assert_eq!(total, 1);
            assert_eq!(items.len(), 1);
        });
    }

    #[test]
    fn test_statistics_for_fresh_decision_are_zero() {
        let rt = runtime();
        rt.block_on(async {
            let manager = manager();
            let created = manager.create(grading_definition()).await.unwrap();
            let stats = manager.get_statistics(&created.id).await.unwrap();
            assert_eq!(stats.total_executions, 0);
            assert_eq!(stats.avg_execution_time_ms, 0.0);
        });
    }
}
