//! Rule evaluation for lineage monitoring.
//!
//! A rule pairs a condition with an action. An external scheduler calls
//! [`RuleEngine::tick`] with a fresh [`RuleContext`]; the engine fires the
//! action whenever a rule starts or stops firing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Rule severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    /// Informational, no action required.
    Info,
    /// Should be investigated.
    Warning,
    /// Requires immediate attention.
    Critical,
}

impl RuleSeverity {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSeverity::Info => "info",
            RuleSeverity::Warning => "warning",
            RuleSeverity::Critical => "critical",
        }
    }
}

/// Current state of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleState {
    /// Condition is not met.
    Inactive,
    /// Condition is met.
    Firing,
    /// Was firing, condition no longer met.
    Resolved,
}

/// What the conditions get to look at on each tick.
#[derive(Debug, Clone)]
pub struct RuleContext {
    /// Evaluation time.
    pub now: DateTime<Utc>,
    /// Age of the published snapshot, `None` if none was ever built.
    pub snapshot_age: Option<Duration>,
    /// Rows in the published snapshot.
    pub snapshot_rows: usize,
    /// Live edge count.
    pub edge_count: usize,
    /// Live catalog size.
    pub object_count: usize,
}

/// A predicate evaluated on every tick.
pub trait RuleCondition: Send + Sync {
    /// Whether the rule should be firing.
    fn evaluate(&self, ctx: &RuleContext) -> bool;

    /// Human-readable description.
    fn describe(&self) -> String;
}

/// A side effect run on state transitions.
pub trait RuleAction: Send + Sync {
    /// Handle a transition.
    fn fire(&self, event: &RuleEvent);
}

impl<F> RuleCondition for F
where
    F: Fn(&RuleContext) -> bool + Send + Sync,
{
    fn evaluate(&self, ctx: &RuleContext) -> bool {
        self(ctx)
    }

    fn describe(&self) -> String {
        "custom condition".to_string()
    }
}

/// Fires when the published snapshot is older than `threshold`, or when no
/// snapshot has been built yet.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotStale {
    pub threshold: Duration,
}

impl RuleCondition for SnapshotStale {
    fn evaluate(&self, ctx: &RuleContext) -> bool {
        match ctx.snapshot_age {
            Some(age) => age > self.threshold,
            None => true,
        }
    }

    fn describe(&self) -> String {
        format!("snapshot older than {:?}", self.threshold)
    }
}

/// Logs transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAction;

impl RuleAction for LogAction {
    fn fire(&self, event: &RuleEvent) {
        match event.state {
            RuleState::Firing => warn!(
                rule_id = %event.rule_id,
                name = %event.name,
                severity = %event.severity.as_str(),
                condition = %event.condition,
                "RULE FIRING"
            ),
            RuleState::Resolved => info!(
                rule_id = %event.rule_id,
                name = %event.name,
                "RULE RESOLVED"
            ),
            RuleState::Inactive => {}
        }
    }
}

/// A registered rule.
#[derive(Clone)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub severity: RuleSeverity,
    pub enabled: bool,
    condition: Arc<dyn RuleCondition>,
    action: Arc<dyn RuleAction>,
}

impl Rule {
    /// Create a rule that logs its transitions.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        severity: RuleSeverity,
        condition: impl RuleCondition + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            severity,
            enabled: true,
            condition: Arc::new(condition),
            action: Arc::new(LogAction),
        }
    }

    /// Replace the action.
    pub fn with_action(mut self, action: impl RuleAction + 'static) -> Self {
        self.action = Arc::new(action);
        self
    }

    /// Disable the rule.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Built-in staleness rule for the full-map snapshot.
    pub fn snapshot_staleness(threshold: Duration) -> Self {
        Self::new(
            "tributary_snapshot_stale",
            "Lineage Snapshot Stale",
            RuleSeverity::Warning,
            SnapshotStale { threshold },
        )
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("enabled", &self.enabled)
            .field("condition", &self.condition.describe())
            .finish()
    }
}

/// A state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEvent {
    pub rule_id: String,
    pub name: String,
    pub severity: RuleSeverity,
    pub state: RuleState,
    pub condition: String,
    pub at: DateTime<Utc>,
}

/// Evaluates rules and tracks their states.
#[derive(Default)]
pub struct RuleEngine {
    rules: RwLock<HashMap<String, Rule>>,
    states: RwLock<HashMap<String, RuleState>>,
}

impl RuleEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule, replacing one with the same id.
    pub async fn register(&self, rule: Rule) {
        info!(rule_id = %rule.id, name = %rule.name, "Registered rule");
        self.rules.write().await.insert(rule.id.clone(), rule);
    }

    /// Remove a rule.
    pub async fn remove(&self, rule_id: &str) {
        if self.rules.write().await.remove(rule_id).is_some() {
            self.states.write().await.remove(rule_id);
            info!(rule_id, "Removed rule");
        }
    }

    /// Current state of a rule.
    pub async fn state(&self, rule_id: &str) -> RuleState {
        self.states
            .read()
            .await
            .get(rule_id)
            .copied()
            .unwrap_or(RuleState::Inactive)
    }

    /// Evaluate every enabled rule, returning the transitions fired.
    pub async fn tick(&self, ctx: &RuleContext) -> Vec<RuleEvent> {
        let rules: Vec<Rule> = self.rules.read().await.values().cloned().collect();
        let mut states = self.states.write().await;
        let mut events = Vec::new();

        for rule in rules.iter().filter(|r| r.enabled) {
            let met = rule.condition.evaluate(ctx);
            let current = states.get(&rule.id).copied().unwrap_or(RuleState::Inactive);

            let next = match (current, met) {
                (RuleState::Inactive, true) | (RuleState::Resolved, true) => RuleState::Firing,
                (RuleState::Firing, true) => RuleState::Firing,
                (RuleState::Firing, false) => RuleState::Resolved,
                (RuleState::Resolved, false) | (RuleState::Inactive, false) => RuleState::Inactive,
            };

            if next == current {
                continue;
            }
            states.insert(rule.id.clone(), next);
            debug!(rule_id = %rule.id, from = ?current, to = ?next, "Rule transition");

            if next == RuleState::Inactive {
                continue;
            }
            let event = RuleEvent {
                rule_id: rule.id.clone(),
                name: rule.name.clone(),
                severity: rule.severity,
                state: next,
                condition: rule.condition.describe(),
                at: ctx.now,
            };
            rule.action.fire(&event);
            events.push(event);
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn ctx(age: Option<Duration>) -> RuleContext {
        RuleContext {
            now: Utc::now(),
            snapshot_age: age,
            snapshot_rows: 0,
            edge_count: 0,
            object_count: 0,
        }
    }

    #[derive(Default, Clone)]
    struct Recorder(Arc<Mutex<Vec<RuleState>>>);

    impl RuleAction for Recorder {
        fn fire(&self, event: &RuleEvent) {
            self.0.lock().unwrap().push(event.state);
        }
    }

    #[test]
    fn test_snapshot_stale_condition() {
        let cond = SnapshotStale {
            threshold: Duration::from_secs(60),
        };
        assert!(cond.evaluate(&ctx(None)));
        assert!(cond.evaluate(&ctx(Some(Duration::from_secs(61)))));
        assert!(!cond.evaluate(&ctx(Some(Duration::from_secs(10)))));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(RuleSeverity::Critical > RuleSeverity::Warning);
        assert!(RuleSeverity::Warning > RuleSeverity::Info);
    }

    #[tokio::test]
    async fn test_transitions() {
        let engine = RuleEngine::new();
        let recorder = Recorder::default();
        engine
            .register(Rule::snapshot_staleness(Duration::from_secs(60)).with_action(recorder.clone()))
            .await;
        let id = "tributary_snapshot_stale";

        let fired = engine.tick(&ctx(None)).await;
        assert_eq!(fired.len(), 1);
        assert_eq!(engine.state(id).await, RuleState::Firing);

        // Still firing, no new event
        assert!(engine.tick(&ctx(Some(Duration::from_secs(120)))).await.is_empty());

        let resolved = engine.tick(&ctx(Some(Duration::from_secs(1)))).await;
        assert_eq!(resolved[0].state, RuleState::Resolved);

        assert!(engine.tick(&ctx(Some(Duration::from_secs(1)))).await.is_empty());
        assert_eq!(engine.state(id).await, RuleState::Inactive);

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![RuleState::Firing, RuleState::Resolved]
        );
    }

    #[tokio::test]
    async fn test_closure_condition_and_disabled_rule() {
        let engine = RuleEngine::new();
        engine
            .register(Rule::new(
                "empty_graph",
                "Empty Graph",
                RuleSeverity::Info,
                |ctx: &RuleContext| ctx.edge_count == 0,
            ))
            .await;
        engine
            .register(Rule::snapshot_staleness(Duration::from_secs(1)).disabled())
            .await;

        let fired = engine.tick(&ctx(None)).await;
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].rule_id, "empty_graph");

        engine.remove("empty_graph").await;
        assert_eq!(engine.state("empty_graph").await, RuleState::Inactive);
    }
}
