//! Idempotent ensure workflow: look up a rule by its semantic key, create it
//! when missing, then attach an uptime schedule unless one exists already.
//!
//! The sequence is fixed. A failure aborts at the failing step; a rule
//! created before a failing schedule step is not rolled back.
use crate::api::error::ApiError;
use crate::rules::payload::RuleRecord;
use crate::rules::repository::{InstanceRuleSpec, KubernetesRuleSpec, RuleService, WorkloadQuery};
use crate::rules::RuleId;
use crate::schedules::client::{ScheduleService, ScheduleSpec};
use crate::schedules::payload::TimeOfDay;
use crate::schedules::ScheduleId;
use tracing::{debug, info};

/// How the rule id was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleDisposition {
    /// An existing rule matched the semantic key.
    Reused(RuleId),
    /// No rule matched; one was created.
    Created(RuleId),
}

impl RuleDisposition {
    pub fn rule_id(&self) -> RuleId {
        match self {
            RuleDisposition::Reused(id) | RuleDisposition::Created(id) => *id,
        }
    }
}

/// What happened to the schedule of the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDisposition {
    AlreadyAttached,
    Created(ScheduleId),
}

/// Structured result of one ensure invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsureOutcome {
    pub rule: RuleDisposition,
    pub schedule: ScheduleDisposition,
}

/// Caller-supplied uptime window, attached to a rule that has no schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleWindow {
    /// Weekday numbers, 0=Sunday..6=Saturday.
    pub days: Vec<u8>,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub timezone: String,
}

pub struct EnsureWorkflow<R, S> {
    rules: R,
    schedules: S,
}

impl<R, S> EnsureWorkflow<R, S>
where
    R: RuleService,
    S: ScheduleService,
{
    pub fn new(rules: R, schedules: S) -> Self {
        Self { rules, schedules }
    }

    /// Ensures a rule and schedule exist for an EC2 instance.
    pub fn ensure_instance_rule(
        &self,
        spec: InstanceRuleSpec,
        window: ScheduleWindow,
    ) -> Result<EnsureOutcome, ApiError> {
        let rule = match self.rules.find_instance_rule(&spec.instance_id)? {
            Some(id) => {
                info!(rule = id, instance = %spec.instance_id, "rule already exists");
                RuleDisposition::Reused(id)
            }
            None => {
                let created = self.rules.create_instance_rule(&spec)?;
                RuleDisposition::Created(created.id)
            }
        };
        let schedule = self.ensure_schedule(&spec.cloud_account_id, rule.rule_id(), &window)?;
        Ok(EnsureOutcome { rule, schedule })
    }

    /// Ensures a rule and schedule exist for a Kubernetes workload.
    pub fn ensure_kubernetes_rule(
        &self,
        spec: KubernetesRuleSpec,
        window: ScheduleWindow,
    ) -> Result<EnsureOutcome, ApiError> {
        let query = WorkloadQuery {
            workload: spec.workload.clone(),
            namespace: spec.namespace.clone(),
            cloud_account_id: spec.cloud_account_id.clone(),
            k8s_connector_id: spec.k8s_connector_id.clone(),
        };
        let rule = match self.rules.find_kubernetes_rule(&query)? {
            Some(id) => {
                info!(rule = id, workload = %spec.workload, "rule already exists");
                RuleDisposition::Reused(id)
            }
            None => {
                let created: RuleRecord = self.rules.create_kubernetes_rule(&spec)?;
                RuleDisposition::Created(created.id)
            }
        };
        let schedule = self.ensure_schedule(&spec.cloud_account_id, rule.rule_id(), &window)?;
        Ok(EnsureOutcome { rule, schedule })
    }

    fn ensure_schedule(
        &self,
        cloud_account_id: &str,
        rule_id: RuleId,
        window: &ScheduleWindow,
    ) -> Result<ScheduleDisposition, ApiError> {
        let existing = self.schedules.get_schedules(rule_id)?;
        if !existing.is_empty() {
            debug!(rule = rule_id, "schedule already attached");
            return Ok(ScheduleDisposition::AlreadyAttached);
        }
        let spec = ScheduleSpec {
            cloud_account_id: cloud_account_id.to_string(),
            rule_id,
            days: window.days.clone(),
            start: window.start,
            end: window.end,
            timezone: window.timezone.clone(),
        };
        let created = self.schedules.create_schedule(&spec)?;
        Ok(ScheduleDisposition::Created(created.id))
    }
}
