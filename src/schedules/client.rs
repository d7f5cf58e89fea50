//! Client for the uptime schedule endpoints.
use crate::api::client::{ApiClient, Envelope};
use crate::api::error::ApiError;
use crate::rules::RuleId;
use crate::utils::retry::RetryPolicy;
use tracing::info;

use super::payload::{
    CreateScheduleRequest, ScheduleDetails, SchedulePayload, ScheduleRecord, ScheduleResource,
    TimeOfDay, UptimeDays, UptimeWindow, AUTOSTOP_RULE_RESOURCE_TYPE,
};

const SCHEDULES_PATH: &str = "schedules";

/// Timezone used when the caller does not provide one.
pub const DEFAULT_TIMEZONE: &str = "America/Chicago";

/// Parameters of an uptime schedule bound to a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSpec {
    pub cloud_account_id: String,
    pub rule_id: RuleId,
    /// Weekday numbers the window applies to, 0=Sunday..6=Saturday.
    pub days: Vec<u8>,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub timezone: String,
}

/// Schedule operations needed by the ensure workflow.
#[cfg_attr(test, mockall::automock)]
pub trait ScheduleService {
    fn create_schedule(&self, spec: &ScheduleSpec) -> Result<ScheduleRecord, ApiError>;
    fn get_schedules(&self, rule_id: RuleId) -> Result<Vec<ScheduleRecord>, ApiError>;
}

pub struct ScheduleClient {
    api: ApiClient,
    retry: RetryPolicy,
}

impl ScheduleClient {
    pub fn new(api: ApiClient, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }
}

impl ScheduleService for ScheduleClient {
    /// Creates a single-window uptime schedule referencing the rule. The
    /// schedule name is derived from the rule id.
    fn create_schedule(&self, spec: &ScheduleSpec) -> Result<ScheduleRecord, ApiError> {
        let request = CreateScheduleRequest {
            schedule: SchedulePayload {
                name: format!("{}-schedule", spec.rule_id),
                account_id: self.api.account_id().to_string(),
                description: String::new(),
                resources: vec![ScheduleResource {
                    id: spec.rule_id.to_string(),
                    resource_type: AUTOSTOP_RULE_RESOURCE_TYPE.to_string(),
                }],
                details: ScheduleDetails {
                    timezone: spec.timezone.clone(),
                    uptime: UptimeWindow {
                        days: UptimeDays {
                            days: spec.days.clone(),
                            all_day: false,
                            start_time: spec.start,
                            end_time: spec.end,
                        },
                    },
                },
            },
        };
        let params = [("cloud_account_id", spec.cloud_account_id.clone())];
        let envelope: Envelope<ScheduleRecord> =
            self.api.post(SCHEDULES_PATH, &params, &request)?;
        info!(
            rule = spec.rule_id,
            schedule = envelope.response.id,
            "created uptime schedule"
        );
        Ok(envelope.response)
    }

    /// Fetches the schedules bound to a rule. An empty list means none is
    /// attached; it is not an error.
    fn get_schedules(&self, rule_id: RuleId) -> Result<Vec<ScheduleRecord>, ApiError> {
        let params = [
            ("res_id", rule_id.to_string()),
            ("res_type", AUTOSTOP_RULE_RESOURCE_TYPE.to_string()),
        ];
        let envelope: Envelope<Option<Vec<ScheduleRecord>>> = self
            .retry
            .run(ApiError::is_retryable, || {
                self.api.get(SCHEDULES_PATH, &params)
            })?;
        Ok(envelope.response.unwrap_or_default())
    }
}
