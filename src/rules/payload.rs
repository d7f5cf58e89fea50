//! Wire payloads and records for the autostopping rule endpoints.
//!
//! Field names follow the vendor wire format exactly. The Kubernetes routing
//! embeds a workload custom-resource document that is serialized
//! independently and carried as a string (`RuleJson`).
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::RuleId;

pub(crate) const WORKLOAD_DOC_API_VERSION: &str = "ccm.harness.io/v1";
pub(crate) const WORKLOAD_DOC_KIND: &str = "AutoStoppingRule";
/// Annotation on the embedded document naming the cloud connector.
pub const CLOUD_CONNECTOR_ANNOTATION: &str = "harness.io/cloud-connector-id";
const DEPLOYMENT_WORKLOAD_TYPE: &str = "Deployment";

/// Rule target kind accepted by the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fulfilment {
    OnDemand,
    Spot,
    Kubernetes,
}

impl Fulfilment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Fulfilment::OnDemand => "ondemand",
            Fulfilment::Spot => "spot",
            Fulfilment::Kubernetes => "kubernetes",
        }
    }
}

impl fmt::Display for Fulfilment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("invalid fulfilment `{0}`, expected ondemand, spot or kubernetes")]
pub struct FulfilmentParseError(String);

impl FromStr for Fulfilment {
    type Err = FulfilmentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ondemand" => Ok(Fulfilment::OnDemand),
            "spot" => Ok(Fulfilment::Spot),
            "kubernetes" => Ok(Fulfilment::Kubernetes),
            other => Err(FulfilmentParseError(other.to_string())),
        }
    }
}

/// Create-rule request body. `deps` and `apply_now` are only present on
/// Kubernetes rules.
#[derive(Debug, Serialize)]
pub struct CreateRuleRequest {
    pub service: ServicePayload,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<RuleDependency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_now: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ServicePayload {
    pub name: String,
    pub account_identifier: String,
    pub fulfilment: Fulfilment,
    pub kind: String,
    pub cloud_account_id: String,
    pub idle_time_mins: u32,
    pub routing: RoutingPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opts: Option<ServiceOpts>,
    pub metadata: ServiceMetadata,
}

/// Routing section, shared between create payloads and listed records.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoutingPayload {
    #[serde(default)]
    pub ports: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<InstanceRouting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k8s: Option<K8sRouting>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRouting {
    pub filter: InstanceFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceFilter {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct K8sRouting {
    #[serde(rename = "RuleJson")]
    pub rule_json: String,
    #[serde(rename = "ConnectorID")]
    pub connector_id: String,
    #[serde(rename = "Namespace")]
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOpts {
    pub hide_progress_page: bool,
}

/// Metadata section, shared between create payloads and listed records.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceMetadata {
    #[serde(default)]
    pub cloud_provider_details: CloudProviderDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_connector_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CloudProviderDetails {
    #[serde(default)]
    pub name: String,
}

/// Dependency on another rule, used by the vendor to stagger shutdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDependency {
    pub delay_secs: u32,
    pub dep_id: RuleId,
}

/// The workload custom-resource document embedded in `RuleJson`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadRuleDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: WorkloadRuleMetadata,
    pub spec: WorkloadRuleSpec,
}

impl WorkloadRuleDocument {
    /// Builds the canonical document for a Deployment watched by a rule.
    pub fn new(
        name: &str,
        workload: &str,
        namespace: &str,
        cloud_account_id: &str,
        idle_time_mins: u32,
    ) -> Self {
        let mut annotations = BTreeMap::new();
        annotations.insert(
            CLOUD_CONNECTOR_ANNOTATION.to_string(),
            cloud_account_id.to_string(),
        );
        Self {
            api_version: WORKLOAD_DOC_API_VERSION.to_string(),
            kind: WORKLOAD_DOC_KIND.to_string(),
            metadata: WorkloadRuleMetadata {
                name: name.to_string(),
                namespace: namespace.to_string(),
                annotations,
            },
            spec: WorkloadRuleSpec {
                idle_time_mins,
                workload_name: workload.to_string(),
                workload_type: DEPLOYMENT_WORKLOAD_TYPE.to_string(),
                hide_progress_page: false,
                dependencies: Vec::new(),
            },
        }
    }

    /// The cloud connector named by the document annotations, if any.
    pub fn cloud_connector_id(&self) -> Option<&str> {
        self.metadata
            .annotations
            .get(CLOUD_CONNECTOR_ANNOTATION)
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadRuleMetadata {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadRuleSpec {
    pub idle_time_mins: u32,
    pub workload_name: String,
    pub workload_type: String,
    pub hide_progress_page: bool,
    #[serde(default)]
    pub dependencies: Vec<serde_json::Value>,
}

/// A rule as returned by the vendor. Listing records carry more fields than
/// modeled here; unknown fields are ignored.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RuleRecord {
    pub id: RuleId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fulfilment: String,
    #[serde(default)]
    pub routing: RoutingPayload,
    #[serde(default)]
    pub metadata: ServiceMetadata,
}

impl RuleRecord {
    /// Parses the embedded workload document of a Kubernetes rule. Returns
    /// `None` for non-Kubernetes rules and for undecodable documents.
    pub fn workload_document(&self) -> Option<WorkloadRuleDocument> {
        let routing = self.routing.k8s.as_ref()?;
        serde_json::from_str(&routing.rule_json).ok()
    }
}

/// Body of the paginated listing request.
#[derive(Debug, Serialize)]
pub(crate) struct ListRulesRequest {
    pub page: u32,
    pub limit: u32,
}

/// One page of the listing response envelope.
#[derive(Debug, Deserialize)]
pub struct RulesPage {
    pub pages: u32,
    #[serde(default)]
    pub records: Option<Vec<RuleRecord>>,
}
