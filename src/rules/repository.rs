//! Repository of autostopping rules backed by the vendor gateway.
use crate::api::client::{ApiClient, Envelope};
use crate::api::error::ApiError;
use crate::utils::retry::RetryPolicy;
use tracing::{debug, info};

use super::payload::{
    CloudProviderDetails, CreateRuleRequest, Fulfilment, InstanceFilter, InstanceRouting,
    K8sRouting, ListRulesRequest, RoutingPayload, RuleDependency, RuleRecord, RulesPage,
    ServiceMetadata, ServiceOpts, ServicePayload, WorkloadRuleDocument,
};
use super::RuleId;

/// Create endpoint; `kind` and `fulfilment` in the payload select the rule
/// flavor.
const CREATE_RULE_PATH: &str = "autostopping/v2/rules";
const LIST_RULES_PATH: &str = "autostopping/rules/list";

const INSTANCE_KIND: &str = "instance";
const K8S_KIND: &str = "k8s";

/// Page size used by the semantic lookups.
const LOOKUP_PAGE_SIZE: u32 = 10;

/// Parameters of an instance (EC2) rule.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRuleSpec {
    pub name: String,
    pub instance_id: String,
    /// `OnDemand` or `Spot`.
    pub fulfilment: Fulfilment,
    pub cloud_account_id: String,
    pub idle_time_mins: u32,
}

/// Parameters of a Kubernetes workload rule.
#[derive(Debug, Clone, PartialEq)]
pub struct KubernetesRuleSpec {
    pub name: String,
    pub workload: String,
    pub namespace: String,
    pub cloud_account_id: String,
    pub k8s_connector_id: String,
    pub idle_time_mins: u32,
    pub dependencies: Vec<RuleDependency>,
}

/// Semantic identity of a Kubernetes rule: at most one rule should exist per
/// tuple. Enforced only by lookup-before-create, so concurrent callers can
/// still produce duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadQuery {
    pub workload: String,
    pub namespace: String,
    pub cloud_account_id: String,
    pub k8s_connector_id: String,
}

/// Rule operations needed by the ensure workflow.
#[cfg_attr(test, mockall::automock)]
pub trait RuleService {
    fn create_instance_rule(&self, spec: &InstanceRuleSpec) -> Result<RuleRecord, ApiError>;
    fn create_kubernetes_rule(&self, spec: &KubernetesRuleSpec) -> Result<RuleRecord, ApiError>;
    fn find_instance_rule(&self, instance_id: &str) -> Result<Option<RuleId>, ApiError>;
    fn find_kubernetes_rule(&self, query: &WorkloadQuery) -> Result<Option<RuleId>, ApiError>;
}

pub struct RuleRepository {
    api: ApiClient,
    retry: RetryPolicy,
}

impl RuleRepository {
    pub fn new(api: ApiClient, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    /// Fetches every rule of the account: page 1 reports the total page
    /// count, the remaining pages are fetched sequentially and concatenated
    /// in page order.
    pub fn list_rules(&self, page_size: u32) -> Result<Vec<RuleRecord>, ApiError> {
        let first = self.list_page(1, page_size)?;
        let mut records = first.records.unwrap_or_default();
        for page in 2..=first.pages {
            let next = self.list_page(page, page_size)?;
            records.extend(next.records.unwrap_or_default());
        }
        debug!(rules = records.len(), "fetched autostopping rules");
        Ok(records)
    }

    fn list_page(&self, page: u32, limit: u32) -> Result<RulesPage, ApiError> {
        let request = ListRulesRequest { page, limit };
        let envelope: Envelope<RulesPage> = self.retry.run(ApiError::is_retryable, || {
            self.api.post(LIST_RULES_PATH, &[], &request)
        })?;
        Ok(envelope.response)
    }

    fn build_instance_request(&self, spec: &InstanceRuleSpec) -> CreateRuleRequest {
        CreateRuleRequest {
            service: ServicePayload {
                name: spec.name.clone(),
                account_identifier: self.api.account_id().to_string(),
                fulfilment: spec.fulfilment,
                kind: INSTANCE_KIND.to_string(),
                cloud_account_id: spec.cloud_account_id.clone(),
                idle_time_mins: spec.idle_time_mins,
                routing: RoutingPayload {
                    ports: Vec::new(),
                    instance: Some(InstanceRouting {
                        filter: InstanceFilter {
                            ids: vec![spec.instance_id.clone()],
                        },
                    }),
                    k8s: None,
                },
                opts: None,
                metadata: ServiceMetadata {
                    cloud_provider_details: CloudProviderDetails {
                        name: spec.cloud_account_id.clone(),
                    },
                    kubernetes_connector_id: None,
                },
            },
            deps: Vec::new(),
            apply_now: None,
        }
    }

    fn build_kubernetes_request(
        &self,
        spec: &KubernetesRuleSpec,
    ) -> Result<CreateRuleRequest, ApiError> {
        let document = WorkloadRuleDocument::new(
            &spec.name,
            &spec.workload,
            &spec.namespace,
            &spec.cloud_account_id,
            spec.idle_time_mins,
        );
        let rule_json = serde_json::to_string(&document)
            .map_err(|err| ApiError::Serialization(err.to_string()))?;
        Ok(CreateRuleRequest {
            service: ServicePayload {
                name: spec.name.clone(),
                account_identifier: self.api.account_id().to_string(),
                fulfilment: Fulfilment::Kubernetes,
                kind: K8S_KIND.to_string(),
                cloud_account_id: spec.cloud_account_id.clone(),
                idle_time_mins: spec.idle_time_mins,
                routing: RoutingPayload {
                    ports: Vec::new(),
                    instance: None,
                    k8s: Some(K8sRouting {
                        rule_json,
                        connector_id: spec.k8s_connector_id.clone(),
                        namespace: spec.namespace.clone(),
                    }),
                },
                opts: Some(ServiceOpts {
                    hide_progress_page: true,
                }),
                metadata: ServiceMetadata {
                    cloud_provider_details: CloudProviderDetails {
                        name: spec.cloud_account_id.clone(),
                    },
                    kubernetes_connector_id: Some(spec.k8s_connector_id.clone()),
                },
            },
            deps: spec.dependencies.clone(),
            apply_now: Some(true),
        })
    }
}

impl RuleService for RuleRepository {
    fn create_instance_rule(&self, spec: &InstanceRuleSpec) -> Result<RuleRecord, ApiError> {
        let request = self.build_instance_request(spec);
        let envelope: Envelope<RuleRecord> = self.api.post(CREATE_RULE_PATH, &[], &request)?;
        info!(rule = envelope.response.id, name = %spec.name, "created instance rule");
        Ok(envelope.response)
    }

    fn create_kubernetes_rule(&self, spec: &KubernetesRuleSpec) -> Result<RuleRecord, ApiError> {
        let request = self.build_kubernetes_request(spec)?;
        let envelope: Envelope<RuleRecord> = self.api.post(CREATE_RULE_PATH, &[], &request)?;
        info!(rule = envelope.response.id, name = %spec.name, "created kubernetes rule");
        Ok(envelope.response)
    }

    /// First rule whose instance filter contains `instance_id`, in page
    /// order. `Ok(None)` when no rule targets the instance.
    fn find_instance_rule(&self, instance_id: &str) -> Result<Option<RuleId>, ApiError> {
        let rules = self.list_rules(LOOKUP_PAGE_SIZE)?;
        Ok(rules
            .iter()
            .find(|rule| {
                rule.routing
                    .instance
                    .as_ref()
                    .is_some_and(|instance| instance.filter.ids.iter().any(|id| id == instance_id))
            })
            .map(|rule| rule.id))
    }

    /// First Kubernetes rule whose embedded document matches the query tuple,
    /// in page order. Rules with undecodable documents are skipped.
    fn find_kubernetes_rule(&self, query: &WorkloadQuery) -> Result<Option<RuleId>, ApiError> {
        let rules = self.list_rules(LOOKUP_PAGE_SIZE)?;
        for rule in rules
            .iter()
            .filter(|rule| rule.fulfilment == Fulfilment::Kubernetes.as_str())
        {
            let Some(document) = rule.workload_document() else {
                debug!(rule = rule.id, "skipping rule with undecodable workload document");
                continue;
            };
            let connector_matches = rule.metadata.kubernetes_connector_id.as_deref()
                == Some(query.k8s_connector_id.as_str());
            if document.metadata.namespace == query.namespace
                && document.spec.workload_name == query.workload
                && document.cloud_connector_id() == Some(query.cloud_account_id.as_str())
                && connector_matches
            {
                return Ok(Some(rule.id));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiCredentials;
    use crate::http::config::HttpConfig;
    use crate::http::reqwest::try_build_reqwest_client;
    use assert_matches::assert_matches;
    use http::StatusCode;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    const LIST_PATH: &str = "/gateway/lw/api/accounts/acct-1/autostopping/rules/list";
    const CREATE_PATH: &str = "/gateway/lw/api/accounts/acct-1/autostopping/v2/rules";

    fn testing_repository(server: &MockServer) -> RuleRepository {
        let client = try_build_reqwest_client(HttpConfig::default()).unwrap();
        let api = ApiClient::new(
            client,
            server.base_url().parse().unwrap(),
            ApiCredentials {
                api_key: "key".to_string(),
                account_id: "acct-1".to_string(),
            },
        );
        RuleRepository::new(api, RetryPolicy::new(1, Duration::ZERO))
    }

    fn kubernetes_record(
        id: u64,
        workload: &str,
        namespace: &str,
        cloud_account_id: &str,
        k8s_connector_id: &str,
    ) -> serde_json::Value {
        let document =
            WorkloadRuleDocument::new(workload, workload, namespace, cloud_account_id, 5);
        json!({
            "id": id,
            "name": workload,
            "fulfilment": "kubernetes",
            "routing": {"ports": [], "k8s": {
                "RuleJson": serde_json::to_string(&document).unwrap(),
                "ConnectorID": k8s_connector_id,
                "Namespace": namespace,
            }},
            "metadata": {
                "cloud_provider_details": {"name": cloud_account_id},
                "kubernetes_connector_id": k8s_connector_id,
            },
        })
    }

    fn instance_record(id: u64, instance_id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": "instance-rule",
            "fulfilment": "ondemand",
            "routing": {"ports": [], "instance": {"filter": {"ids": [instance_id]}}},
            "metadata": {"cloud_provider_details": {"name": "conn-1"}},
        })
    }

    fn mock_single_page(server: &MockServer, records: serde_json::Value) {
        server.mock(|when, then| {
            when.method(POST).path(LIST_PATH);
            then.status(200)
                .json_body(json!({"response": {"pages": 1, "records": records}}));
        });
    }

    fn matching_query() -> WorkloadQuery {
        WorkloadQuery {
            workload: "app-deploy".to_string(),
            namespace: "dev".to_string(),
            cloud_account_id: "conn-1".to_string(),
            k8s_connector_id: "clusterCostaccess".to_string(),
        }
    }

    #[test]
    fn test_list_rules_concatenates_pages_in_order() {
        let server = MockServer::start();
        let pages = [
            (1, json!([instance_record(1, "i-a"), instance_record(2, "i-b")])),
            (2, json!([instance_record(3, "i-c"), instance_record(4, "i-d")])),
            (3, json!([instance_record(5, "i-e")])),
        ];
        let mocks: Vec<_> = pages
            .iter()
            .map(|(page, records)| {
                server.mock(|when, then| {
                    when.method(POST)
                        .path(LIST_PATH)
                        .json_body(json!({"page": page, "limit": 2}));
                    then.status(200)
                        .json_body(json!({"response": {"pages": 3, "records": records}}));
                })
            })
            .collect();

        let rules = testing_repository(&server).list_rules(2).unwrap();

        let ids: Vec<RuleId> = rules.iter().map(|rule| rule.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        for mock in mocks {
            mock.assert();
        }
    }

    #[test]
    fn test_list_rules_single_page() {
        let server = MockServer::start();
        mock_single_page(&server, json!([instance_record(1, "i-a")]));

        let rules = testing_repository(&server).list_rules(10).unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_list_rules_fails_on_any_page_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path(LIST_PATH)
                .json_body(json!({"page": 1, "limit": 2}));
            then.status(200)
                .json_body(json!({"response": {"pages": 2, "records": [instance_record(1, "i-a")]}}));
        });
        server.mock(|when, then| {
            when.method(POST)
                .path(LIST_PATH)
                .json_body(json!({"page": 2, "limit": 2}));
            then.status(500).body("<html>internal error</html>");
        });

        let err = testing_repository(&server).list_rules(2).unwrap_err();
        assert_matches!(
            err,
            ApiError::UnexpectedStatus(status) => assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR)
        );
    }

    #[test]
    fn test_find_kubernetes_rule_returns_first_match() {
        let server = MockServer::start();
        mock_single_page(
            &server,
            json!([
                instance_record(1, "i-a"),
                kubernetes_record(2, "app-deploy", "dev", "conn-1", "otherCostaccess"),
                kubernetes_record(3, "app-deploy", "dev", "conn-1", "clusterCostaccess"),
                kubernetes_record(4, "app-deploy", "dev", "conn-1", "clusterCostaccess"),
            ]),
        );

        let found = testing_repository(&server)
            .find_kubernetes_rule(&matching_query())
            .unwrap();
        assert_eq!(found, Some(3));
    }

    #[test]
    fn test_find_kubernetes_rule_requires_the_full_tuple() {
        let server = MockServer::start();
        mock_single_page(
            &server,
            json!([
                kubernetes_record(2, "app-deploy", "prod", "conn-1", "clusterCostaccess"),
                kubernetes_record(3, "other-deploy", "dev", "conn-1", "clusterCostaccess"),
                kubernetes_record(4, "app-deploy", "dev", "conn-2", "clusterCostaccess"),
            ]),
        );

        let found = testing_repository(&server)
            .find_kubernetes_rule(&matching_query())
            .unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn test_find_kubernetes_rule_skips_undecodable_documents() {
        let server = MockServer::start();
        mock_single_page(
            &server,
            json!([
                {
                    "id": 2,
                    "fulfilment": "kubernetes",
                    "routing": {"k8s": {"RuleJson": "not json", "ConnectorID": "c", "Namespace": "dev"}},
                    "metadata": {"kubernetes_connector_id": "clusterCostaccess"},
                },
                kubernetes_record(3, "app-deploy", "dev", "conn-1", "clusterCostaccess"),
            ]),
        );

        let found = testing_repository(&server)
            .find_kubernetes_rule(&matching_query())
            .unwrap();
        assert_eq!(found, Some(3));
    }

    #[test]
    fn test_find_instance_rule() {
        let server = MockServer::start();
        mock_single_page(
            &server,
            json!([
                instance_record(1, "i-a"),
                instance_record(2, "i-02388d6e6d0f204f9"),
            ]),
        );

        let repository = testing_repository(&server);
        assert_eq!(
            repository.find_instance_rule("i-02388d6e6d0f204f9").unwrap(),
            Some(2)
        );
        assert_eq!(repository.find_instance_rule("i-missing").unwrap(), None);
    }

    #[test]
    fn test_create_instance_rule_sends_the_documented_payload() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(CREATE_PATH)
                .header("x-api-key", "key")
                .query_param("routingId", "acct-1")
                .query_param("accountIdentifier", "acct-1")
                .json_body(json!({
                    "service": {
                        "name": "pythontest",
                        "account_identifier": "acct-1",
                        "fulfilment": "ondemand",
                        "kind": "instance",
                        "cloud_account_id": "conn-1",
                        "idle_time_mins": 12,
                        "routing": {
                            "ports": [],
                            "instance": {"filter": {"ids": ["i-02388d6e6d0f204f9"]}},
                        },
                        "metadata": {"cloud_provider_details": {"name": "conn-1"}},
                    },
                }));
            then.status(200)
                .json_body(json!({"response": instance_record(4810, "i-02388d6e6d0f204f9")}));
        });

        let created = testing_repository(&server)
            .create_instance_rule(&InstanceRuleSpec {
                name: "pythontest".to_string(),
                instance_id: "i-02388d6e6d0f204f9".to_string(),
                fulfilment: Fulfilment::OnDemand,
                cloud_account_id: "conn-1".to_string(),
                idle_time_mins: 12,
            })
            .unwrap();

        mock.assert();
        assert_eq!(created.id, 4810);
    }

    #[test]
    fn test_create_kubernetes_rule_sends_the_documented_payload() {
        let server = MockServer::start();
        let rule_json = serde_json::to_string(&WorkloadRuleDocument::new(
            "app", "app-deploy", "dev", "conn-1", 7,
        ))
        .unwrap();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(CREATE_PATH)
                .query_param("routingId", "acct-1")
                .json_body(json!({
                    "service": {
                        "name": "app",
                        "account_identifier": "acct-1",
                        "fulfilment": "kubernetes",
                        "kind": "k8s",
                        "cloud_account_id": "conn-1",
                        "idle_time_mins": 7,
                        "routing": {
                            "ports": [],
                            "k8s": {
                                "RuleJson": rule_json,
                                "ConnectorID": "clusterCostaccess",
                                "Namespace": "dev",
                            },
                        },
                        "opts": {"hide_progress_page": true},
                        "metadata": {
                            "cloud_provider_details": {"name": "conn-1"},
                            "kubernetes_connector_id": "clusterCostaccess",
                        },
                    },
                    "deps": [{"delay_secs": 60, "dep_id": 12338}],
                    "apply_now": true,
                }));
            then.status(200).json_body(
                json!({"response": kubernetes_record(55, "app-deploy", "dev", "conn-1", "clusterCostaccess")}),
            );
        });

        let created = testing_repository(&server)
            .create_kubernetes_rule(&KubernetesRuleSpec {
                name: "app".to_string(),
                workload: "app-deploy".to_string(),
                namespace: "dev".to_string(),
                cloud_account_id: "conn-1".to_string(),
                k8s_connector_id: "clusterCostaccess".to_string(),
                idle_time_mins: 7,
                dependencies: vec![RuleDependency {
                    delay_secs: 60,
                    dep_id: 12338,
                }],
            })
            .unwrap();

        mock.assert();
        assert_eq!(created.id, 55);
    }

    #[test]
    fn test_create_rule_surfaces_the_vendor_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(CREATE_PATH);
            then.status(400)
                .json_body(json!({"errors": ["quota exceeded"]}));
        });

        let err = testing_repository(&server)
            .create_instance_rule(&InstanceRuleSpec {
                name: "pythontest".to_string(),
                instance_id: "i-a".to_string(),
                fulfilment: Fulfilment::OnDemand,
                cloud_account_id: "conn-1".to_string(),
                idle_time_mins: 5,
            })
            .unwrap_err();

        assert_matches!(err, ApiError::Api { status, messages } => {
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(messages, vec!["quota exceeded".to_string()]);
        });
    }
}
