//! Command line interface: ensure workflows and rule listing.
use crate::api::client::ApiClient;
use crate::api::error::ApiError;
use crate::config::{ApiConfig, ApiCredentials, AutostopConfig, ConfigError};
use crate::http::config::HttpConfig;
use crate::http::reqwest::{try_build_reqwest_client, HttpBuildError};
use crate::logging::LoggingError;
use crate::rules::payload::{Fulfilment, RuleDependency};
use crate::rules::repository::{InstanceRuleSpec, KubernetesRuleSpec};
use crate::rules::{RuleId, RuleRepository};
use crate::schedules::client::DEFAULT_TIMEZONE;
use crate::schedules::payload::TimeOfDay;
use crate::schedules::ScheduleClient;
use crate::utils::retry::RetryPolicy;
use crate::workflow::{EnsureOutcome, EnsureWorkflow, RuleDisposition, ScheduleDisposition, ScheduleWindow};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("could not load configuration: `{0}`")]
    Config(#[from] ConfigError),

    #[error("could not initialize logging: `{0}`")]
    LoggingInit(#[from] LoggingError),

    #[error("could not build the http client: `{0}`")]
    HttpClient(#[from] HttpBuildError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)] // Read from `Cargo.toml`
pub struct Cli {
    /// Path to the YAML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ensure an autostopping rule and uptime schedule for an EC2 instance.
    EnsureInstance {
        /// Rule name shown in the vendor console.
        #[arg(long)]
        name: String,

        #[arg(long)]
        instance_id: String,

        /// `ondemand` or `spot`.
        #[arg(long, default_value = "ondemand")]
        fulfilment: Fulfilment,

        /// Cloud connector id of the account owning the instance.
        #[arg(long)]
        cloud_account_id: String,

        /// Minutes of inactivity before shutdown.
        #[arg(long, default_value_t = 5)]
        idle_time_mins: u32,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// Ensure an autostopping rule and uptime schedule for a Kubernetes
    /// workload.
    EnsureWorkload {
        /// Rule name; derived from the workload name when omitted.
        #[arg(long)]
        name: Option<String>,

        /// Deployment name to watch.
        #[arg(long)]
        workload: String,

        #[arg(long)]
        namespace: String,

        /// Cloud connector id of the account owning the cluster.
        #[arg(long)]
        cloud_account_id: String,

        /// Kubernetes connector id of the cluster.
        #[arg(long)]
        k8s_connector_id: String,

        /// Minutes of inactivity before shutdown.
        #[arg(long, default_value_t = 5)]
        idle_time_mins: u32,

        /// Dependency rules as `RULE_ID:DELAY_SECONDS`, repeatable.
        #[arg(long = "dependency", value_parser = parse_dependency)]
        dependencies: Vec<RuleDependency>,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// List the autostopping rules of the account.
    ListRules {
        #[arg(long, default_value_t = 10)]
        page_size: u32,
    },
}

/// Uptime window shared by both ensure commands.
#[derive(Args, Debug)]
struct WindowArgs {
    /// Weekdays the uptime window applies to, 0=Sunday..6=Saturday.
    #[arg(long, value_delimiter = ',', default_value = "1,2,3,4,5", value_parser = clap::value_parser!(u8).range(0..=6))]
    days: Vec<u8>,

    /// Uptime window start, 24h `HH:MM`.
    #[arg(long, default_value = "08:00")]
    start: TimeOfDay,

    /// Uptime window end, 24h `HH:MM`.
    #[arg(long, default_value = "17:00")]
    end: TimeOfDay,

    #[arg(long, default_value = DEFAULT_TIMEZONE)]
    timezone: String,
}

impl From<WindowArgs> for ScheduleWindow {
    fn from(args: WindowArgs) -> Self {
        Self {
            days: args.days,
            start: args.start,
            end: args.end,
            timezone: args.timezone,
        }
    }
}

fn parse_dependency(value: &str) -> Result<RuleDependency, String> {
    let (rule_id, delay) = value
        .split_once(':')
        .ok_or_else(|| format!("invalid dependency `{value}`, expected `RULE_ID:DELAY_SECONDS`"))?;
    let dep_id = rule_id
        .parse()
        .map_err(|_| format!("invalid rule id in dependency `{value}`"))?;
    let delay_secs = delay
        .parse()
        .map_err(|_| format!("invalid delay in dependency `{value}`"))?;
    Ok(RuleDependency { delay_secs, dep_id })
}

impl Cli {
    pub fn run(self) -> Result<(), CliError> {
        let config = match &self.config {
            Some(path) => AutostopConfig::from_file(path)?,
            None => AutostopConfig::default(),
        };
        config.log.try_init()?;

        let credentials = ApiCredentials::from_env()?;
        let api = build_api_client(&config.api, credentials)?;
        let retry = RetryPolicy::new(config.api.retry_attempts, config.api.retry_interval);

        match self.command {
            Command::EnsureInstance {
                name,
                instance_id,
                fulfilment,
                cloud_account_id,
                idle_time_mins,
                window,
            } => {
                let account_id = api.account_id().to_string();
                let workflow = EnsureWorkflow::new(
                    RuleRepository::new(api.clone(), retry),
                    ScheduleClient::new(api, retry),
                );
                let outcome = workflow.ensure_instance_rule(
                    InstanceRuleSpec {
                        name,
                        instance_id,
                        fulfilment,
                        cloud_account_id,
                        idle_time_mins,
                    },
                    window.into(),
                )?;
                report_outcome(&outcome, &config.api.base_url, &account_id);
            }
            Command::EnsureWorkload {
                name,
                workload,
                namespace,
                cloud_account_id,
                k8s_connector_id,
                idle_time_mins,
                dependencies,
                window,
            } => {
                let name = name.unwrap_or_else(|| derived_rule_name(&workload));
                let account_id = api.account_id().to_string();
                let workflow = EnsureWorkflow::new(
                    RuleRepository::new(api.clone(), retry),
                    ScheduleClient::new(api, retry),
                );
                let outcome = workflow.ensure_kubernetes_rule(
                    KubernetesRuleSpec {
                        name,
                        workload,
                        namespace,
                        cloud_account_id,
                        k8s_connector_id,
                        idle_time_mins,
                        dependencies,
                    },
                    window.into(),
                )?;
                report_outcome(&outcome, &config.api.base_url, &account_id);
            }
            Command::ListRules { page_size } => {
                let repository = RuleRepository::new(api, retry);
                for rule in repository.list_rules(page_size)? {
                    println!("{}\t{}\t{}", rule.id, rule.fulfilment, rule.name);
                }
            }
        }
        Ok(())
    }
}

fn build_api_client(config: &ApiConfig, credentials: ApiCredentials) -> Result<ApiClient, CliError> {
    let mut http_config = HttpConfig::new(config.timeout, config.conn_timeout);
    if let Some(proxy_url) = &config.proxy_url {
        http_config = http_config.with_proxy(proxy_url.clone());
    }
    let client = try_build_reqwest_client(http_config)?;
    Ok(ApiClient::new(client, config.base_url.clone(), credentials))
}

/// Default rule name for a workload, its first dash-separated segment.
fn derived_rule_name(workload: &str) -> String {
    workload.split('-').next().unwrap_or(workload).to_string()
}

fn report_outcome(outcome: &EnsureOutcome, base_url: &Url, account_id: &str) {
    match outcome.rule {
        RuleDisposition::Created(id) => println!("rule {id} created"),
        RuleDisposition::Reused(id) => println!("rule {id} already exists"),
    }
    match outcome.schedule {
        ScheduleDisposition::Created(id) => println!("schedule {id} attached"),
        ScheduleDisposition::AlreadyAttached => println!("schedule already attached"),
    }
    println!(
        "{}",
        rule_console_url(base_url, account_id, outcome.rule.rule_id())
    );
}

/// Link to the rule in the vendor console.
pub fn rule_console_url(base_url: &Url, account_id: &str, rule_id: RuleId) -> String {
    format!(
        "{}/ng/#/account/{}/ce/autostopping-rules/rule/{}",
        base_url.as_str().trim_end_matches('/'),
        account_id,
        rule_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dependency() {
        assert_eq!(
            parse_dependency("12338:60").unwrap(),
            RuleDependency {
                delay_secs: 60,
                dep_id: 12338
            }
        );
        assert!(parse_dependency("12338").is_err());
        assert!(parse_dependency("a:b").is_err());
    }

    #[test]
    fn test_derived_rule_name_takes_the_first_segment() {
        assert_eq!(derived_rule_name("gbezmdjxlvrcvdnrjxdk-app"), "gbezmdjxlvrcvdnrjxdk");
        assert_eq!(derived_rule_name("plain"), "plain");
    }

    #[test]
    fn test_rule_console_url() {
        let url = rule_console_url(
            &"https://app.harness.io".parse().unwrap(),
            "acct-1",
            4810,
        );
        assert_eq!(
            url,
            "https://app.harness.io/ng/#/account/acct-1/ce/autostopping-rules/rule/4810"
        );
    }

    #[test]
    fn test_cli_parses_the_ensure_workload_command() {
        let cli = Cli::try_parse_from([
            "autostop-control",
            "ensure-workload",
            "--workload",
            "app-deploy",
            "--namespace",
            "dev",
            "--cloud-account-id",
            "conn-1",
            "--k8s-connector-id",
            "clusterCostaccess",
            "--dependency",
            "12338:60",
            "--days",
            "0,6",
            "--start",
            "8:01",
            "--end",
            "17:05",
        ])
        .unwrap();

        let Command::EnsureWorkload {
            name,
            workload,
            dependencies,
            window,
            ..
        } = cli.command
        else {
            panic!("unexpected command parsed");
        };
        assert_eq!(name, None);
        assert_eq!(workload, "app-deploy");
        assert_eq!(
            dependencies,
            vec![RuleDependency {
                delay_secs: 60,
                dep_id: 12338
            }]
        );
        assert_eq!(window.days, vec![0, 6]);
        assert_eq!(window.start, TimeOfDay { hour: 8, minute: 1 });
        assert_eq!(window.end, TimeOfDay { hour: 17, minute: 5 });
        assert_eq!(window.timezone, DEFAULT_TIMEZONE);
    }

    #[test]
    fn test_cli_rejects_out_of_range_days() {
        let result = Cli::try_parse_from([
            "autostop-control",
            "ensure-instance",
            "--name",
            "pythontest",
            "--instance-id",
            "i-1",
            "--cloud-account-id",
            "conn-1",
            "--days",
            "7",
        ]);
        assert!(result.is_err());
    }
}
