use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use muster_app::dispatch::DispatcherConfig;
use muster_app::router::RouteTree;
use muster_core::error::DomainError;
use muster_core::route::{Route, RouteOpts};

fn default_database_url() -> String {
    "sqlite://muster.db?mode=rwc".to_string()
}

fn default_listen_address() -> String {
    "0.0.0.0:9093".to_string()
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_min_group_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_alert_buffer() -> usize {
    1024
}

/// Application configuration, read from `<config_dir>/app.yaml` and
/// `MUSTER__`-prefixed environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// SQLite URL of the event store.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Address the HTTP API binds to.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// How often empty aggregation groups are retired.
    #[serde(default = "default_cleanup_interval", with = "humantime_serde")]
    pub cleanup_interval: Duration,

    /// Lower bound applied to every route's group interval.
    #[serde(default = "default_min_group_interval", with = "humantime_serde")]
    pub min_group_interval: Duration,

    /// How many alerts the dispatcher may fall behind before it lags.
    #[serde(default = "default_alert_buffer")]
    pub alert_buffer: usize,

    /// Root of the routing tree.
    pub route: RouteConfig,
}

impl AppConfig {
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir = config_dir.unwrap_or("configs");
        let config: Self = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir)))
            .add_source(Environment::with_prefix("MUSTER").separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::Message(
                "cleanup_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            cleanup_interval: self.cleanup_interval,
            min_group_interval: self.min_group_interval,
        }
    }

    pub fn route_tree(&self) -> Result<RouteTree, DomainError> {
        Ok(RouteTree::new(self.route.build()?))
    }
}

/// A node of the configured routing tree. Unset options are inherited from the parent.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RouteConfig {
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub group_by: Option<BTreeSet<String>>,
    #[serde(default, with = "humantime_serde")]
    pub group_wait: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub group_interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub repeat_interval: Option<Duration>,
    #[serde(default, rename = "match")]
    pub matchers: BTreeMap<String, String>,
    #[serde(default, rename = "continue")]
    pub continue_matching: bool,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl RouteConfig {
    /// Builds the root route. The root must name a receiver.
    pub fn build(&self) -> Result<Route, DomainError> {
        self.build_under(&RouteOpts::new(""))
    }

    fn build_under(&self, parent: &RouteOpts) -> Result<Route, DomainError> {
        let opts = RouteOpts {
            receiver: self
                .receiver
                .clone()
                .unwrap_or_else(|| parent.receiver.clone()),
            group_by: self
                .group_by
                .clone()
                .unwrap_or_else(|| parent.group_by.clone()),
            group_wait: self.group_wait.unwrap_or(parent.group_wait),
            group_interval: self.group_interval.unwrap_or(parent.group_interval),
            repeat_interval: self.repeat_interval.unwrap_or(parent.repeat_interval),
        };

        let mut route = Route::new(opts.clone())?
            .with_matchers(self.matchers.clone().into())
            .with_continue(self.continue_matching);
        for child in &self.routes {
            route = route.with_child(child.build_under(&opts)?);
        }
        Ok(route)
    }
}
