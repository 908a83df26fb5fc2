use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alert::{Fingerprint, LabelSet};
use crate::error::DomainError;
use crate::ids::RouteId;

/// Grouping and timing options shared by every aggregation group of a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteOpts {
    pub receiver: String,
    #[serde(default)]
    pub group_by: BTreeSet<String>,
    /// Initial wait before the first notification of a new group.
    #[serde(with = "humantime_serde")]
    pub group_wait: Duration,
    /// Interval between notifications of a live group.
    #[serde(with = "humantime_serde")]
    pub group_interval: Duration,
    /// Minimum time before an unchanged group is notified again.
    #[serde(with = "humantime_serde")]
    pub repeat_interval: Duration,
}

impl RouteOpts {
    pub const DEFAULT_GROUP_WAIT: Duration = Duration::from_secs(30);
    pub const DEFAULT_GROUP_INTERVAL: Duration = Duration::from_secs(5 * 60);
    pub const DEFAULT_REPEAT_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);

    pub fn new(receiver: impl Into<String>) -> Self {
        Self {
            receiver: receiver.into(),
            group_by: BTreeSet::new(),
            group_wait: Self::DEFAULT_GROUP_WAIT,
            group_interval: Self::DEFAULT_GROUP_INTERVAL,
            repeat_interval: Self::DEFAULT_REPEAT_INTERVAL,
        }
    }
}

/// A node of the routing tree.
#[derive(Debug)]
pub struct Route {
    id: RouteId,
    matchers: LabelSet,
    continue_matching: bool,
    opts: RouteOpts,
    routes: Vec<Arc<Route>>,
}

impl Route {
    pub fn new(opts: RouteOpts) -> Result<Self, DomainError> {
        if opts.receiver.is_empty() {
            return Err(DomainError::RouteRequiresReceiver);
        }
        Ok(Self {
            id: RouteId::new(),
            matchers: LabelSet::new(),
            continue_matching: false,
            opts,
            routes: Vec::new(),
        })
    }

    pub fn with_matchers(mut self, matchers: LabelSet) -> Self {
        self.matchers = matchers;
        self
    }

    /// Lets later siblings match as well once this route matched.
    pub fn with_continue(mut self, continue_matching: bool) -> Self {
        self.continue_matching = continue_matching;
        self
    }

    pub fn with_child(mut self, child: Route) -> Self {
        self.routes.push(Arc::new(child));
        self
    }

    /// All matchers must be present with equal values; no matchers matches everything.
    pub fn matches(&self, labels: &LabelSet) -> bool {
        self.matchers
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v.as_str()))
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.id)
    }

    pub fn id(&self) -> &RouteId {
        &self.id
    }

    pub fn matchers(&self) -> &LabelSet {
        &self.matchers
    }

    pub fn continue_matching(&self) -> bool {
        self.continue_matching
    }

    pub fn opts(&self) -> &RouteOpts {
        &self.opts
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }
}
