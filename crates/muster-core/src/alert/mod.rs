pub mod fingerprint;
pub mod labels;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use fingerprint::Fingerprint;
pub use labels::LabelSet;

/// A single firing or resolved condition.
///
/// An alert without `ends_at`, or with `ends_at` in the future, is firing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    labels: LabelSet,
    #[serde(default)]
    annotations: LabelSet,
    starts_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ends_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "generatorURL", skip_serializing_if = "Option::is_none")]
    generator_url: Option<String>,
}

impl Alert {
    pub fn new(labels: LabelSet, starts_at: DateTime<Utc>) -> Self {
        Self {
            labels,
            annotations: LabelSet::new(),
            starts_at,
            ends_at: None,
            generator_url: None,
        }
    }

    pub fn with_annotations(mut self, annotations: LabelSet) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn with_ends_at(mut self, ends_at: DateTime<Utc>) -> Self {
        self.ends_at = Some(ends_at);
        self
    }

    pub fn with_generator_url(mut self, url: impl Into<String>) -> Self {
        self.generator_url = Some(url.into());
        self
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.labels.fingerprint()
    }

    pub fn is_resolved_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_some_and(|ends_at| ends_at <= now)
    }

    pub fn is_firing_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_resolved_at(now)
    }

    /// True once `wait` has fully elapsed since the alert started.
    pub fn has_waited(&self, wait: Duration, now: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(wait)
            .ok()
            .and_then(|wait| self.starts_at.checked_add_signed(wait))
            .is_some_and(|deadline| deadline < now)
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn annotations(&self) -> &LabelSet {
        &self.annotations
    }

    pub fn starts_at(&self) -> DateTime<Utc> {
        self.starts_at
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.ends_at
    }

    pub fn generator_url(&self) -> Option<&str> {
        self.generator_url.as_deref()
    }
}
