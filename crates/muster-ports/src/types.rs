use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use muster_core::alert::{Alert, Fingerprint, LabelSet};

/// Raw alert data as posted by an alert source, before defaults are applied.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAlert {
    pub labels: LabelSet,
    #[serde(default)]
    pub annotations: LabelSet,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "generatorURL")]
    pub generator_url: Option<String>,
}

impl RawAlert {
    /// Builds the domain alert, starting it at `now` when no start was given.
    pub fn into_alert(self, now: DateTime<Utc>) -> Alert {
        let mut alert =
            Alert::new(self.labels, self.starts_at.unwrap_or(now)).with_annotations(self.annotations);
        if let Some(ends_at) = self.ends_at {
            alert = alert.with_ends_at(ends_at);
        }
        if let Some(url) = self.generator_url {
            alert = alert.with_generator_url(url);
        }
        alert
    }
}

/// Everything a notifier needs to know about the flush it is delivering.
#[derive(Debug, Clone)]
pub struct NotifyContext {
    /// Time the flush timer fired. Notifiers must use this instead of the wall clock.
    pub now: DateTime<Utc>,
    /// Unique per (route, grouping labels) pair.
    pub group_key: Fingerprint,
    pub group_labels: LabelSet,
    pub receiver: String,
    pub repeat_interval: Duration,
    /// Cancelled when the flush times out or the group is stopped.
    pub cancel: CancellationToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        chrono::DateTime::parse_from_rfc3339(s)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn raw(starts_at: Option<DateTime<Utc>>, ends_at: Option<DateTime<Utc>>) -> RawAlert {
        RawAlert {
            labels: [("alertname", "HighCPU")].into_iter().collect(),
            annotations: LabelSet::new(),
            starts_at,
            ends_at,
            generator_url: None,
        }
    }

    #[test]
    fn missing_start_defaults_to_now() {
        let alert = raw(None, None).into_alert(ts("2025-01-15T10:00:00Z"));
        assert_eq!(alert.starts_at(), ts("2025-01-15T10:00:00Z"));
        assert_eq!(alert.ends_at(), None);
    }

    #[test]
    fn explicit_times_are_kept() {
        let alert = raw(
            Some(ts("2025-01-15T09:00:00Z")),
            Some(ts("2025-01-15T09:30:00Z")),
        )
        .into_alert(ts("2025-01-15T10:00:00Z"));
        assert_eq!(alert.starts_at(), ts("2025-01-15T09:00:00Z"));
        assert_eq!(alert.ends_at(), Some(ts("2025-01-15T09:30:00Z")));
    }
}
