//! Read-only presentation of the live aggregation groups.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use muster_core::alert::{Alert, Fingerprint, LabelSet};
use muster_core::route::RouteOpts;
use muster_ports::outbound::Marker;

use crate::dispatch::GroupMap;

/// A firing alert together with its silencing and inhibition state.
#[derive(Debug, Clone, Serialize)]
pub struct ApiAlert {
    #[serde(flatten)]
    pub alert: Arc<Alert>,
    /// Hex form, as referenced by events.
    pub fingerprint: Fingerprint,
    pub inhibited: bool,
    /// Id of the muting silence, zero when not silenced.
    #[serde(skip_serializing_if = "is_zero")]
    pub silenced: u64,
}

/// The alerts one route holds for a label set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertBlock {
    pub route_opts: RouteOpts,
    pub alerts: Vec<ApiAlert>,
}

/// Every route's view of one grouping label set.
#[derive(Debug, Clone, Serialize)]
pub struct AlertGroup {
    pub labels: LabelSet,
    pub blocks: Vec<AlertBlock>,
}

/// Groups ordered by label set.
pub type AlertOverview = Vec<AlertGroup>;

fn is_zero(v: &u64) -> bool {
    *v == 0
}

pub fn build(groups: &GroupMap, marker: &dyn Marker, now: DateTime<Utc>) -> AlertOverview {
    let mut seen: HashMap<Fingerprint, AlertGroup> = HashMap::new();

    for route_groups in groups.values() {
        for group in route_groups.values() {
            let mut alerts: Vec<ApiAlert> = group
                .alerts()
                .into_iter()
                .filter(|alert| alert.is_firing_at(now))
                .map(|alert| {
                    let fp = alert.fingerprint();
                    ApiAlert {
                        inhibited: marker.inhibited(&fp),
                        silenced: marker.silenced(&fp).unwrap_or(0),
                        fingerprint: fp,
                        alert,
                    }
                })
                .collect();

            let entry = seen
                .entry(group.fingerprint())
                .or_insert_with(|| AlertGroup {
                    labels: group.labels().clone(),
                    blocks: Vec::new(),
                });

            if alerts.is_empty() {
                continue;
            }
            alerts.sort_by(|a, b| a.alert.labels().cmp(b.alert.labels()));
            entry.blocks.push(AlertBlock {
                route_opts: group.route().opts().clone(),
                alerts,
            });
        }
    }

    let mut overview: AlertOverview = seen
        .into_values()
        .filter(|group| !group.blocks.is_empty())
        .map(|mut group| {
            group
                .blocks
                .sort_by(|a, b| a.route_opts.receiver.cmp(&b.route_opts.receiver));
            group
        })
        .collect();
    overview.sort_by(|a, b| a.labels.cmp(&b.labels));
    overview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::AggrGroup;
    use muster_core::route::Route;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct MockMarker {
        silenced: Mutex<HashMap<Fingerprint, u64>>,
        inhibited: Mutex<HashSet<Fingerprint>>,
    }

    impl Marker for MockMarker {
        fn silenced(&self, fp: &Fingerprint) -> Option<u64> {
            self.silenced.lock().unwrap().get(fp).copied()
        }
        fn inhibited(&self, fp: &Fingerprint) -> bool {
            self.inhibited.lock().unwrap().contains(fp)
        }
    }

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn make_route(receiver: &str) -> Arc<Route> {
        let mut opts = RouteOpts::new(receiver);
        opts.group_by = ["alertname".to_string()].into();
        Arc::new(Route::new(opts).unwrap())
    }

    fn alert(name: &str, instance: &str, ends_at: Option<&str>) -> Arc<Alert> {
        let labels: LabelSet = [("alertname", name), ("instance", instance)]
            .into_iter()
            .collect();
        let mut alert = Alert::new(labels, ts("2025-01-15T09:00:00Z"));
        if let Some(ends_at) = ends_at {
            alert = alert.with_ends_at(ts(ends_at));
        }
        Arc::new(alert)
    }

    fn add(map: &mut GroupMap, route: &Arc<Route>, alerts: &[Arc<Alert>]) {
        let group_labels = alerts[0].labels().subset(&route.opts().group_by);
        let group = map
            .entry(route.id().clone())
            .or_default()
            .entry(group_labels.fingerprint())
            .or_insert_with(|| {
                AggrGroup::new(group_labels, Arc::clone(route), &CancellationToken::new())
            });
        for alert in alerts {
            group.insert(Arc::clone(alert));
        }
    }

    #[test]
    fn empty_map_gives_empty_overview() {
        let overview = build(&GroupMap::new(), &MockMarker::default(), Utc::now());
        assert!(overview.is_empty());
    }

    #[test]
    fn resolved_alerts_are_hidden() {
        let now = ts("2025-01-15T10:00:00Z");
        let route = make_route("team-a");
        let mut map = GroupMap::new();
        add(
            &mut map,
            &route,
            &[
                alert("HighCPU", "web-01", None),
                alert("HighCPU", "web-02", Some("2025-01-15T09:30:00Z")),
                alert("HighCPU", "web-03", Some("2025-01-15T11:00:00Z")),
            ],
        );

        let overview = build(&map, &MockMarker::default(), now);
        assert_eq!(overview.len(), 1);
        let instances: Vec<&str> = overview[0].blocks[0]
            .alerts
            .iter()
            .map(|a| a.alert.labels().get("instance").unwrap())
            .collect();
        assert_eq!(instances, vec!["web-01", "web-03"]);
    }

    #[test]
    fn group_with_only_resolved_alerts_is_omitted() {
        let now = ts("2025-01-15T10:00:00Z");
        let route = make_route("team-a");
        let mut map = GroupMap::new();
        add(&mut map, &route, &[alert("HighCPU", "web-01", Some("2025-01-15T09:30:00Z"))]);
        add(&mut map, &route, &[alert("DiskFull", "db-01", None)]);

        let overview = build(&map, &MockMarker::default(), now);
        assert_eq!(overview.len(), 1);
        assert_eq!(overview[0].labels.get("alertname"), Some("DiskFull"));
    }

    #[test]
    fn groups_are_sorted_by_labels() {
        let now = ts("2025-01-15T10:00:00Z");
        let route = make_route("team-a");
        let mut map = GroupMap::new();
        for name in ["Zookeeper", "HighCPU", "DiskFull"] {
            add(&mut map, &route, &[alert(name, "web-01", None)]);
        }

        let overview = build(&map, &MockMarker::default(), now);
        let names: Vec<&str> = overview
            .iter()
            .map(|g| g.labels.get("alertname").unwrap())
            .collect();
        assert_eq!(names, vec!["DiskFull", "HighCPU", "Zookeeper"]);
    }

    #[test]
    fn same_labels_under_two_routes_share_a_group_with_two_blocks() {
        let now = ts("2025-01-15T10:00:00Z");
        let team_a = make_route("team-a");
        let team_b = make_route("team-b");
        let mut map = GroupMap::new();
        add(&mut map, &team_b, &[alert("HighCPU", "web-01", None)]);
        add(&mut map, &team_a, &[alert("HighCPU", "web-01", None)]);

        let overview = build(&map, &MockMarker::default(), now);
        assert_eq!(overview.len(), 1);
        let receivers: Vec<&str> = overview[0]
            .blocks
            .iter()
            .map(|b| b.route_opts.receiver.as_str())
            .collect();
        assert_eq!(receivers, vec!["team-a", "team-b"]);
    }

    #[test]
    fn marker_state_is_attached() {
        let now = ts("2025-01-15T10:00:00Z");
        let route = make_route("team-a");
        let silenced = alert("HighCPU", "web-01", None);
        let inhibited = alert("HighCPU", "web-02", None);
        let plain = alert("HighCPU", "web-03", None);
        let mut map = GroupMap::new();
        add(
            &mut map,
            &route,
            &[Arc::clone(&silenced), Arc::clone(&inhibited), Arc::clone(&plain)],
        );

        let marker = MockMarker::default();
        marker
            .silenced
            .lock()
            .unwrap()
            .insert(silenced.fingerprint(), 42);
        marker
            .inhibited
            .lock()
            .unwrap()
            .insert(inhibited.fingerprint());

        let overview = build(&map, &marker, now);
        let alerts = &overview[0].blocks[0].alerts;
        assert_eq!((alerts[0].silenced, alerts[0].inhibited), (42, false));
        assert_eq!((alerts[1].silenced, alerts[1].inhibited), (0, true));
        assert_eq!((alerts[2].silenced, alerts[2].inhibited), (0, false));
    }

    #[test]
    fn unsilenced_alert_omits_silenced_field() {
        let now = ts("2025-01-15T10:00:00Z");
        let route = make_route("team-a");
        let mut map = GroupMap::new();
        add(&mut map, &route, &[alert("HighCPU", "web-01", None)]);

        let overview = build(&map, &MockMarker::default(), now);
        let json = serde_json::to_value(&overview).unwrap();
        let alert = &json[0]["blocks"][0]["alerts"][0];
        assert_eq!(alert["labels"]["instance"], "web-01");
        let labels: LabelSet = [("alertname", "HighCPU"), ("instance", "web-01")]
            .into_iter()
            .collect();
        assert_eq!(alert["fingerprint"], labels.fingerprint().to_string());
        assert_eq!(alert["inhibited"], false);
        assert!(alert.get("silenced").is_none());
        assert_eq!(json[0]["blocks"][0]["routeOpts"]["receiver"], "team-a");
    }
}
