use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use muster_core::alert::{Alert, Fingerprint, LabelSet};
use muster_core::route::Route;
use muster_ports::types::NotifyContext;

use super::lock;

/// Delivers one flush worth of alerts. Returns false iff delivery failed.
pub type DeliverFn =
    Arc<dyn Fn(NotifyContext, Vec<Arc<Alert>>) -> BoxFuture<'static, bool> + Send + Sync>;

struct Entry {
    revision: u64,
    alert: Arc<Alert>,
}

#[derive(Default)]
struct GroupState {
    alerts: HashMap<Fingerprint, Entry>,
    next_revision: u64,
    has_sent: bool,
}

/// Alerts of one route that share the same grouping labels, plus the timer
/// loop that notifies about them.
pub struct AggrGroup {
    labels: LabelSet,
    route: Arc<Route>,
    fingerprint: Fingerprint,
    group_key: Fingerprint,
    state: Mutex<GroupState>,
    flush_now: Notify,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AggrGroup {
    pub fn new(labels: LabelSet, route: Arc<Route>, parent: &CancellationToken) -> Arc<Self> {
        let fingerprint = labels.fingerprint();
        Arc::new(Self {
            group_key: fingerprint.combine(route.fingerprint()),
            labels,
            route,
            fingerprint,
            state: Mutex::new(GroupState::default()),
            flush_now: Notify::new(),
            cancel: parent.child_token(),
            task: Mutex::new(None),
        })
    }

    /// Spawns the timer loop. The first flush fires once the route's group wait elapsed.
    pub fn start(self: &Arc<Self>, deliver: DeliverFn, min_interval: Duration) {
        let handle = tokio::spawn(Arc::clone(self).run(deliver, min_interval));
        *lock(&self.task) = Some(handle);
    }

    async fn run(self: Arc<Self>, deliver: DeliverFn, min_interval: Duration) {
        let interval = self.route.opts().group_interval.max(min_interval);
        let mut flushes = JoinSet::new();

        let next = sleep_until(Instant::now() + self.route.opts().group_wait);
        tokio::pin!(next);

        loop {
            tokio::select! {
                () = &mut next => {
                    let ctx = self.notify_context(Utc::now());
                    // This flush covers any escalation still pending.
                    let _ = self.flush_now.notified().now_or_never();
                    // Re-arm before delivering so a slow notifier never delays the next flush.
                    next.as_mut().reset(Instant::now() + interval);

                    let group = Arc::clone(&self);
                    let deliver = Arc::clone(&deliver);
                    flushes.spawn(async move { group.flush_bounded(ctx, interval, deliver).await });
                }
                () = self.flush_now.notified() => next.as_mut().reset(Instant::now()),
                Some(_) = flushes.join_next(), if !flushes.is_empty() => {}
                () = self.cancel.cancelled() => break,
            }
        }

        // In-flight flushes observe the cancellation through their child tokens.
        while flushes.join_next().await.is_some() {}
        tracing::debug!(group_key = %self.group_key, "aggregation group stopped");
    }

    async fn flush_bounded(&self, ctx: NotifyContext, timeout: Duration, deliver: DeliverFn) {
        let cancel = ctx.cancel.clone();
        let _guard = cancel.clone().drop_guard();
        let group_key = self.group_key;

        self.flush(ctx.now, |alerts| async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => false,
                delivered = tokio::time::timeout(timeout, deliver(ctx, alerts)) => {
                    delivered.unwrap_or_else(|_| {
                        tracing::warn!(%group_key, ?timeout, "notification timed out");
                        false
                    })
                }
            }
        })
        .await;
    }

    /// Delivers a snapshot of the current alerts. On success, resolved alerts
    /// that were not replaced since the snapshot are dropped.
    pub(crate) async fn flush<F, Fut>(&self, now: DateTime<Utc>, notify: F)
    where
        F: FnOnce(Vec<Arc<Alert>>) -> Fut,
        Fut: Future<Output = bool>,
    {
        let snapshot: Vec<(Fingerprint, u64, Arc<Alert>)> = {
            let state = lock(&self.state);
            state
                .alerts
                .iter()
                .map(|(fp, entry)| (*fp, entry.revision, Arc::clone(&entry.alert)))
                .collect()
        };
        if snapshot.is_empty() {
            return;
        }

        let alerts: Vec<Arc<Alert>> = snapshot.iter().map(|(_, _, a)| Arc::clone(a)).collect();
        tracing::debug!(group_key = %self.group_key, alerts = alerts.len(), "flushing");

        if !notify(alerts).await {
            return;
        }

        let mut state = lock(&self.state);
        for (fp, revision, alert) in &snapshot {
            let unchanged = state
                .alerts
                .get(fp)
                .is_some_and(|entry| entry.revision == *revision);
            if unchanged && alert.is_resolved_at(now) {
                state.alerts.remove(fp);
            }
        }
        state.has_sent = true;
    }

    /// Adds or replaces the alert. Triggers an immediate flush when nothing was
    /// sent yet and the alert already waited longer than the group wait.
    pub fn insert(&self, alert: Arc<Alert>) {
        let escalate = {
            let mut state = lock(&self.state);
            let revision = state.next_revision;
            state.next_revision += 1;

            let escalate =
                !state.has_sent && alert.has_waited(self.route.opts().group_wait, Utc::now());
            state.alerts.insert(alert.fingerprint(), Entry { revision, alert });
            escalate
        };
        if escalate {
            self.flush_now.notify_one();
        }
    }

    /// Cancels the timer loop and waits until it and any in-flight flush exited.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = lock(&self.task).take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                tracing::error!(group_key = %self.group_key, %err, "aggregation group task failed");
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.state).alerts.is_empty()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).alerts.len()
    }

    pub fn alerts(&self) -> Vec<Arc<Alert>> {
        lock(&self.state)
            .alerts
            .values()
            .map(|entry| Arc::clone(&entry.alert))
            .collect()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn group_key(&self) -> Fingerprint {
        self.group_key
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    fn notify_context(&self, now: DateTime<Utc>) -> NotifyContext {
        let opts = self.route.opts();
        NotifyContext {
            now,
            group_key: self.group_key,
            group_labels: self.labels.clone(),
            receiver: opts.receiver.clone(),
            repeat_interval: opts.repeat_interval,
            cancel: self.cancel.child_token(),
        }
    }
}
