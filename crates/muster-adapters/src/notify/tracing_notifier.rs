use std::sync::Arc;

use async_trait::async_trait;

use muster_core::alert::Alert;
use muster_ports::error::NotifyError;
use muster_ports::outbound::Notifier;
use muster_ports::types::NotifyContext;

/// Notifier that only logs what it would deliver.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, ctx: &NotifyContext, alerts: &[Arc<Alert>]) -> Result<(), NotifyError> {
        if ctx.cancel.is_cancelled() {
            return Err(NotifyError::Cancelled);
        }
        if ctx.receiver.is_empty() {
            return Err(NotifyError::InvalidTarget);
        }

        let firing = alerts.iter().filter(|a| a.is_firing_at(ctx.now)).count();
        tracing::info!(
            group_key = %ctx.group_key,
            receiver = %ctx.receiver,
            group_labels = ?ctx.group_labels.as_map(),
            firing,
            resolved = alerts.len() - firing,
            "notification"
        );
        Ok(())
    }
}
