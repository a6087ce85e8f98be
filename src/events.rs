//! Lifecycle event publication for external subscribers (email notifications
//! and the like). Delivery is fire-and-forget; the engine only guarantees
//! events are published after the mutation they describe has committed.

use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    LicenseCreated {
        license_id: String,
        owner_id: String,
        plan_type: String,
    },
    DomainActivated {
        license_id: String,
        plugin_slug: String,
        domain: String,
    },
    DomainDeactivated {
        license_id: String,
        plugin_slug: String,
        domain: String,
    },
    LicenseRenewed {
        license_id: String,
        expires_at: i64,
    },
    LicenseSuspended {
        license_id: String,
        reason: String,
    },
    LicenseCancelled {
        license_id: String,
    },
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LicenseCreated { .. } => "license_created",
            Self::DomainActivated { .. } => "domain_activated",
            Self::DomainDeactivated { .. } => "domain_deactivated",
            Self::LicenseRenewed { .. } => "license_renewed",
            Self::LicenseSuspended { .. } => "license_suspended",
            Self::LicenseCancelled { .. } => "license_cancelled",
        }
    }
}

/// Subscriber boundary. Implementations must not block; anything slow
/// belongs behind a channel on the subscriber's side.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: LifecycleEvent);
}

pub type SharedEventSink = Arc<dyn EventSink>;

/// Default sink: structured log lines only.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: LifecycleEvent) {
        tracing::info!(name = event.name(), detail = ?event, "lifecycle event");
    }
}
