use std::sync::Arc;

use replicator_health::HealthMonitor;

/// Shared state handed to every axum handler. Deliberately minimal: the
/// HTTP surface in this binary only exposes a health probe, not the full
/// admin command set (that's reached through `AdminApi` directly by
/// whatever transport a deployment wires in).
#[derive(Clone)]
pub struct AppState {
    pub health_monitor: Arc<HealthMonitor>,
}
