//! # Web API Application State
//!
//! Shared state for the web API: the database pool, the coordination
//! services, the real-time hub, and the token verifier. One publisher
//! instance is threaded through every producer so the hub sees all
//! committed events.

use std::sync::Arc;

use sqlx::PgPool;

use crate::analytics::EfficiencyAnalytics;
use crate::broadcaster::{BroadcastHub, ChannelAcl};
use crate::config::MesConfig;
use crate::error::{MesError, Result};
use crate::events::EventPublisher;
use crate::ledger::DowntimeWasteLedger;
use crate::orchestration::{MachineAllocationGuard, OrderLifecycleController};
use crate::web::auth::JwtAuthenticator;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<MesConfig>,
    pub controller: OrderLifecycleController,
    pub guard: MachineAllocationGuard,
    pub ledger: DowntimeWasteLedger,
    pub analytics: EfficiencyAnalytics,
    pub hub: Arc<BroadcastHub>,
    pub authenticator: JwtAuthenticator,
}

impl AppState {
    /// Wire every service onto one pool and one event publisher
    pub fn build(config: Arc<MesConfig>, pool: PgPool) -> Result<Self> {
        let publisher = EventPublisher::new(config.broadcaster.event_capacity);
        let guard = MachineAllocationGuard::new(pool.clone());
        let controller = OrderLifecycleController::new(
            pool.clone(),
            config.transitions.orders.clone(),
            guard.clone(),
            publisher.clone(),
        );
        let ledger = DowntimeWasteLedger::new(pool.clone(), publisher.clone());
        let analytics = EfficiencyAnalytics::new(pool.clone());
        let hub = Arc::new(BroadcastHub::new(
            publisher,
            ChannelAcl::new(config.channels.clone()),
            config.broadcaster.clone(),
        ));
        let authenticator = JwtAuthenticator::from_config(&config.auth)
            .map_err(|e| MesError::Configuration(e.to_string()))?;

        Ok(Self {
            pool,
            config,
            controller,
            guard,
            ledger,
            analytics,
            hub,
            authenticator,
        })
    }
}
