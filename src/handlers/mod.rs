pub mod common;
pub mod contracts;
pub mod dashboard;
pub mod exports;
pub mod injections;
pub mod orders;
pub mod periods;
pub mod statistics;

use crate::cache::InMemoryCache;
use crate::db::DbPool;
use crate::events::EventSender;
use std::sync::Arc;
use std::time::Duration;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub contracts: Arc<crate::services::contracts::ContractService>,
    pub periods: Arc<crate::services::periods::PeriodService>,
    pub orders: Arc<crate::services::orders::OrderService>,
    pub injections: Arc<crate::services::injections::InjectionService>,
    pub dashboard: Arc<crate::services::dashboard::DashboardService>,
    pub statistics: Arc<crate::services::statistics::StatisticsService>,
    pub exports: Arc<crate::services::exports::ExportService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        cache: Arc<InMemoryCache>,
        cache_ttl: Option<Duration>,
    ) -> Self {
        let contracts = Arc::new(crate::services::contracts::ContractService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
            cache.clone(),
            cache_ttl,
        ));
        let periods = Arc::new(crate::services::periods::PeriodService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
            cache.clone(),
            cache_ttl,
        ));
        let orders = Arc::new(crate::services::orders::OrderService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
            cache.clone(),
        ));
        let injections = Arc::new(crate::services::injections::InjectionService::new(
            db_pool.clone(),
            Some(event_sender),
            cache.clone(),
        ));
        let dashboard = Arc::new(crate::services::dashboard::DashboardService::new(
            db_pool.clone(),
            cache.clone(),
            cache_ttl,
        ));
        let statistics = Arc::new(crate::services::statistics::StatisticsService::new(
            db_pool.clone(),
            cache,
            cache_ttl,
        ));
        let exports = Arc::new(crate::services::exports::ExportService::new(db_pool));

        Self {
            contracts,
            periods,
            orders,
            injections,
            dashboard,
            statistics,
            exports,
        }
    }
}
