//! Service wiring
//!
//! `GameContext` holds the process-scoped collaborators every component
//! needs; `ServiceContainer` owns the components built on top of it. The
//! container has no teardown beyond `RoundScheduler::stop_all`; dropping it
//! releases the databases.

use crate::{
    admin::AccountAdmin,
    clock::{Clock, SystemClock},
    config::QuickThreeConfig,
    draw::DrawEngine,
    errors::{ConfigurationError, QuickThreeResult},
    ledger_store::LedgerStore,
    lifecycle::GroupLifecycle,
    locks::LockRegistry,
    messenger::Messenger,
    round_cache::{KvRoundCache, RoundStore},
    scheduler::RoundScheduler,
    settlement::SettlementEngine,
    storage::{KvBackend, OptimizedStorage},
    wager::WagerLedger,
};
use std::sync::Arc;
use tracing::info;

/// Shared collaborators, passed to every component at construction
pub struct GameContext {
    pub config: QuickThreeConfig,
    pub store: Arc<LedgerStore>,
    pub rounds: Arc<dyn RoundStore>,
    pub messenger: Arc<dyn Messenger>,
    pub locks: Arc<LockRegistry>,
    pub clock: Arc<dyn Clock>,
    pub lifecycle: GroupLifecycle,
}

/// Fully wired round engine
pub struct ServiceContainer {
    context: Arc<GameContext>,
    scheduler: Arc<RoundScheduler>,
    draws: Arc<DrawEngine>,
    settlement: Arc<SettlementEngine>,
    wagers: Arc<WagerLedger>,
    admin: Arc<AccountAdmin>,
}

impl ServiceContainer {
    pub fn context(&self) -> Arc<GameContext> {
        Arc::clone(&self.context)
    }

    pub fn config(&self) -> &QuickThreeConfig {
        &self.context.config
    }

    pub fn store(&self) -> Arc<LedgerStore> {
        Arc::clone(&self.context.store)
    }

    pub fn scheduler(&self) -> Arc<RoundScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn draws(&self) -> Arc<DrawEngine> {
        Arc::clone(&self.draws)
    }

    pub fn settlement(&self) -> Arc<SettlementEngine> {
        Arc::clone(&self.settlement)
    }

    pub fn wagers(&self) -> Arc<WagerLedger> {
        Arc::clone(&self.wagers)
    }

    pub fn admin(&self) -> Arc<AccountAdmin> {
        Arc::clone(&self.admin)
    }
}

/// Builder for `ServiceContainer`.
///
/// Backends default to RocksDB databases at the configured directories;
/// tests pass in-memory backends instead.
pub struct ServiceBuilder {
    config: QuickThreeConfig,
    ledger_backend: Option<Arc<dyn KvBackend>>,
    cache_backend: Option<Arc<dyn KvBackend>>,
    messenger: Option<Arc<dyn Messenger>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ServiceBuilder {
    pub fn new(config: QuickThreeConfig) -> Self {
        Self {
            config,
            ledger_backend: None,
            cache_backend: None,
            messenger: None,
            clock: None,
        }
    }

    pub fn with_ledger_backend(mut self, backend: Arc<dyn KvBackend>) -> Self {
        self.ledger_backend = Some(backend);
        self
    }

    pub fn with_cache_backend(mut self, backend: Arc<dyn KvBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    pub fn with_messenger(mut self, messenger: Arc<dyn Messenger>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> QuickThreeResult<ServiceContainer> {
        let config = self.config;
        let messenger = self
            .messenger
            .ok_or_else(|| ConfigurationError::MissingRequired("messenger".to_string()))?;

        let ledger_backend: Arc<dyn KvBackend> = match self.ledger_backend {
            Some(backend) => backend,
            None => Arc::new(OptimizedStorage::open(&config.storage.data_directory, &config.storage)?),
        };
        let cache_backend: Arc<dyn KvBackend> = match self.cache_backend {
            Some(backend) => backend,
            None => Arc::new(OptimizedStorage::open(&config.storage.cache_directory, &config.storage)?),
        };

        let store = Arc::new(LedgerStore::new(ledger_backend));
        let context = Arc::new(GameContext {
            lifecycle: GroupLifecycle::new(Arc::clone(&store)),
            store,
            rounds: Arc::new(KvRoundCache::new(cache_backend)),
            messenger,
            locks: Arc::new(LockRegistry::new()),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            config,
        });

        let settlement = Arc::new(SettlementEngine::new(Arc::clone(&context)));
        let draws = Arc::new(DrawEngine::new(Arc::clone(&context), Arc::clone(&settlement)));
        let scheduler = Arc::new(RoundScheduler::new(Arc::clone(&context), Arc::clone(&draws)));
        let wagers = Arc::new(WagerLedger::new(Arc::clone(&context)));
        let admin = Arc::new(AccountAdmin::new(Arc::clone(&context)));

        info!(
            data_directory = %context.config.storage.data_directory,
            cache_directory = %context.config.storage.cache_directory,
            "Services initialized"
        );

        Ok(ServiceContainer {
            context,
            scheduler,
            draws,
            settlement,
            wagers,
            admin,
        })
    }
}
