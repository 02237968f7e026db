//! Composition root for the offline client runtime.
//!
//! The source this design replaces kept its database handle and event
//! wiring in module-level globals; here everything is owned by one
//! `OfflineClient` built from injected parts, so embedders (and tests)
//! choose the store, transport, and registrar explicitly.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::connectivity::ConnectivityWatch;
use crate::flush::{FlushEngine, FlushReport};
use crate::interceptor::{ApiClient, ApiClientError};
use crate::session::Session;
use crate::sqlite::SqliteQueueStore;
use crate::status::{StatsSubscription, StatusObserver, SyncActivity};
use crate::store::{QueueStore, QueueStoreError};
use crate::transport::{HttpTransport, Transport};
use crate::trigger::{NoopRegistrar, SyncHub, SyncMessage, SyncRegistrar, SyncWorker};
use crate::types::{ApiResponse, ConnectivityState, OutboundRequest, QueueStats};

/// Builder for [`OfflineClient`].
///
/// Defaults: SQLite store at the platform data directory, live HTTP
/// transport, no background-sync support.
pub struct OfflineClientBuilder {
    store: Option<Arc<dyn QueueStore>>,
    transport: Option<Arc<dyn Transport>>,
    registrar: Arc<dyn SyncRegistrar>,
    session: Arc<Session>,
}

impl OfflineClientBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            transport: None,
            registrar: Arc::new(NoopRegistrar),
            session: Arc::new(Session::new()),
        }
    }

    pub fn store(mut self, store: Arc<dyn QueueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn registrar(mut self, registrar: Arc<dyn SyncRegistrar>) -> Self {
        self.registrar = registrar;
        self
    }

    pub fn session(mut self, session: Arc<Session>) -> Self {
        self.session = session;
        self
    }

    /// Wire everything together and spawn the sync worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> anyhow::Result<OfflineClient> {
        let store: Arc<dyn QueueStore> = match self.store {
            Some(store) => store,
            None => Arc::new(SqliteQueueStore::new()),
        };
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };

        let connectivity = Arc::new(ConnectivityWatch::new());
        let status = Arc::new(StatusObserver::new(store.clone(), connectivity.clone()));
        let api = Arc::new(ApiClient::new(
            transport.clone(),
            store.clone(),
            self.session.clone(),
            connectivity.clone(),
            self.registrar,
            status.clone(),
        ));
        let flush = Arc::new(FlushEngine::new(store, transport, status.clone()));

        let (hub, triggers) = SyncHub::channel();
        let shutdown = Arc::new(Notify::new());
        let worker = SyncWorker::new(flush.clone(), shutdown.clone(), triggers).start();

        Ok(OfflineClient {
            api,
            flush,
            status,
            session: self.session,
            connectivity,
            hub,
            shutdown,
            worker,
        })
    }
}

impl Default for OfflineClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The composed offline client: interceptor, flush engine, trigger
/// worker, and status observer over one durable queue store.
pub struct OfflineClient {
    api: Arc<ApiClient>,
    flush: Arc<FlushEngine>,
    status: Arc<StatusObserver>,
    session: Arc<Session>,
    connectivity: Arc<ConnectivityWatch>,
    hub: SyncHub,
    shutdown: Arc<Notify>,
    worker: JoinHandle<()>,
}

impl OfflineClient {
    pub fn builder() -> OfflineClientBuilder {
        OfflineClientBuilder::new()
    }

    /// Issue an API call through the interceptor.
    pub async fn send(&self, request: OutboundRequest) -> Result<ApiResponse, ApiClientError> {
        self.api.send(request).await
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity.state()
    }

    /// Platform reported connectivity restored: update the shared state
    /// first, then let the worker start a flush.
    pub fn notify_online(&self) {
        self.connectivity.set_online();
        self.hub.connectivity_restored();
    }

    /// Platform reported loss of network.
    pub fn notify_offline(&self) {
        self.connectivity.set_offline();
    }

    /// Relay a message received from the service-worker context.
    pub fn on_sync_message(&self, message: &SyncMessage) {
        self.hub.background_sync(message);
    }

    /// Fire-and-forget sync request, drained by the worker.
    pub fn request_sync(&self) {
        self.hub.force_sync();
    }

    /// User-initiated force sync, awaited to completion.
    pub async fn sync_now(&self) -> Result<FlushReport, QueueStoreError> {
        self.flush.flush().await
    }

    /// Subscribe to queue stats updates (initial snapshot included).
    pub async fn subscribe_stats(&self) -> Result<StatsSubscription, QueueStoreError> {
        self.status.subscribe().await
    }

    pub async fn stats(&self) -> Result<QueueStats, QueueStoreError> {
        self.status.stats().await
    }

    pub fn activity(&self) -> SyncActivity {
        self.status.activity()
    }

    /// Stop the sync worker and wait for it to exit.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        let _ = self.worker.await;
    }
}
