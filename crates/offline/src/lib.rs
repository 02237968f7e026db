//! `comptoir-offline`
//!
//! **Responsibility:** the offline request queue and synchronization
//! runtime of the comptoir client.
//!
//! When a mutation fails because the device is offline, the interceptor
//! persists it to a durable queue and acknowledges it with a synthetic
//! "accepted for later delivery" response instead of an error. Once any
//! of three redundant triggers fires (connectivity restored, a
//! background-sync wake-up, or a manual force sync), the flush engine
//! replays the queue in enqueue order against the live API, stopping at
//! the first failure to preserve causal ordering. The status observer
//! broadcasts queue depth and age so UI code can show what is pending.
//!
//! Page components, the REST API, and static-asset caching are external
//! collaborators; they reach this crate only through [`OutboundRequest`]
//! descriptors and the [`OfflineClient`] surface.

pub mod client;
pub mod connectivity;
pub mod flush;
pub mod interceptor;
pub mod session;
pub mod sqlite;
pub mod status;
pub mod store;
pub mod transport;
pub mod trigger;
pub mod types;

pub use client::{OfflineClient, OfflineClientBuilder};
pub use connectivity::ConnectivityWatch;
pub use flush::{FlushEngine, FlushOutcome, FlushReport};
pub use interceptor::{ApiClient, ApiClientError};
pub use session::{ORG_HEADER, Session};
pub use sqlite::SqliteQueueStore;
pub use status::{StatsSubscription, StatusObserver, SyncActivity};
pub use store::{InMemoryQueueStore, QueueStore, QueueStoreError};
pub use transport::{HttpTransport, Transport, TransportError};
pub use trigger::{
    NoopRegistrar, RegistrationStatus, SYNC_TAG, SyncHub, SyncMessage, SyncRegistrar, SyncTrigger,
    SyncWorker,
};
pub use types::{
    ApiResponse, ConnectivityState, EntryId, OutboundRequest, QueueStats, QueuedRequest,
};
