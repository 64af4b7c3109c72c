//! # Folio Store
//!
//! Everything between the editor and the content service:
//!
//! ```text
//! editor ──▶ SaveQueue ──▶ DataCache ──▶ RemoteStore (HTTP service, MemoryStore in tests)
//!   └──── reads ──────────────┘
//! ```
//!
//! Reads go straight to the [`DataCache`]. Writes are wrapped in
//! [`SaveQueue::add`] by the editor so that they apply one at a time, in the
//! order they were issued.

pub mod cache;
pub mod memory;
pub mod queue;
pub mod remote;

pub use cache::DataCache;
pub use memory::MemoryStore;
pub use queue::{QueueStatus, SaveQueue};
pub use remote::{RemoteStore, StoreCall};
