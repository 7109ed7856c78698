//! # fleethub-adapter-storage-memory
//!
//! In-memory persistence adapter.
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `fleethub_app::ports::storage`
//! - Serialize mutations *per device*: each device's records sit behind
//!   their own lock, so concurrent updates to the same device queue up while
//!   updates to different devices proceed in parallel
//! - Keep queue positions dense (every removal renumbers)
//!
//! ## Dependency rule
//! Depends on `fleethub-app` (for port traits) and `fleethub-domain` (for
//! domain types). The `app` and `domain` crates must never reference this
//! adapter.

mod automation_repo;
mod device_repo;
mod event_store;
mod queue_repo;
mod script_repo;

pub use automation_repo::MemoryAutomationRepository;
pub use device_repo::MemoryDeviceRepository;
pub use event_store::MemoryEventStore;
pub use queue_repo::MemoryQueueRepository;
pub use script_repo::MemoryScriptRepository;
