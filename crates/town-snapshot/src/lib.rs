pub mod loader;
pub mod reconcile;
pub mod store;

pub use loader::{LoaderConfig, SnapshotLoader, DEFAULT_RECENT_LIMIT};
pub use reconcile::reconcile;
pub use store::{ActiveWork, Store};
