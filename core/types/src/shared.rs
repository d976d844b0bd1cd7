use std::sync::Arc;
use tokio::sync::RwLock;

/// Handle<T> - external reference to a value that manages its own locking.
/// Components hand these out instead of bare Arc so call sites stay uniform.
pub type Handle<T> = Arc<T>;

/// Shared<T> - internal mutable state guarded by an async RwLock.
/// Only ever used for private fields; never exposed across a crate boundary.
pub type Shared<T> = Arc<RwLock<T>>;

/// Create a new Handle<T>
pub fn handle<T>(value: T) -> Handle<T> {
    Arc::new(value)
}

/// Create a new Shared<T>
pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}
