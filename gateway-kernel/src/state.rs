use parking_lot::Mutex;
use std::sync::Arc;

/// État partagé entre les tâches des transports et le routeur
pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_shared<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}
