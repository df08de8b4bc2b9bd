use crate::storage::KeyValueStore;
use crate::streak::StreakEngine;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedStore = Box<dyn KeyValueStore + Send>;

/// One lock around the whole store: each request runs its read-modify-write
/// cycle as a single step.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<SharedStore>>,
    pub engine: Arc<StreakEngine>,
}

impl AppState {
    pub fn new(store: impl KeyValueStore + Send + 'static, engine: StreakEngine) -> Self {
        Self {
            store: Arc::new(Mutex::new(Box::new(store))),
            engine: Arc::new(engine),
        }
    }
}
