use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Opaque reference to downloadable output bytes, the analog of an object
/// URL. Valid until released by the task store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandleId(Uuid);

#[derive(Clone)]
pub struct HandleRegistry {
    entries: Arc<Mutex<HashMap<HandleId, Arc<Vec<u8>>>>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        HandleRegistry {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn create(&self, bytes: Arc<Vec<u8>>) -> HandleId {
        let id = HandleId(Uuid::new_v4());
        let mut entries = self.entries.lock().unwrap();
        entries.insert(id, bytes);
        id
    }

    pub fn resolve(&self, id: &HandleId) -> Option<Arc<Vec<u8>>> {
        let entries = self.entries.lock().unwrap();
        entries.get(id).cloned()
    }

    /// Returns false when the handle is unknown or already released.
    pub fn release(&self, id: &HandleId) -> bool {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        HandleRegistry::new()
    }
}
