use std::sync::{Arc, Mutex};

use crate::handles::HandleRegistry;
use crate::task::{Task, TaskId, TaskStatus};

struct StoreInner {
    tasks: Vec<Task>,
    version: u64,
}

/// Ordered task collection behind one mutex: every mutation is atomic and
/// bumps the version, so long-running callers re-reading by id always see
/// the latest committed state instead of a stale snapshot. The store is the
/// sole authority for releasing output handles.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<Mutex<StoreInner>>,
    handles: HandleRegistry,
}

impl TaskStore {
    pub fn new() -> Self {
        TaskStore {
            inner: Arc::new(Mutex::new(StoreInner {
                tasks: vec![],
                version: 0,
            })),
            handles: HandleRegistry::new(),
        }
    }

    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    pub fn append(&self, tasks: Vec<Task>) {
        if tasks.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.tasks.extend(tasks);
        inner.version += 1;
    }

    /// No-op for an unknown id. Releases the task's output handle, if any,
    /// before the record is dropped.
    pub fn remove(&self, id: &TaskId) {
        let mut inner = self.inner.lock().unwrap();
        let Some(index) = inner.tasks.iter().position(|t| t.id == *id) else {
            return;
        };
        let task = inner.tasks.remove(index);
        if let Some(handle) = task.output_handle {
            self.handles.release(&handle);
        }
        inner.version += 1;
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.tasks.is_empty() {
            return;
        }
        for task in inner.tasks.drain(..) {
            if let Some(handle) = task.output_handle {
                self.handles.release(&handle);
            }
        }
        inner.version += 1;
    }

    /// Applies `f` to the task with the given id. Returns false (and leaves
    /// the version untouched) when no task matches.
    pub fn update<F>(&self, id: &TaskId, f: F) -> bool
    where
        F: FnOnce(&mut Task),
    {
        let mut inner = self.inner.lock().unwrap();
        match inner.tasks.iter_mut().find(|t| t.id == *id) {
            Some(task) => {
                f(task);
                inner.version += 1;
                true
            },
            None => false,
        }
    }

    /// Applies `f` to every task matching the predicate; returns the match
    /// count. Matching nothing is a no-op, not an error.
    pub fn update_where<P, F>(&self, pred: P, mut f: F) -> usize
    where
        P: Fn(&Task) -> bool,
        F: FnMut(&mut Task),
    {
        let mut inner = self.inner.lock().unwrap();
        let mut matched = 0;
        for task in inner.tasks.iter_mut().filter(|t| pred(t)) {
            f(task);
            matched += 1;
        }
        if matched > 0 {
            inner.version += 1;
        }
        matched
    }

    /// Marks the task done with the produced bytes. The output handle is
    /// created inside the same critical section; a missing task gets no
    /// handle at all.
    pub fn complete(&self, id: &TaskId, bytes: Vec<u8>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let Some(task) = inner.tasks.iter_mut().find(|t| t.id == *id) else {
            return false;
        };
        let bytes = Arc::new(bytes);
        let handle = self.handles.create(Arc::clone(&bytes));
        task.complete(bytes, handle);
        inner.version += 1;
        true
    }

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        let inner = self.inner.lock().unwrap();
        inner.tasks.iter().find(|t| t.id == *id).cloned()
    }

    pub fn snapshot(&self) -> Vec<Task> {
        let inner = self.inner.lock().unwrap();
        inner.tasks.clone()
    }

    /// Ids of queued tasks in submission order.
    pub fn queued_ids(&self) -> Vec<TaskId> {
        let inner = self.inner.lock().unwrap();
        inner
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Queued)
            .map(|t| t.id)
            .collect()
    }

    pub fn version(&self) -> u64 {
        self.inner.lock().unwrap().version
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        TaskStore::new()
    }
}
