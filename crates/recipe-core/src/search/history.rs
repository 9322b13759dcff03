use std::sync::{Arc, Mutex, PoisonError};

/// The address bar a search surface mirrors its state into.
///
/// Only in-place replacement is offered, so filter edits never grow the
/// navigation history.
pub trait LocationHistory: Send {
    fn current_query(&self) -> String;
    fn replace_query(&mut self, query: &str);
}

/// In-process location with a fixed path. Clones share state, so a caller
/// can keep one to inspect what the controller wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    inner: Arc<Mutex<MemoryLocation>>,
}

#[derive(Debug, Default)]
struct MemoryLocation {
    path: String,
    query: String,
    replacements: usize,
}

impl MemoryHistory {
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_query(path, "")
    }

    pub fn with_query(path: impl Into<String>, query: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryLocation {
                path: path.into(),
                query: query.trim_start_matches('?').to_string(),
                replacements: 0,
            })),
        }
    }

    pub fn href(&self) -> String {
        let location = self.lock();
        if location.query.is_empty() {
            location.path.clone()
        } else {
            format!("{}?{}", location.path, location.query)
        }
    }

    pub fn replacements(&self) -> usize {
        self.lock().replacements
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryLocation> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocationHistory for MemoryHistory {
    fn current_query(&self) -> String {
        self.lock().query.clone()
    }

    fn replace_query(&mut self, query: &str) {
        let mut location = self.lock();
        location.query = query.trim_start_matches('?').to_string();
        location.replacements += 1;
    }
}
