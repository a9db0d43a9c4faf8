use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tapword_core::search::SearchSession;

/// One search workspace per caller id, created on first use.
///
/// The map lock only covers membership; each session has its own lock, so
/// callers with distinct ids search in parallel.
#[derive(Default)]
pub(crate) struct SessionPool {
    sessions: Mutex<HashMap<i32, Arc<Mutex<SearchSession>>>>,
}

impl SessionPool {
    pub fn get_or_create(&self, id: i32) -> Arc<Mutex<SearchSession>> {
        if let Some(session) = self.lock().get(&id) {
            return Arc::clone(session);
        }
        let fresh = Arc::new(Mutex::new(SearchSession::new()));
        // Another caller may have raced us here; the first insert wins.
        Arc::clone(self.lock().entry(id).or_insert(fresh))
    }

    /// Drop every session. Callers still holding one finish with it undisturbed.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i32, Arc<Mutex<SearchSession>>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
