use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use tracing::debug;
use uuid::Uuid;

use folio_core::folio::Folio;
use folio_core::session::InvoiceSession;

struct Entry {
    session: InvoiceSession,
    touched_at: Instant,
}

/// In-process store of staged invoices keyed by session id.
///
/// Sessions untouched for longer than the idle timeout are evicted whenever
/// a new session is opened.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<Uuid, Entry>>>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new empty invoice reserved under `folio`.
    pub fn open(&self, folio: Folio) -> (Uuid, InvoiceSession) {
        let id = Uuid::new_v4();
        let session = InvoiceSession::new(folio);
        let mut sessions = self.lock();

        let before = sessions.len();
        sessions.retain(|_, entry| entry.touched_at.elapsed() <= self.idle_timeout);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(stage = "invoice", evicted, "idle invoice sessions evicted");
        }

        sessions.insert(
            id,
            Entry {
                session: session.clone(),
                touched_at: Instant::now(),
            },
        );
        (id, session)
    }

    /// Runs `f` against the session, returning `None` when it does not exist.
    pub fn with_session<R>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut InvoiceSession) -> R,
    ) -> Option<R> {
        self.lock().get_mut(id).map(|entry| {
            entry.touched_at = Instant::now();
            f(&mut entry.session)
        })
    }

    pub fn snapshot(&self, id: &Uuid) -> Option<InvoiceSession> {
        self.lock().get(id).map(|entry| entry.session.clone())
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        self.lock().remove(id).is_some()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }
}
