mod error;
pub mod memory;
pub mod repos;

use std::sync::Arc;

pub use error::{DbError, DbResult};
pub use repos::*;

use self::memory::MemoryContactStore;

/// Repository trait objects, created once.
struct CachedRepos {
    contacts: Arc<dyn ContactRepository>,
    users: Arc<dyn WriteUserRepository>,
}

/// Handle on the configuration database.
///
/// Cheap to clone; all clones share the same repositories.
#[derive(Clone)]
pub struct DbPool {
    repos: Arc<CachedRepos>,
}

impl DbPool {
    pub fn new(contacts: Arc<dyn ContactRepository>, users: Arc<dyn WriteUserRepository>) -> Self {
        Self {
            repos: Arc::new(CachedRepos { contacts, users }),
        }
    }

    /// Build a pool whose reads and writes go to the same in-memory store.
    pub fn from_memory(store: Arc<MemoryContactStore>) -> Self {
        Self::new(store.clone(), store)
    }

    pub fn contacts(&self) -> Arc<dyn ContactRepository> {
        self.repos.contacts.clone()
    }

    pub fn users(&self) -> Arc<dyn WriteUserRepository> {
        self.repos.users.clone()
    }
}

impl std::fmt::Debug for DbPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbPool").finish_non_exhaustive()
    }
}
