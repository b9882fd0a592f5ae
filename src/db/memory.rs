//! In-memory user store, used by the CLI and tests.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ContactRepository, DbError, DbResult, WriteUserRepository};
use crate::models::{Contact, NewUser};

pub struct MemoryContactStore {
    contacts: RwLock<Vec<Contact>>,
    next_id: AtomicI64,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self {
            contacts: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Seed the store with existing contacts.
    pub fn with_contacts(contacts: Vec<Contact>) -> Self {
        let next_id = contacts.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        Self {
            contacts: RwLock::new(contacts),
            next_id: AtomicI64::new(next_id),
        }
    }

    pub async fn len(&self) -> usize {
        self.contacts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.contacts.read().await.is_empty()
    }
}

impl Default for MemoryContactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContactRepository for MemoryContactStore {
    async fn find_by_email(&self, email: &str) -> DbResult<Option<Contact>> {
        let contacts = self.contacts.read().await;
        Ok(contacts.iter().find(|c| c.email == email).cloned())
    }

    async fn find_by_name(&self, name: &str) -> DbResult<Option<Contact>> {
        let contacts = self.contacts.read().await;
        Ok(contacts.iter().find(|c| c.alias == name).cloned())
    }
}

#[async_trait]
impl WriteUserRepository for MemoryContactStore {
    async fn create(&self, user: NewUser) -> DbResult<Contact> {
        let mut contacts = self.contacts.write().await;
        if contacts.iter().any(|c| c.alias == user.alias) {
            return Err(DbError::Conflict(format!(
                "contact with alias '{}' already exists",
                user.alias
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let contact = Contact::from_new_user(id, &user);
        contacts.push(contact.clone());
        Ok(contact)
    }
}
