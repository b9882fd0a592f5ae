use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{Contact, NewUser},
};

/// Read access to users.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> DbResult<Option<Contact>>;
    /// Find by login name (alias).
    async fn find_by_name(&self, name: &str) -> DbResult<Option<Contact>>;
}

/// Write access to users.
#[async_trait]
pub trait WriteUserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> DbResult<Contact>;
}
