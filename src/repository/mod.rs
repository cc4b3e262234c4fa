pub mod memory;
pub mod request_log;
pub mod user;

pub use memory::MemoryRequestLogStore;
pub use request_log::RequestLogRepository;
pub use user::UserRepository;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    NewRequestLog, PaginatedResponse, RequestLogListParams, RequestLogWithUser, User,
};

/// Storage for request logs.
///
/// Entries are insert-only. Listing must return each entry with its user
/// relation already resolved, in a number of round trips that does not grow
/// with the size of the page.
#[async_trait]
pub trait RequestLogStore: Send + Sync {
    /// Persist one entry and return its id
    async fn insert(&self, entry: &NewRequestLog) -> Result<i64>;

    /// Fetch a single entry with its user
    async fn get(&self, id: i64) -> Result<Option<RequestLogWithUser>>;

    /// List entries, newest first
    async fn list(
        &self,
        params: &RequestLogListParams,
    ) -> Result<PaginatedResponse<RequestLogWithUser>>;
}

/// Lookup of the users that request logs reference
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Return the user with this username, creating it on first use
    async fn get_or_create(&self, username: &str) -> Result<User>;
}
