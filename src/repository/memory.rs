//! In-process request log store
//!
//! Backs the tracking middleware when no database is configured and in tests.
//! Every trait call counts as one round trip, so callers can assert that
//! listing cost does not depend on the number of rows.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::error::{Result, TrackingError};
use crate::models::{
    page_and_limit, page_offset, ApiRequestLog, NewRequestLog, PaginatedResponse, RequestLogListParams,
    RequestLogWithUser, User, UserSummary,
};

use super::{RequestLogStore, UserStore};

#[derive(Default)]
struct Tables {
    logs: Vec<ApiRequestLog>,
    users: HashMap<i64, User>,
}

/// Request log and user store kept in memory
#[derive(Default)]
pub struct MemoryRequestLogStore {
    tables: RwLock<Tables>,
    round_trips: AtomicU64,
    fail_inserts: AtomicBool,
}

impl MemoryRequestLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store calls served so far
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }

    /// Make subsequent inserts fail, simulating an unavailable database
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::Relaxed);
    }

    /// Snapshot of every stored entry in insertion order
    pub fn entries(&self) -> Vec<ApiRequestLog> {
        self.tables.read().logs.clone()
    }

    pub fn len(&self) -> usize {
        self.tables.read().logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attach each log's user. One call is one round trip, the in-memory
    /// counterpart of the `LEFT JOIN users` in the SQL page query.
    fn join_users<'a, I>(&self, tables: &Tables, logs: I) -> Vec<RequestLogWithUser>
    where
        I: IntoIterator<Item = &'a ApiRequestLog>,
    {
        self.round_trips.fetch_add(1, Ordering::Relaxed);

        logs.into_iter()
            .map(|log| RequestLogWithUser {
                log: log.clone(),
                user: log
                    .user_id
                    .and_then(|id| tables.users.get(&id))
                    .map(UserSummary::from),
            })
            .collect()
    }
}

#[async_trait]
impl RequestLogStore for MemoryRequestLogStore {
    async fn insert(&self, entry: &NewRequestLog) -> Result<i64> {
        self.round_trips.fetch_add(1, Ordering::Relaxed);

        if self.fail_inserts.load(Ordering::Relaxed) {
            return Err(TrackingError::DatabaseConnection(
                "request log store unavailable".into(),
            ));
        }
        entry.validate()?;

        let mut tables = self.tables.write();
        let id = tables.logs.len() as i64 + 1;
        tables.logs.push(ApiRequestLog {
            id,
            user_id: entry.user_id,
            request_id: entry.request_id.clone(),
            requested_at: entry.requested_at,
            response_ms: entry.response_ms,
            path: entry.path.clone(),
            view: entry.view.clone(),
            view_method: entry.view_method.clone(),
            remote_addr: entry.remote_addr.clone(),
            host: entry.host.clone(),
            method: entry.method.clone(),
            query_params: entry.query_params.clone(),
            data: entry.data.clone(),
            response: entry.response.clone(),
            kind_of_cache_using: entry.kind_of_cache_using.map(|c| c.as_i16()),
            errors: entry.errors.clone(),
            status_code: entry.status_code,
        });

        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Option<RequestLogWithUser>> {
        let tables = self.tables.read();
        let found = tables.logs.iter().find(|log| log.id == id);

        Ok(self.join_users(&tables, found).into_iter().next())
    }

    async fn list(
        &self,
        params: &RequestLogListParams,
    ) -> Result<PaginatedResponse<RequestLogWithUser>> {
        // count
        self.round_trips.fetch_add(1, Ordering::Relaxed);

        let (page, limit) = page_and_limit(params.page, params.limit);
        let offset = usize::try_from(page_offset(page, limit)).unwrap_or(usize::MAX);

        let tables = self.tables.read();
        let mut matching: Vec<&ApiRequestLog> =
            tables.logs.iter().filter(|log| params.matches(log)).collect();
        matching.sort_by(|a, b| b.requested_at.cmp(&a.requested_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        // joined page
        let data = self.join_users(
            &tables,
            matching.into_iter().skip(offset).take(limit as usize),
        );

        Ok(PaginatedResponse::new(data, total, page, limit))
    }
}

#[async_trait]
impl UserStore for MemoryRequestLogStore {
    async fn get_or_create(&self, username: &str) -> Result<User> {
        self.round_trips.fetch_add(1, Ordering::Relaxed);

        let mut tables = self.tables.write();
        if let Some(user) = tables.users.values().find(|u| u.username == username) {
            return Ok(user.clone());
        }

        let user = User {
            id: tables.users.len() as i64 + 1,
            username: username.to_string(),
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, user_id: Option<i64>) -> NewRequestLog {
        let mut entry = NewRequestLog::started(Utc::now(), "GET", path);
        entry.view = "demo::logging".to_string();
        entry.remote_addr = "127.0.0.1".to_string();
        entry.host = "testserver".to_string();
        entry.user_id = user_id;
        entry.status_code = Some(200);
        entry
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryRequestLogStore::new();
        let id = store.insert(&entry("/a", None)).await.unwrap();

        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.log.path, "/a");
        assert!(fetched.user.is_none());
        assert!(store.get(id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_entry() {
        let store = MemoryRequestLogStore::new();
        let mut bad = entry("/a", None);
        bad.remote_addr = "nowhere".to_string();

        assert!(store.insert(&bad).await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failing_inserts() {
        let store = MemoryRequestLogStore::new();
        store.set_fail_inserts(true);

        let err = store.insert(&entry("/a", None)).await.unwrap_err();
        assert!(matches!(err, TrackingError::DatabaseConnection(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_list_resolves_users_in_constant_round_trips() {
        let store = MemoryRequestLogStore::new();
        let alice = store.get_or_create("alice").await.unwrap();
        let bob = store.get_or_create("bob").await.unwrap();

        for i in 0..60 {
            let user = if i % 2 == 0 { alice.id } else { bob.id };
            store.insert(&entry("/a", Some(user))).await.unwrap();
        }

        let before = store.round_trips();
        let page = store
            .list(&RequestLogListParams {
                limit: Some(100),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(store.round_trips() - before, 2);

        assert_eq!(page.total, 60);
        assert_eq!(page.data.len(), 60);
        assert!(page.data.iter().all(|row| row.user.is_some()));

        let before = store.round_trips();
        let small = store
            .list(&RequestLogListParams {
                limit: Some(5),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(store.round_trips() - before, 2);
        assert_eq!(small.data.len(), 5);
        assert_eq!(small.total_pages, 12);
    }

    #[tokio::test]
    async fn test_get_resolves_user_in_one_round_trip() {
        let store = MemoryRequestLogStore::new();
        let alice = store.get_or_create("alice").await.unwrap();
        let id = store.insert(&entry("/a", Some(alice.id))).await.unwrap();

        let before = store.round_trips();
        let found = store.get(id).await.unwrap().unwrap();
        assert_eq!(store.round_trips() - before, 1);
        assert_eq!(found.user.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn test_list_past_last_page_is_empty() {
        let store = MemoryRequestLogStore::new();
        store.insert(&entry("/a", None)).await.unwrap();

        let page = store
            .list(&RequestLogListParams {
                page: Some(i64::MAX),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(page.data.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.page, crate::models::MAX_PAGE);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let store = MemoryRequestLogStore::new();
        let alice = store.get_or_create("alice").await.unwrap();

        store.insert(&entry("/a", Some(alice.id))).await.unwrap();
        store.insert(&entry("/b", None)).await.unwrap();

        let by_user = store
            .list(&RequestLogListParams {
                user_id: Some(alice.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_user.total, 1);
        assert_eq!(
            by_user.data[0].user,
            Some(UserSummary {
                id: alice.id,
                username: "alice".to_string()
            })
        );

        let by_path = store
            .list(&RequestLogListParams {
                path: Some("/b".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_path.total, 1);
        assert_eq!(by_path.data[0].log.path, "/b");
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = MemoryRequestLogStore::new();
        let first = store.get_or_create("alice").await.unwrap();
        let second = store.get_or_create("alice").await.unwrap();
        assert_eq!(first.id, second.id);
    }
}
