use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::error::Result;
use crate::models::{
    page_and_limit, page_offset, NewRequestLog, PaginatedResponse, RequestLogListParams, RequestLogRow,
    RequestLogWithUser,
};

use super::RequestLogStore;

const SELECT_WITH_USER: &str = r#"
    SELECT l.id, l.user_id, l.request_id, l.requested_at, l.response_ms,
           l.path, l.view, l.view_method, l.remote_addr, l.host, l.method,
           l.query_params, l.data, l.response, l.kind_of_cache_using,
           l.errors, l.status_code, u.username
    FROM api_request_logs l
    LEFT JOIN users u ON u.id = l.user_id
"#;

/// Repository for request log database operations
#[derive(Clone)]
pub struct RequestLogRepository {
    pool: PgPool,
}

impl RequestLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `COUNT(*)` of the logs matching `params`
fn count_query(params: &RequestLogListParams) -> QueryBuilder<'_, Postgres> {
    let mut query =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM api_request_logs l WHERE 1=1");
    push_filters(&mut query, params);
    query
}

/// One page of matching logs, each row already joined with its user
fn page_query(
    params: &RequestLogListParams,
    limit: i64,
    offset: i64,
) -> QueryBuilder<'_, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(SELECT_WITH_USER);
    query.push(" WHERE 1=1");
    push_filters(&mut query, params);
    query
        .push(" ORDER BY l.requested_at DESC, l.id DESC")
        .push(" LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    query
}

/// Append the WHERE conditions for `params` (the query must already contain `WHERE 1=1`)
fn push_filters<'a>(query: &mut QueryBuilder<'a, Postgres>, params: &'a RequestLogListParams) {
    if let Some(user_id) = params.user_id {
        query.push(" AND l.user_id = ").push_bind(user_id);
    }
    if let Some(ref method) = params.method {
        if !method.is_empty() {
            query
                .push(" AND l.method = ")
                .push_bind(method.to_uppercase());
        }
    }
    if let Some(ref path) = params.path {
        if !path.is_empty() {
            query.push(" AND l.path = ").push_bind(path);
        }
    }
    if let Some(ref view) = params.view {
        if !view.is_empty() {
            query.push(" AND l.view = ").push_bind(view);
        }
    }
    if let Some(status_code) = params.status_code {
        query.push(" AND l.status_code = ").push_bind(status_code);
    }
    if let Some(start_time) = params.start_time {
        query.push(" AND l.requested_at >= ").push_bind(start_time);
    }
    if let Some(end_time) = params.end_time {
        query.push(" AND l.requested_at <= ").push_bind(end_time);
    }
}

#[async_trait]
impl RequestLogStore for RequestLogRepository {
    async fn insert(&self, entry: &NewRequestLog) -> Result<i64> {
        entry.validate()?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO api_request_logs
            (user_id, request_id, requested_at, response_ms, path, view, view_method,
             remote_addr, host, method, query_params, data, response,
             kind_of_cache_using, errors, status_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING id
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.request_id)
        .bind(entry.requested_at)
        .bind(entry.response_ms)
        .bind(&entry.path)
        .bind(&entry.view)
        .bind(&entry.view_method)
        .bind(&entry.remote_addr)
        .bind(&entry.host)
        .bind(&entry.method)
        .bind(&entry.query_params)
        .bind(&entry.data)
        .bind(&entry.response)
        .bind(entry.kind_of_cache_using.map(|c| c.as_i16()))
        .bind(&entry.errors)
        .bind(entry.status_code)
        .fetch_one(&self.pool)
        .await?;

        debug!(id, method = %entry.method, path = %entry.path, "Inserted request log");

        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Option<RequestLogWithUser>> {
        let mut query = QueryBuilder::<Postgres>::new(SELECT_WITH_USER);
        query.push(" WHERE l.id = ").push_bind(id);

        let row: Option<RequestLogRow> = query.build_query_as().fetch_optional(&self.pool).await?;

        Ok(row.map(RequestLogWithUser::from))
    }

    /// Two round trips per call: one count, one page joined with `users`.
    async fn list(
        &self,
        params: &RequestLogListParams,
    ) -> Result<PaginatedResponse<RequestLogWithUser>> {
        let (page, limit) = page_and_limit(params.page, params.limit);
        let offset = page_offset(page, limit);

        let total: i64 = count_query(params)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut data_query = page_query(params, limit, offset);
        let rows: Vec<RequestLogRow> = data_query.build_query_as().fetch_all(&self.pool).await?;
        let data = rows.into_iter().map(RequestLogWithUser::from).collect();

        Ok(PaginatedResponse::new(data, total, page, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_joins_users_once() {
        let params = RequestLogListParams {
            method: Some("get".to_string()),
            ..Default::default()
        };
        let query = page_query(&params, 50, 0);
        let sql = query.sql();

        assert_eq!(sql.matches("SELECT").count(), 1);
        assert_eq!(sql.matches("JOIN").count(), 1);
        assert!(sql.contains("LEFT JOIN users u ON u.id = l.user_id"));
        assert!(sql.contains("u.username"));
        assert!(sql.contains("AND l.method = $1"));
        assert!(sql.ends_with("LIMIT $2 OFFSET $3"));
    }

    #[test]
    fn test_count_query_uses_same_filters() {
        let params = RequestLogListParams {
            method: Some("get".to_string()),
            status_code: Some(200),
            ..Default::default()
        };
        let query = count_query(&params);
        let sql = query.sql();

        assert!(sql.starts_with("SELECT COUNT(*) FROM api_request_logs l"));
        assert!(!sql.contains("JOIN"));
        assert!(sql.contains("AND l.method = $1"));
        assert!(sql.contains("AND l.status_code = $2"));
    }

    #[test]
    fn test_huge_page_offset_binds() {
        let (page, limit) = page_and_limit(Some(i64::MAX), Some(100));
        let offset = page_offset(page, limit);
        assert!(offset >= 0);

        let params = RequestLogListParams::default();
        assert!(page_query(&params, limit, offset).sql().ends_with("LIMIT $1 OFFSET $2"));
    }
}
