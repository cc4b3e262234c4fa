use serde::Serialize;

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        let total_pages = (total as f64 / limit as f64).ceil() as i64;
        PaginatedResponse {
            data,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

const MAX_LIMIT: i64 = 100;

/// Largest page whose offset still fits in an `i64` at the largest limit
pub const MAX_PAGE: i64 = i64::MAX / MAX_LIMIT;

/// Normalize page/limit query values: page in 1..=MAX_PAGE, limit in 1..=100 (default 50)
pub fn page_and_limit(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).clamp(1, MAX_PAGE);
    let limit = limit.unwrap_or(50).clamp(1, MAX_LIMIT);
    (page, limit)
}

/// Row offset of a normalized page
pub fn page_offset(page: i64, limit: i64) -> i64 {
    (page - 1).saturating_mul(limit)
}
