use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Raw `?page=&limit=` query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Validated page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Result<Self, String> {
        if page < 1 {
            return Err("page must be at least 1".to_string());
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(format!("limit must be between 1 and {}", MAX_LIMIT));
        }
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl TryFrom<PaginationQuery> for Pagination {
    type Error = String;

    fn try_from(query: PaginationQuery) -> Result<Self, Self::Error> {
        Pagination::new(
            query.page.unwrap_or(DEFAULT_PAGE),
            query.limit.unwrap_or(DEFAULT_LIMIT),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total_items: i64,
    pub current_page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total_items: i64, pagination: Pagination) -> Self {
        let total_pages = (total_items + pagination.limit - 1) / pagination.limit;
        Self {
            data,
            total_items,
            current_page: pagination.page,
            per_page: pagination.limit,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_bounds() {
        let p = Pagination::try_from(PaginationQuery::default()).unwrap();
        assert_eq!(p, Pagination { page: 1, limit: 10 });

        assert!(Pagination::new(0, 10).is_err());
        assert!(Pagination::new(1, 0).is_err());
        assert!(Pagination::new(1, 101).is_err());
        assert!(Pagination::new(1, 100).is_ok());
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page = PaginatedResponse::new(vec![1, 2], 21, Pagination::new(3, 10).unwrap());
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.current_page, 3);

        let empty: PaginatedResponse<i32> = PaginatedResponse::new(vec![], 0, Pagination::default());
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_offset() {
        assert_eq!(Pagination::new(3, 25).unwrap().offset(), 50);
    }
}
