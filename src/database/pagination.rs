use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page must be at least 1, got {0}")]
    InvalidPage(i64),

    #[error("pageSize must be between 1 and {max}, got {got}")]
    InvalidPageSize { got: i64, max: i64 },

    #[error("page {page} with pageSize {page_size} is out of range")]
    OffsetOverflow { page: i64, page_size: i64 },
}

impl PaginationError {
    /// Request parameter the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            PaginationError::InvalidPage(_) | PaginationError::OffsetOverflow { .. } => "page",
            PaginationError::InvalidPageSize { .. } => "pageSize",
        }
    }
}

/// Raw `?page=&pageSize=` query string parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// A validated page request: `page >= 1`, `1 <= page_size <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    page_size: i64,
    offset: i64,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64, max_page_size: i64) -> Result<Self, PaginationError> {
        if page < 1 {
            return Err(PaginationError::InvalidPage(page));
        }
        if page_size < 1 || page_size > max_page_size {
            return Err(PaginationError::InvalidPageSize { got: page_size, max: max_page_size });
        }
        let offset = (page - 1)
            .checked_mul(page_size)
            .ok_or(PaginationError::OffsetOverflow { page, page_size })?;
        Ok(Self { page, page_size, offset })
    }

    /// Fills missing parameters with the configured defaults, then validates.
    pub fn from_query(
        query: &PageQuery,
        default_page_size: i64,
        max_page_size: i64,
    ) -> Result<Self, PaginationError> {
        Self::new(
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(default_page_size),
            max_page_size,
        )
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}

/// One page of rows plus the total computed from the same filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub list: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(list: Vec<T>, total: i64, request: PageRequest) -> Self {
        let total_pages = if total <= 0 {
            0
        } else {
            (total + request.page_size - 1) / request.page_size
        };
        Self {
            list,
            total,
            page: request.page,
            page_size: request.page_size,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            list: self.list.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }
}
