use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Page-number pagination query (`?page=N`, 1-based).
#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams, Validate)]
pub struct PageQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 100000))]
    pub page: Option<u64>,
}

impl PageQuery {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }
}

/// One page of results together with the total number of matching items.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub count: u64,
    /// Current page number (1-based)
    pub page: u64,
    pub page_size: u64,
    pub num_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, count: u64, page: u64, page_size: u64) -> Self {
        let num_pages = if page_size == 0 { 0 } else { count.div_ceil(page_size) };
        Self {
            items,
            count,
            page,
            page_size,
            num_pages,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            num_pages: self.num_pages,
        }
    }
}
