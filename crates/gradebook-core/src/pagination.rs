//! Page/limit pagination for listings.

use serde::{Deserialize, Serialize};

use crate::domain::{GradebookError, Result};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A validated page request (1-based page, `1..=100` items per page)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Result<Self> {
        if page < 1 {
            return Err(GradebookError::Validation(
                "page must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(GradebookError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }

    /// Cut this page out of the full, already ordered listing.
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(self.offset())
            .take(self.limit as usize)
            .collect();
        Page {
            items,
            total,
            page: self.page,
            limit: self.limit,
            total_pages: total_pages(total, self.limit),
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

/// `ceil(total / limit)`, 0 for an empty listing.
pub fn total_pages(total: u64, limit: u32) -> u64 {
    if total == 0 || limit == 0 {
        0
    } else {
        total.div_ceil(limit as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
    }

    #[test]
    fn test_request_bounds() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert!(PageRequest::new(1, 101).is_err());
        assert!(PageRequest::new(1, 100).is_ok());
    }

    #[test]
    fn test_slice() {
        let request = PageRequest::new(2, 3).unwrap();
        let page = request.slice((1..=7).collect::<Vec<_>>());

        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 7);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 2);
    }

    #[test]
    fn test_slice_past_end_is_empty() {
        let page = PageRequest::new(5, 10).unwrap().slice(vec![1, 2, 3]);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 1);
    }
}
