//! Pagination and result types for managing query results.
//!
//! Pages are 0-indexed: page `k` of size `p` is the window `skip(k * p).limit(p)`
//! of the sorted result set.

use serde::{Deserialize, Serialize};

use crate::query::Query;

/// A single page of paginated results.
///
/// # Example
///
/// ```ignore
/// use docquery::page::Page;
///
/// let page: Page<String> = Page::builder(vec!["item1".to_string()])
///     .with_count(100)
///     .with_next_page(Some(1))
///     .build();
///
/// assert_eq!(page.items.len(), 1);
/// assert_eq!(page.count, 100);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// Total number of matching items across all pages.
    pub count: usize,
    /// The next page number (if more pages exist).
    pub next_page: Option<usize>,
    /// The previous page number (if this is not the first page).
    pub previous_page: Option<usize>,
}

impl<T> Page<T> {
    /// Creates a new builder for constructing a page.
    pub fn builder(items: Vec<T>) -> PageBuilder<T> {
        PageBuilder::new(items)
    }

    /// Converts the items of this page, keeping the navigation metadata.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<Vec<_>, E>>()?,
            count: self.count,
            next_page: self.next_page,
            previous_page: self.previous_page,
        })
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }
}

/// Builder for constructing [`Page`] instances with fluent API.
pub struct PageBuilder<T> {
    items: Vec<T>,
    count: usize,
    next_page: Option<usize>,
    previous_page: Option<usize>,
}

impl<T> PageBuilder<T> {
    /// Creates a new builder with the given items.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }

    /// Sets the total count of items across all pages.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Sets the next page number (or `None` if this is the last page).
    pub fn with_next_page(mut self, next_page: Option<usize>) -> Self {
        self.next_page = next_page;
        self
    }

    /// Sets the previous page number (or `None` if this is the first page).
    pub fn with_previous_page(mut self, previous_page: Option<usize>) -> Self {
        self.previous_page = previous_page;
        self
    }

    /// Builds and returns the final [`Page`] instance.
    pub fn build(self) -> Page<T> {
        Page {
            items: self.items,
            count: self.count,
            next_page: self.next_page,
            previous_page: self.previous_page,
        }
    }
}

/// Parameters for paginating through result sets.
///
/// # Example
///
/// ```ignore
/// use docquery::page::PaginationParams;
///
/// // Second page of five books
/// let params = PaginationParams::new(1, 5);
/// assert_eq!(params.skip(), 5);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PaginationParams {
    /// The page number (0-indexed).
    pub page: usize,
    /// Number of items per page.
    pub per_page: usize,
}

impl PaginationParams {
    /// Creates new pagination parameters.
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    /// Number of items to skip to reach this page.
    pub fn skip(&self) -> usize {
        self.page.saturating_mul(self.per_page)
    }

    /// Sets skip and limit on a query so that it returns exactly this page.
    pub fn apply(&self, query: Query) -> Query {
        Query {
            skip: Some(self.skip()),
            limit: Some(self.per_page),
            ..query
        }
    }

    /// Wraps the items of this page with navigation metadata.
    ///
    /// `count` is the number of items matching the query across all pages.
    pub fn page<T>(&self, items: Vec<T>, count: usize) -> Page<T> {
        let end = self.skip().saturating_add(items.len());

        Page::builder(items)
            .with_count(count)
            .with_next_page((self.per_page > 0 && end < count).then(|| self.page.saturating_add(1)))
            .with_previous_page(self.page.checked_sub(1))
            .build()
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 0, per_page: 10 }
    }
}
