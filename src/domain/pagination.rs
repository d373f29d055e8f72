//! Pagination types.

use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;
use crate::error::{AppError, Result};

/// Page description attached to paged list envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMetadata {
    /// Current page (1-based).
    pub page_number: i64,

    /// Items per page.
    pub page_size: i64,

    /// Total items matching the query.
    pub total_count: i64,

    /// Total pages, `ceil(total_count / page_size)`.
    pub total_pages: i64,

    /// Whether a page follows this one.
    pub has_next_page: bool,

    /// Whether a page precedes this one.
    pub has_previous_page: bool,

    /// Search term the page was filtered by.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
}

impl PaginationMetadata {
    /// Compute metadata for a page.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `page_size` is not positive.
    pub fn create(
        page_number: i64,
        page_size: i64,
        total_count: i64,
        search_term: Option<String>,
    ) -> Result<Self> {
        if page_size <= 0 {
            return Err(AppError::invalid_field(
                "pageSize",
                "Page size must be greater than zero.",
            ));
        }

        let total_pages = (total_count.max(0) + page_size - 1) / page_size;

        Ok(Self {
            page_number,
            page_size,
            total_count,
            total_pages,
            has_next_page: page_number < total_pages,
            has_previous_page: page_number > 1,
            search_term,
        })
    }
}

/// Raw paging query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    /// Requested page; defaults to 1.
    pub page_number: Option<i64>,

    /// Requested page size; defaults to the configured default.
    pub page_size: Option<i64>,

    /// Optional case-insensitive filter.
    pub search_term: Option<String>,
}

impl PaginationParams {
    /// Resolve defaults and limits into a concrete page request.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-positive page size.
    pub fn resolve(self, limits: &PaginationConfig) -> Result<PageRequest> {
        let page_number = self.page_number.unwrap_or(1).max(1);
        let page_size = self.page_size.unwrap_or(limits.default_page_size);
        if page_size <= 0 {
            return Err(AppError::invalid_field(
                "pageSize",
                "Page size must be greater than zero.",
            ));
        }

        let search_term = self
            .search_term
            .map(|term| term.trim().to_string())
            .filter(|term| !term.is_empty());

        Ok(PageRequest {
            page_number,
            page_size: page_size.min(limits.max_page_size),
            search_term,
        })
    }
}

/// Validated page request handed to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number, at least 1.
    pub page_number: i64,
    /// Page size, within configured limits.
    pub page_size: i64,
    /// Trimmed, non-empty search term.
    pub search_term: Option<String>,
}

impl PageRequest {
    /// Rows to skip before this page.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page_number - 1) * self.page_size
    }

    /// Build the metadata for this page given the total row count.
    ///
    /// # Errors
    ///
    /// Propagates [`PaginationMetadata::create`] failures.
    pub fn metadata(&self, total_count: i64) -> Result<PaginationMetadata> {
        PaginationMetadata::create(
            self.page_number,
            self.page_size,
            total_count,
            self.search_term.clone(),
        )
    }
}

/// One page of items together with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paged<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Page description.
    pub pagination: PaginationMetadata,
}
