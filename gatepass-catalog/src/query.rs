use gatepass_shared::EventQuery;

use crate::{CatalogError, CatalogResult};

pub const MAX_PAGE_SIZE: u32 = 100;

/// Reject queries the backend would answer with nonsense
pub fn validate_query(query: &EventQuery) -> CatalogResult<()> {
    if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        if start > end {
            return Err(CatalogError::InvalidQuery(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
    }

    if query.page == Some(0) {
        return Err(CatalogError::InvalidQuery("page numbers start at 1".to_string()));
    }

    if let Some(limit) = query.limit {
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(CatalogError::InvalidQuery(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
    }

    if query.keyword.as_deref().map(|k| k.trim().is_empty()).unwrap_or(false) {
        return Err(CatalogError::InvalidQuery("keyword must not be blank".to_string()));
    }

    Ok(())
}
