use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

/// Pagination parameters for list operations
#[derive(Debug, Clone, Deserialize, Serialize, IntoParams)]
pub struct PaginationParams {
    /// Page number, starting at 1
    #[serde(default = "default_page")]
    pub page: u64,
    /// Items per page
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationParams {
    /// Page size with the configured ceiling applied.
    pub fn capped_per_page(&self, max: u64) -> u64 {
        self.per_page.clamp(1, max.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_params_fall_back_to_defaults() {
        let params: PaginationParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 20);
    }

    #[test]
    fn per_page_is_capped() {
        let params = PaginationParams {
            page: 1,
            per_page: 5000,
        };
        assert_eq!(params.capped_per_page(100), 100);

        let params = PaginationParams {
            page: 1,
            per_page: 0,
        };
        assert_eq!(params.capped_per_page(100), 1);
    }
}
