use serde::Deserialize;

/// Largest row count or offset the SQL drivers accept (`LIMIT` / `OFFSET` are
/// bound as signed 64-bit integers)
pub const MAX_ROWS: u64 = i64::MAX.unsigned_abs();

/// Names and defaults used by the pagination stage.
///
/// The parameter names are part of the public API of every list endpoint, so they
/// are configured once when the stage is built and never change afterwards.
/// Deserializable so it can live next to the rest of the application config:
///
/// ```rust,ignore
/// let config: PaginationConfig = serde_json::from_str(r#"{"per_page_param": "limit"}"#)?;
/// let paginate = PaginateResults::new(config);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Boolean flag that disables pagination, e.g. `?all=true`
    pub all_param: String,
    /// Page size override, e.g. `?perPage=50`
    pub per_page_param: String,
    /// 1-based page number, e.g. `?page=2`
    pub page_param: String,
    /// Page size when the request doesn't supply a usable one
    pub default_per_page: u64,
    /// Upper bound for request-supplied page sizes
    pub max_per_page: Option<u64>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            all_param: "all".to_string(),
            per_page_param: "perPage".to_string(),
            page_param: "page".to_string(),
            default_per_page: 15,
            max_per_page: None,
        }
    }
}

impl PaginationConfig {
    #[must_use]
    pub fn with_default_per_page(mut self, per_page: u64) -> Self {
        self.default_per_page = per_page;
        self
    }

    #[must_use]
    pub fn with_max_per_page(mut self, max: u64) -> Self {
        self.max_per_page = Some(max);
        self
    }

    /// Resolve the page size for a request-supplied value
    ///
    /// Never exceeds [`MAX_ROWS`], whatever the request or config says.
    #[must_use]
    pub fn per_page(&self, requested: Option<u64>) -> u64 {
        let per_page = requested
            .filter(|size| *size > 0)
            .unwrap_or(self.default_per_page)
            .clamp(1, MAX_ROWS);
        self.max_per_page.map_or(per_page, |max| per_page.min(max.max(1)))
    }

    /// Resolve the 1-based page number for a request-supplied value
    ///
    /// Missing or zero pages are page 1. Pages whose offset can't be bound by
    /// the database driver are clamped to the last addressable one.
    #[must_use]
    pub fn page(&self, requested: Option<u64>, per_page: u64) -> u64 {
        let last_addressable = MAX_ROWS / per_page.max(1) + 1;
        requested
            .filter(|page| *page > 0)
            .unwrap_or(1)
            .min(last_addressable)
    }
}
