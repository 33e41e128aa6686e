use axum::{
    Json,
    http::header::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use url::form_urlencoded;

use crate::{ApiError, config::PaginationConfig, core::QueryContext, params::QueryParams};

/// Materializes the resolved query, in full or one page at a time.
///
/// This is the terminal step of a list endpoint: it runs the query instead of
/// handing it on. `?all=true` returns every row, otherwise `?page=N&perPage=M`
/// select one page. Parameter names come from [`PaginationConfig`].
#[derive(Debug, Clone, Default)]
pub struct PaginateResults {
    config: PaginationConfig,
    resource_name: Option<String>,
}

impl PaginateResults {
    #[must_use]
    pub fn new(config: PaginationConfig) -> Self {
        Self {
            config,
            resource_name: None,
        }
    }

    /// Unit used in the `Content-Range` header, `items` by default
    #[must_use]
    pub fn resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    /// Run `query` against `db`
    ///
    /// `path` is the request path the page links point at; every query parameter
    /// except the page number is carried over into the links.
    ///
    /// # Errors
    ///
    /// Whatever the query context returns while materializing.
    pub async fn handle<Q: QueryContext>(
        &self,
        query: Q,
        params: &QueryParams,
        db: &DatabaseConnection,
        path: &str,
    ) -> Result<Paginated<Q::Row>, ApiError> {
        if params.boolean(&self.config.all_param) {
            return Ok(Paginated::All(query.get(db).await?));
        }

        let per_page = self
            .config
            .per_page(params.integer(&self.config.per_page_param));
        let page = self
            .config
            .page(params.integer(&self.config.page_param), per_page);

        let (data, total) = query.paginate(db, page, per_page).await?;
        tracing::debug!(page, per_page, total, "Paginated resource query");

        Ok(Paginated::Page(Page::new(
            data,
            page,
            per_page,
            total,
            &PageLinks::builder(path, params, &self.config.page_param),
            self.resource_name.as_deref().unwrap_or("items"),
        )))
    }
}

/// Result of [`PaginateResults::handle`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Paginated<T> {
    /// Every row, `?all=true`
    All(Vec<T>),
    /// One page with its metadata
    Page(Page<T>),
}

impl<T> Paginated<T> {
    /// Rows of the result, whichever shape it has
    #[must_use]
    pub fn rows(&self) -> &[T] {
        match self {
            Self::All(rows) => rows,
            Self::Page(page) => &page.data,
        }
    }
}

/// One page of rows with the metadata clients need to walk the collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
    /// 1-based position of the first row, `None` for an empty page
    pub from: Option<u64>,
    /// 1-based position of the last row, `None` for an empty page
    pub to: Option<u64>,
    pub links: PageLinks,
    #[serde(skip)]
    resource_name: String,
}

impl<T> Page<T> {
    fn new(
        data: Vec<T>,
        current_page: u64,
        per_page: u64,
        total: u64,
        links: &LinkBuilder<'_>,
        resource_name: &str,
    ) -> Self {
        let last_page = total.div_ceil(per_page.max(1)).max(1);
        let offset = current_page.saturating_sub(1).saturating_mul(per_page);
        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            (
                Some(offset.saturating_add(1)),
                Some(offset.saturating_add(data.len() as u64)),
            )
        };

        Self {
            data,
            current_page,
            per_page,
            total,
            last_page,
            from,
            to,
            links: PageLinks {
                first: links.page(1),
                last: links.page(last_page),
                prev: (current_page > 1).then(|| links.page(current_page - 1)),
                next: (current_page < last_page).then(|| links.page(current_page + 1)),
            },
            resource_name: resource_name.to_string(),
        }
    }

    /// `Content-Range` header for this page
    #[must_use]
    pub fn content_range(&self) -> HeaderMap {
        calculate_content_range(
            self.current_page.saturating_sub(1).saturating_mul(self.per_page),
            self.per_page,
            self.total,
            &self.resource_name,
        )
    }
}

/// Links to neighbouring pages, keeping the original query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLinks {
    pub first: String,
    pub last: String,
    pub prev: Option<String>,
    pub next: Option<String>,
}

impl PageLinks {
    fn builder<'a>(path: &'a str, params: &'a QueryParams, page_param: &'a str) -> LinkBuilder<'a> {
        LinkBuilder {
            path,
            params,
            page_param,
        }
    }
}

struct LinkBuilder<'a> {
    path: &'a str,
    params: &'a QueryParams,
    page_param: &'a str,
}

impl LinkBuilder<'_> {
    fn page(&self, page: u64) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(
                self.params
                    .pairs()
                    .iter()
                    .filter(|(key, _)| key != self.page_param),
            )
            .append_pair(self.page_param, &page.to_string())
            .finish();
        format!("{}?{query}", self.path)
    }
}

impl<T: Serialize> IntoResponse for Paginated<T> {
    fn into_response(self) -> Response {
        match self {
            Self::All(rows) => Json(rows).into_response(),
            Self::Page(page) => (page.content_range(), Json(page)).into_response(),
        }
    }
}

/// Remove characters that can't appear in a header value
fn sanitize_resource_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect()
}

/// `Content-Range: {resource} {first}-{last}/{total}` for a page starting at `offset`.
#[must_use]
pub fn calculate_content_range(
    offset: u64,
    limit: u64,
    total_count: u64,
    resource_name: &str,
) -> HeaderMap {
    let max_offset_limit = offset
        .saturating_add(limit)
        .saturating_sub(1)
        .min(total_count.saturating_sub(1));
    let safe_name = sanitize_resource_name(resource_name);

    let mut headers = HeaderMap::new();
    let value: Result<HeaderValue, _> = format!("{safe_name} {offset}-{max_offset_limit}/{total_count}")
        .parse()
        .or_else(|_| format!("items {offset}-{max_offset_limit}/{total_count}").parse());
    if let Ok(value) = value {
        headers.insert("Content-Range", value);
    }
    headers
}
