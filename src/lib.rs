//! # querycrate
//!
//! Allow-listed translation of HTTP query parameters into Sea-ORM queries.
//!
//! A list endpoint declares which columns can be filtered (and with which
//! operators), which can be sorted, and which relations can be eager loaded.
//! Each request's query string is then resolved against those allow-lists into
//! conditions, ordering and relation loads on a [`QueryContext`], and finally
//! materialized in full or as a page.
//!
//! ```rust,ignore
//! use querycrate::{
//!     ColumnSpec, PaginateResults, PaginationConfig, ResourceFilters, ResourceIndex,
//!     ResourceOrders, ResourceQuery, ResourceRelations,
//! };
//!
//! let posts = ResourceIndex::new(PaginateResults::new(PaginationConfig::default()))
//!     .through(
//!         ResourceFilters::new()
//!             .column("title", ColumnSpec::typed("string"))
//!             .column("views", ColumnSpec::typed("numeric")),
//!     )
//!     .through(ResourceOrders::new().default_order("created_at", "desc").column("views"))
//!     .through(ResourceRelations::new().relation("comments"));
//!
//! // GET /posts?title[has]=rust&views[gte]=100&order[0][desc]=views&with=comments
//! let query = ResourceQuery::<post::Entity>::find()
//!     .relation("comments", post::Relation::Comments.def());
//! let page = posts.list(query, &params, &db, "/posts").await?;
//! ```
//!
//! Parameters outside the allow-lists are ignored. Structurally broken
//! parameters are rejected with a 400 [`ApiError`] describing the expected
//! syntax, and a broken resource definition is a 500.

pub mod config;
pub mod core;
pub mod errors;
pub mod filtering;
pub mod operations;
pub mod params;
pub mod pipeline;
pub mod request;
pub mod validation;

pub use config::PaginationConfig;
pub use crate::core::{QueryContext, RelationLoad, RelationLoader, ResourceQuery, column_ref};
pub use errors::ApiError;
pub use filtering::{
    ColumnSpec, FieldType, FilterArgs, FilterValue, Operator, Page, PageLinks, PaginateResults,
    Paginated, ResourceFilters, ResourceOrders, ResourceRelations,
};
pub use operations::ResourceIndex;
pub use params::{ParamValue, QueryParams};
pub use pipeline::{Pipeline, Stage};
pub use request::{RequestIdentity, ResourceRequest, RouteName};
pub use validation::{Validatable, ValidationError, ValidationErrors};

pub use sea_orm::sea_query;
