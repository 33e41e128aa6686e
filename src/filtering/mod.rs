//! # Request Parameter Resolution
//!
//! Each stage turns one family of query parameters into operations on a
//! [`QueryContext`](crate::QueryContext), checked against an allow-list that is
//! configured once when the stage is built.
//!
//! | Stage | Parameters |
//! |---|---|
//! | [`ResourceFilters`] | `column=value`, `column[operator]=value` |
//! | [`ResourceOrders`] | `order[0][asc]=column` |
//! | [`ResourceRelations`] | `with=a,b`, `with[]=a` |
//! | [`PaginateResults`] | `all=true`, `page=2`, `perPage=50` |
//!
//! ## Operators
//!
//! | Symbol | Condition | `string` | `numeric` | `boolean` | `date` |
//! |---|---|---|---|---|---|
//! | `eq` | `=` | ✓ | ✓ | ✓ | ✓ |
//! | `ne` | `!=` | ✓ | ✓ | ✓ | ✓ |
//! | `lt` / `lte` | `<` / `<=` | | ✓ | | ✓ |
//! | `gt` / `gte` | `>` / `>=` | | ✓ | | ✓ |
//! | `has` | `LIKE '%value%'` | ✓ | | | |
//! | `in` | `IN (a, b)` | | ✓ | | |
//! | `btw` | `BETWEEN a AND b` | | ✓ | | ✓ |
//!
//! ## Query Parameter Examples
//!
//! ```rust,ignore
//! // Equality
//! GET /posts?published=true
//!
//! // Substring, range and membership
//! GET /posts?title[has]=rust&views[btw]=10,100&author[in]=1,2,3
//!
//! // Ordering, relations and paging
//! GET /posts?order[0][desc]=created_at&with=comments,author&page=2&perPage=25
//! ```
//!
//! Parameters naming columns, operators or relations outside the allow-list are
//! dropped without an error. Malformed structure (a bad `order` entry, an unknown
//! operator, a `btw` value without two parts) is rejected with a 400.

pub mod conditions;
pub mod operators;
pub mod pagination;
pub mod relations;
pub mod sort;
pub mod value;

pub use conditions::{FilterArgs, FilterHandler, FilterHook, ResourceFilters};
pub use operators::{ColumnSpec, FieldType, Operator};
pub use pagination::{Page, PageLinks, PaginateResults, Paginated, calculate_content_range};
pub use relations::ResourceRelations;
pub use sort::{Direction, OrderDirective, OrderHandler, ResourceOrders};
pub use value::FilterValue;
