//! # Resource Index Operation
//!
//! [`ResourceIndex`] is the read side of a resource endpoint put together: the
//! resolution stages run in order on a fresh query, then the pagination stage
//! materializes it.
//!
//! ```rust,ignore
//! use querycrate::{ResourceIndex, ResourceQuery, ResourceFilters, ResourceOrders, ColumnSpec};
//!
//! let posts = ResourceIndex::new(PaginateResults::new(config.pagination.clone()))
//!     .through(ResourceFilters::new().column("title", ColumnSpec::typed("string")))
//!     .through(ResourceOrders::new().default_order("created_at", "desc"));
//!
//! async fn list_posts(
//!     State(state): State<AppState>,
//!     OriginalUri(uri): OriginalUri,
//!     params: QueryParams,
//! ) -> Result<Paginated<serde_json::Value>, ApiError> {
//!     let query = ResourceQuery::<post::Entity>::find()
//!         .relation("comments", post::Relation::Comments.def());
//!     state.posts.list(query, &params, &state.db, uri.path()).await
//! }
//! ```

use sea_orm::DatabaseConnection;

use crate::{
    ApiError,
    core::QueryContext,
    filtering::{PaginateResults, Paginated},
    params::QueryParams,
    pipeline::{Pipeline, Stage},
};

/// Resolution stages plus the terminal pagination stage of a list endpoint.
pub struct ResourceIndex<Q: QueryContext> {
    pipeline: Pipeline<Q>,
    paginate: PaginateResults,
}

impl<Q: QueryContext> Default for ResourceIndex<Q> {
    fn default() -> Self {
        Self::new(PaginateResults::default())
    }
}

impl<Q: QueryContext> Clone for ResourceIndex<Q> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            paginate: self.paginate.clone(),
        }
    }
}

impl<Q: QueryContext> ResourceIndex<Q> {
    #[must_use]
    pub fn new(paginate: PaginateResults) -> Self {
        Self {
            pipeline: Pipeline::new(),
            paginate,
        }
    }

    /// Add a resolution stage; stages run in the order they are added
    #[must_use]
    pub fn through<S>(mut self, stage: S) -> Self
    where
        S: Stage<Q> + 'static,
    {
        self.pipeline = self.pipeline.through(stage);
        self
    }

    /// Apply every stage to `query` without materializing it
    ///
    /// # Errors
    ///
    /// The error of the first failing stage.
    pub fn resolve(&self, query: &mut Q, params: &QueryParams) -> Result<(), ApiError> {
        self.pipeline.run(query, params)
    }

    /// Resolve `query` for this request and materialize the result
    ///
    /// # Errors
    ///
    /// The first stage error, or whatever materialization returns.
    pub async fn list(
        &self,
        mut query: Q,
        params: &QueryParams,
        db: &DatabaseConnection,
        path: &str,
    ) -> Result<Paginated<Q::Row>, ApiError> {
        self.resolve(&mut query, params)?;
        self.paginate.handle(query, params, db, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::PaginationConfig,
        core::testing::RecordingQuery,
        filtering::{ColumnSpec, ResourceFilters, ResourceOrders, ResourceRelations},
    };
    use sea_orm::Database;

    fn index() -> ResourceIndex<RecordingQuery> {
        ResourceIndex::new(PaginateResults::new(PaginationConfig::default()))
            .through(ResourceFilters::new().column("title", ColumnSpec::typed("string")))
            .through(ResourceOrders::new().default_order("id", "asc").column("title"))
            .through(ResourceRelations::new().relation("comments"))
    }

    #[test]
    fn test_resolve_runs_every_stage() {
        let mut query = RecordingQuery::new();
        index()
            .resolve(
                &mut query,
                &QueryParams::parse("title[has]=a&order[0][desc]=title&with=comments"),
            )
            .unwrap();
        assert!(
            query
                .sql()
                .ends_with(r#"WHERE "title" LIKE '%a%' ORDER BY "title" DESC"#),
            "{}",
            query.sql()
        );
        assert_eq!(query.load_names(), vec!["comments"]);
    }

    #[tokio::test]
    async fn test_list_materializes_resolved_query() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let result = index()
            .list(
                RecordingQuery::new(),
                &QueryParams::parse("title=a&all=1"),
                &db,
                "/posts",
            )
            .await
            .unwrap();
        let Paginated::All(rows) = result else {
            panic!("expected every row");
        };
        assert!(rows[0].contains(r#"WHERE "title" = 'a'"#), "{}", rows[0]);
    }

    #[tokio::test]
    async fn test_list_stops_on_stage_error() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let err = index()
            .list(
                RecordingQuery::new(),
                &QueryParams::parse("order[0][up]=title"),
                &db,
                "/posts",
            )
            .await
            .unwrap_err();
        assert!(err.is_client_error());
    }
}
