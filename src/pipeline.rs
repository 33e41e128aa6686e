//! Ordered resolution stages applied to one query.
//!
//! Each stage receives the query and the request parameters, applies its part
//! and either lets the next stage continue or aborts the whole pipeline with an
//! error. Nothing is materialized here; the caller decides when to run the
//! query (see [`crate::filtering::PaginateResults`]).

use std::sync::Arc;

use crate::{ApiError, core::QueryContext, params::QueryParams};

/// One step of request-to-query resolution.
pub trait Stage<Q: QueryContext>: Send + Sync {
    /// Apply this stage's part of the request to `query`
    ///
    /// # Errors
    ///
    /// Returning an error stops the pipeline; later stages don't run.
    fn handle(&self, query: &mut Q, params: &QueryParams) -> Result<(), ApiError>;
}

impl<Q, S> Stage<Q> for Arc<S>
where
    Q: QueryContext,
    S: Stage<Q> + ?Sized,
{
    fn handle(&self, query: &mut Q, params: &QueryParams) -> Result<(), ApiError> {
        (**self).handle(query, params)
    }
}

/// Stages applied in the order they were added.
///
/// ```rust,ignore
/// let mut query = ResourceQuery::<post::Entity>::find();
/// Pipeline::new()
///     .through(filters)
///     .through(orders)
///     .through(relations)
///     .run(&mut query, &params)?;
/// ```
pub struct Pipeline<Q: QueryContext> {
    stages: Vec<Arc<dyn Stage<Q>>>,
}

impl<Q: QueryContext> Default for Pipeline<Q> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<Q: QueryContext> Clone for Pipeline<Q> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
        }
    }
}

impl<Q: QueryContext> Pipeline<Q> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn through<S>(mut self, stage: S) -> Self
    where
        S: Stage<Q> + 'static,
    {
        self.stages.push(Arc::new(stage));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage on `query`, stopping at the first error
    ///
    /// # Errors
    ///
    /// The error of the first failing stage.
    pub fn run(&self, query: &mut Q, params: &QueryParams) -> Result<(), ApiError> {
        for stage in &self.stages {
            stage.handle(query, params)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::testing::RecordingQuery,
        filtering::{ColumnSpec, ResourceFilters, ResourceOrders},
    };

    struct Reject;

    impl Stage<RecordingQuery> for Reject {
        fn handle(&self, _query: &mut RecordingQuery, _params: &QueryParams) -> Result<(), ApiError> {
            Err(ApiError::bad_request("rejected"))
        }
    }

    #[test]
    fn test_stages_run_in_order() {
        let pipeline = Pipeline::new()
            .through(ResourceFilters::new().column("title", ColumnSpec::typed("string")))
            .through(ResourceOrders::new().default_order("id", "desc"));
        assert_eq!(pipeline.len(), 2);

        let mut query = RecordingQuery::new();
        pipeline
            .run(&mut query, &QueryParams::parse("title=a"))
            .unwrap();
        assert!(
            query
                .sql()
                .ends_with(r#"WHERE "title" = 'a' ORDER BY "id" DESC"#),
            "{}",
            query.sql()
        );
    }

    #[test]
    fn test_error_stops_later_stages() {
        let pipeline = Pipeline::new()
            .through(Reject)
            .through(ResourceOrders::new().default_order("id", "desc"));

        let mut query = RecordingQuery::new();
        let err = pipeline
            .run(&mut query, &QueryParams::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "rejected");
        assert!(!query.sql().contains("ORDER BY"));
    }

    #[test]
    fn test_empty_pipeline_is_noop() {
        let pipeline = Pipeline::<RecordingQuery>::new();
        assert!(pipeline.is_empty());
        let mut query = RecordingQuery::new();
        pipeline.run(&mut query, &QueryParams::default()).unwrap();
        assert_eq!(query.sql(), r#"SELECT * FROM "posts""#);
    }
}
