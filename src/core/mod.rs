//! The query-building collaborator every resolution stage writes into.
//!
//! Stages never talk to the database. They only call the operations of
//! [`QueryContext`]: add a condition, add an ordering, register eager loads and
//! relation counts. Materialization (`get` / `paginate`) happens once, at the end
//! of the pipeline. [`ResourceQuery`] is the Sea-ORM backed implementation.

pub mod resource_query;
#[cfg(test)]
pub(crate) mod testing;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use sea_orm::{
    Condition, DatabaseConnection,
    sea_query::{Alias, ColumnRef, IntoColumnRef, Order, SelectStatement, SimpleExpr},
};

use crate::ApiError;

pub use resource_query::ResourceQuery;

/// Constrains the sub-query of an eager load or relation count.
///
/// For an eager load the statement selects the related rows; for a count it is
/// the correlated `COUNT(*)` sub-select.
pub type RelationLoader = Arc<dyn Fn(&mut SelectStatement) + Send + Sync>;

/// A relation to eager load or count, optionally with a custom loader.
#[derive(Clone)]
pub struct RelationLoad {
    name: String,
    loader: Option<RelationLoader>,
}

impl RelationLoad {
    /// Load the relation with its default query
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loader: None,
        }
    }

    /// Load the relation through `loader`
    pub fn custom(name: impl Into<String>, loader: RelationLoader) -> Self {
        Self {
            name: name.into(),
            loader: Some(loader),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn loader(&self) -> Option<&RelationLoader> {
        self.loader.as_ref()
    }

    #[must_use]
    pub fn is_custom(&self) -> bool {
        self.loader.is_some()
    }
}

impl fmt::Debug for RelationLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationLoad")
            .field("name", &self.name)
            .field("custom", &self.is_custom())
            .finish()
    }
}

impl PartialEq for RelationLoad {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && match (&self.loader, &other.loader) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

/// Operations the resolution stages need from the downstream query builder.
#[async_trait]
pub trait QueryContext: Send {
    /// Materialized row type
    type Row: Send;

    /// Add a condition (AND-ed with the existing ones)
    fn filter(&mut self, condition: Condition);

    /// Append an ordering
    fn order_by(&mut self, expr: SimpleExpr, order: Order);

    /// Register relations to eager load; a name registered twice keeps the last loader
    fn with(&mut self, relations: Vec<RelationLoad>);

    /// Register relations to count
    fn with_count(&mut self, relations: Vec<RelationLoad>);

    /// Materialize every matching row
    async fn get(self, db: &DatabaseConnection) -> Result<Vec<Self::Row>, ApiError>
    where
        Self: Sized;

    /// Materialize one 1-based page, returning the rows and the total row count
    async fn paginate(
        self,
        db: &DatabaseConnection,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<Self::Row>, u64), ApiError>
    where
        Self: Sized;
}

/// Column reference for an allow-listed name; `table.column` is qualified
#[must_use]
pub fn column_ref(name: &str) -> ColumnRef {
    match name.split_once('.') {
        Some((table, column)) => (Alias::new(table), Alias::new(column)).into_column_ref(),
        None => Alias::new(name).into_column_ref(),
    }
}

/// Merge `incoming` into `target` by relation name, keeping first-seen order
pub(crate) fn merge_relations(target: &mut Vec<RelationLoad>, incoming: Vec<RelationLoad>) {
    for relation in incoming {
        match target.iter_mut().find(|existing| existing.name == relation.name) {
            Some(existing) => *existing = relation,
            None => target.push(relation),
        }
    }
}
