//! Query context that only records what the stages ask for.

use async_trait::async_trait;
use sea_orm::{
    Condition, DatabaseConnection,
    sea_query::{
        Alias, Asterisk, ConditionalStatement, Order, OrderedStatement, Query,
        QueryStatementWriter, SelectStatement, SimpleExpr, SqliteQueryBuilder,
    },
};

use super::{QueryContext, RelationLoad, merge_relations};
use crate::ApiError;

pub(crate) struct RecordingQuery {
    pub statement: SelectStatement,
    pub with: Vec<RelationLoad>,
    pub with_count: Vec<RelationLoad>,
}

impl RecordingQuery {
    pub fn new() -> Self {
        Self {
            statement: Query::select()
                .column(Asterisk)
                .from(Alias::new("posts"))
                .to_owned(),
            with: Vec::new(),
            with_count: Vec::new(),
        }
    }

    pub fn sql(&self) -> String {
        self.statement.to_string(SqliteQueryBuilder)
    }

    pub fn load_names(&self) -> Vec<&str> {
        self.with.iter().map(RelationLoad::name).collect()
    }

    pub fn count_names(&self) -> Vec<&str> {
        self.with_count.iter().map(RelationLoad::name).collect()
    }
}

#[async_trait]
impl QueryContext for RecordingQuery {
    type Row = String;

    fn filter(&mut self, condition: Condition) {
        self.statement.cond_where(condition);
    }

    fn order_by(&mut self, expr: SimpleExpr, order: Order) {
        self.statement.order_by_expr(expr, order);
    }

    fn with(&mut self, relations: Vec<RelationLoad>) {
        merge_relations(&mut self.with, relations);
    }

    fn with_count(&mut self, relations: Vec<RelationLoad>) {
        merge_relations(&mut self.with_count, relations);
    }

    async fn get(self, _db: &DatabaseConnection) -> Result<Vec<String>, ApiError> {
        Ok(vec![self.sql()])
    }

    async fn paginate(
        self,
        _db: &DatabaseConnection,
        _page: u64,
        _per_page: u64,
    ) -> Result<(Vec<String>, u64), ApiError> {
        Ok((vec![self.sql()], 1))
    }
}

impl std::fmt::Debug for RecordingQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingQuery")
            .field("sql", &self.sql())
            .field("with", &self.load_names())
            .field(
                "with_count",
                &self.with_count.iter().map(RelationLoad::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
