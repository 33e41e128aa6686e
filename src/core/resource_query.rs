use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sea_orm::{
    Condition, ConnectionTrait, DatabaseConnection, DbBackend, EntityName, EntityTrait,
    FromQueryResult, Identity, QueryTrait, RelationDef, RelationType, Select, Value,
    sea_query::{
        Alias, Asterisk, ConditionalStatement, DynIden, Expr, Iden, Order, OrderedStatement,
        Query, SelectStatement, SimpleExpr, SubQueryStatement, TableRef,
    },
};
use serde_json::Value as JsonValue;

use super::{QueryContext, RelationLoad, merge_relations};
use crate::{ApiError, config::MAX_ROWS};

/// Sea-ORM backed [`QueryContext`].
///
/// Rows are materialized as JSON objects so relation counts (`{name}_count`) and
/// eager-loaded relations can be attached next to the entity columns. Every
/// relation a request may load or count has to be registered with
/// [`ResourceQuery::relation`]:
///
/// ```rust,ignore
/// let query = ResourceQuery::<post::Entity>::find()
///     .relation("comments", post::Relation::Comments.def())
///     .relation("author", post::Relation::Author.def());
/// ```
pub struct ResourceQuery<E: EntityTrait> {
    select: Select<E>,
    relations: HashMap<String, RelationDef>,
    with: Vec<RelationLoad>,
    with_count: Vec<RelationLoad>,
}

impl<E: EntityTrait> ResourceQuery<E> {
    pub fn new(select: Select<E>) -> Self {
        Self {
            select,
            relations: HashMap::new(),
            with: Vec::new(),
            with_count: Vec::new(),
        }
    }

    /// Start from `E::find()`
    #[must_use]
    pub fn find() -> Self {
        Self::new(E::find())
    }

    /// Make a relation available for eager loading and counting under `name`
    #[must_use]
    pub fn relation(mut self, name: impl Into<String>, def: RelationDef) -> Self {
        self.relations.insert(name.into(), def);
        self
    }

    /// Registered eager loads
    #[must_use]
    pub fn loads(&self) -> &[RelationLoad] {
        &self.with
    }

    /// Registered relation counts
    #[must_use]
    pub fn counts(&self) -> &[RelationLoad] {
        &self.with_count
    }

    /// Render the main statement, including count sub-selects
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a counted relation isn't registered.
    pub fn to_sql(&self, backend: DbBackend) -> Result<String, ApiError> {
        Ok(backend.build(&self.statement()?).to_string())
    }

    fn definition(&self, name: &str) -> Result<&RelationDef, ApiError> {
        self.relations.get(name).ok_or_else(|| {
            ApiError::configuration(format!(
                "Relation \"{name}\" is not registered on the {} query",
                E::default().table_name()
            ))
        })
    }

    fn statement(&self) -> Result<SelectStatement, ApiError> {
        let mut statement = self.select.as_query().clone();
        for count in &self.with_count {
            let expr = self.count_expression(count)?;
            statement.expr_as(expr, Alias::new(format!("{}_count", count.name())));
        }
        Ok(statement)
    }

    fn count_expression(&self, count: &RelationLoad) -> Result<SimpleExpr, ApiError> {
        let def = self.definition(count.name())?;
        let parent = (table_iden(&def.from_tbl)?, single_column(&def.from_col)?);
        let related = (table_iden(&def.to_tbl)?, single_column(&def.to_col)?);

        let mut sub_query = Query::select();
        sub_query
            .expr(Expr::col(Asterisk).count())
            .from(def.to_tbl.clone())
            .and_where(Expr::col(related).equals(parent));
        if let Some(loader) = count.loader() {
            loader(&mut sub_query);
        }

        Ok(SimpleExpr::SubQuery(
            None,
            Box::new(SubQueryStatement::SelectStatement(sub_query)),
        ))
    }

    async fn fetch(
        db: &DatabaseConnection,
        statement: &SelectStatement,
    ) -> Result<Vec<JsonValue>, ApiError> {
        let statement = db.get_database_backend().build(statement);
        tracing::trace!(sql = %statement, "Materializing resource query");
        JsonValue::find_by_statement(statement)
            .all(db)
            .await
            .map_err(ApiError::database)
    }

    /// One batched `IN (...)` query per relation, attached to each parent row
    async fn load_relations(
        &self,
        db: &DatabaseConnection,
        rows: &mut [JsonValue],
    ) -> Result<(), ApiError> {
        for load in &self.with {
            let def = self.definition(load.name())?;
            let parent_key = single_column(&def.from_col)?.to_string();
            let related_column = single_column(&def.to_col)?;
            let related_key = related_column.to_string();

            let mut seen = HashSet::new();
            let keys: Vec<Value> = rows
                .iter()
                .filter_map(|row| row.get(&parent_key))
                .filter(|key| seen.insert(key_of(key)))
                .filter_map(json_to_value)
                .collect();

            let related = if keys.is_empty() {
                Vec::new()
            } else {
                let mut sub_query = Query::select();
                sub_query
                    .column(Asterisk)
                    .from(def.to_tbl.clone())
                    .and_where(Expr::col((table_iden(&def.to_tbl)?, related_column)).is_in(keys));
                if let Some(loader) = load.loader() {
                    loader(&mut sub_query);
                }
                Self::fetch(db, &sub_query).await?
            };

            let mut grouped: HashMap<String, Vec<JsonValue>> = HashMap::new();
            for child in related {
                let key = child
                    .get(&related_key)
                    .filter(|key| !key.is_null())
                    .map(key_of);
                if let Some(key) = key {
                    grouped.entry(key).or_default().push(child);
                }
            }

            let many = matches!(def.rel_type, RelationType::HasMany);
            for row in rows.iter_mut() {
                let children = row
                    .get(&parent_key)
                    .and_then(|key| grouped.get(&key_of(key)))
                    .cloned()
                    .unwrap_or_default();
                let value = if many {
                    JsonValue::Array(children)
                } else {
                    children.into_iter().next().unwrap_or(JsonValue::Null)
                };
                if let JsonValue::Object(object) = row {
                    object.insert(load.name().to_string(), value);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<E: EntityTrait> QueryContext for ResourceQuery<E> {
    type Row = JsonValue;

    fn filter(&mut self, condition: Condition) {
        self.select.query().cond_where(condition);
    }

    fn order_by(&mut self, expr: SimpleExpr, order: Order) {
        self.select.query().order_by_expr(expr, order);
    }

    fn with(&mut self, relations: Vec<RelationLoad>) {
        merge_relations(&mut self.with, relations);
    }

    fn with_count(&mut self, relations: Vec<RelationLoad>) {
        merge_relations(&mut self.with_count, relations);
    }

    async fn get(self, db: &DatabaseConnection) -> Result<Vec<JsonValue>, ApiError> {
        let statement = self.statement()?;
        let mut rows = Self::fetch(db, &statement).await?;
        self.load_relations(db, &mut rows).await?;
        Ok(rows)
    }

    async fn paginate(
        self,
        db: &DatabaseConnection,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<JsonValue>, u64), ApiError> {
        let backend = db.get_database_backend();

        let mut count = Query::select();
        count
            .expr_as(Expr::col(Asterisk).count(), Alias::new("num_items"))
            .from_subquery(self.select.as_query().clone(), Alias::new("sub_query"));
        let total = match db.query_one(backend.build(&count)).await? {
            Some(row) => row.try_get::<i64>("", "num_items")?,
            None => 0,
        };

        let mut statement = self.statement()?;
        let per_page = per_page.min(MAX_ROWS);
        statement
            .limit(per_page)
            .offset(page.saturating_sub(1).saturating_mul(per_page).min(MAX_ROWS));
        let mut rows = Self::fetch(db, &statement).await?;
        self.load_relations(db, &mut rows).await?;

        Ok((rows, u64::try_from(total).unwrap_or_default()))
    }
}

fn table_iden(table: &TableRef) -> Result<DynIden, ApiError> {
    match table {
        TableRef::Table(name)
        | TableRef::SchemaTable(_, name)
        | TableRef::DatabaseSchemaTable(_, _, name) => Ok(name.clone()),
        _ => Err(ApiError::configuration(
            "Relations must target a plain table".to_string(),
        )),
    }
}

fn single_column(identity: &Identity) -> Result<DynIden, ApiError> {
    match identity {
        Identity::Unary(column) => Ok(column.clone()),
        _ => Err(ApiError::configuration(
            "Relations over composite keys are not supported".to_string(),
        )),
    }
}

fn key_of(value: &JsonValue) -> String {
    value.to_string()
}

fn json_to_value(value: &JsonValue) -> Option<Value> {
    match value {
        JsonValue::Number(number) => number
            .as_i64()
            .map(Value::from)
            .or_else(|| number.as_f64().map(Value::from)),
        JsonValue::String(text) => Some(Value::from(text.clone())),
        JsonValue::Bool(flag) => Some(Value::from(*flag)),
        _ => None,
    }
}
