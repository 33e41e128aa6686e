use std::{collections::HashMap, sync::Arc};

use sea_orm::{
    Condition,
    sea_query::{BinOper, Expr},
};

use super::{
    operators::{ColumnSpec, FieldType, Operator},
    value::{FilterValue, bind},
};
use crate::{
    ApiError,
    core::{QueryContext, column_ref},
    params::{ParamValue, QueryParams},
    pipeline::Stage,
};

/// What a custom filter handler receives for one `column[operator]=value`.
#[derive(Debug)]
pub struct FilterArgs<'a> {
    /// Allow-listed column name as used in the query string
    pub column: &'a str,
    /// Storage-level operator (`=`, `LIKE`, `BETWEEN`, ...)
    pub operator: BinOper,
    /// Coerced value
    pub value: &'a FilterValue,
    /// Value exactly as received
    pub raw: &'a ParamValue,
}

/// Builds the condition for one column, replacing the default comparison.
pub type FilterHandler = Arc<dyn Fn(&FilterArgs<'_>) -> Result<Condition, ApiError> + Send + Sync>;

/// Adds a constraint before or after the request filters; `None` adds nothing.
pub type FilterHook = Arc<dyn Fn(&QueryParams) -> Option<Condition> + Send + Sync>;

/// Translates `column=value` and `column[operator]=value` parameters into conditions.
///
/// Only allow-listed columns are considered, and for each column only the
/// operators its [`ColumnSpec`] allows. Everything else in the request is ignored
/// without an error.
///
/// ```rust,ignore
/// let filters = ResourceFilters::new()
///     .column("title", ColumnSpec::typed("string"))
///     .column("views", ColumnSpec::typed("numeric"))
///     .column("author", ColumnSpec::operators(["eq", "in"]))
///     .map_column("author", "author_id")
///     .handler("published", |args| Ok(published_condition(args)));
///
/// // GET /posts?title[has]=rust&views[btw]=10,100&author=3
/// filters.apply(&mut query, &params)?;
/// ```
#[derive(Clone, Default)]
pub struct ResourceFilters {
    allowed_columns: Vec<(String, ColumnSpec)>,
    column_mappings: HashMap<String, String>,
    handlers: HashMap<String, FilterHandler>,
    before: Vec<FilterHook>,
    after: Vec<FilterHook>,
}

impl ResourceFilters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow filtering on `column` with the operators in `spec`
    #[must_use]
    pub fn column(mut self, column: impl Into<String>, spec: ColumnSpec) -> Self {
        self.allowed_columns.push((column.into(), spec));
        self
    }

    /// Filter `column` against a different storage field (`table.field` is allowed)
    #[must_use]
    pub fn map_column(mut self, column: impl Into<String>, target: impl Into<String>) -> Self {
        self.column_mappings.insert(column.into(), target.into());
        self
    }

    /// Take over condition building for `column`
    #[must_use]
    pub fn handler<F>(mut self, column: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&FilterArgs<'_>) -> Result<Condition, ApiError> + Send + Sync + 'static,
    {
        self.handlers.insert(column.into(), Arc::new(handler));
        self
    }

    /// Constraint added before any request filter
    #[must_use]
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&QueryParams) -> Option<Condition> + Send + Sync + 'static,
    {
        self.before.push(Arc::new(hook));
        self
    }

    /// Constraint added after all request filters
    #[must_use]
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&QueryParams) -> Option<Condition> + Send + Sync + 'static,
    {
        self.after.push(Arc::new(hook));
        self
    }

    /// Check every type tag up front, e.g. at startup
    ///
    /// # Errors
    ///
    /// Returns the configuration error of the first unknown type tag.
    pub fn validate(&self) -> Result<(), ApiError> {
        for (_, spec) in &self.allowed_columns {
            spec.symbols()?;
        }
        Ok(())
    }

    /// Apply the request's filters to `query`
    ///
    /// Conditions are added column by column; when an error is returned, the
    /// conditions of earlier columns have already been added.
    ///
    /// # Errors
    ///
    /// - Configuration error when a requested column is declared with an unknown
    ///   type tag.
    /// - Malformed input when an allowed operator symbol isn't a known operator or
    ///   its value can't be coerced.
    pub fn apply<Q: QueryContext>(
        &self,
        query: &mut Q,
        params: &QueryParams,
    ) -> Result<(), ApiError> {
        for hook in &self.before {
            if let Some(condition) = hook(params) {
                query.filter(condition);
            }
        }

        for (column, spec) in &self.allowed_columns {
            let Some(param) = params.get(column).filter(|param| !param.is_blank()) else {
                continue;
            };

            let implicit;
            let param = match param {
                ParamValue::Scalar(_) => {
                    implicit = ParamValue::Nested(vec![(
                        Operator::Eq.symbol().to_string(),
                        param.clone(),
                    )]);
                    &implicit
                }
                ParamValue::Nested(_) => param,
            };

            let symbols = spec.symbols()?;
            for symbol in &symbols {
                let Some(raw) = param.get(symbol).filter(|raw| !raw.is_blank()) else {
                    continue;
                };
                let operator = Operator::from_symbol(symbol).ok_or_else(|| {
                    ApiError::bad_request(format!("Invalid \"{symbol}\" operator"))
                })?;
                query.filter(self.condition(column, operator, raw)?);
            }

            if let Some(entries) = param.entries() {
                for (symbol, _) in entries {
                    if !symbols.contains(&symbol.as_str()) {
                        tracing::debug!(column = %column, operator = %symbol, "Ignoring operator outside the allow-list");
                    }
                }
            }
        }

        for hook in &self.after {
            if let Some(condition) = hook(params) {
                query.filter(condition);
            }
        }

        Ok(())
    }

    /// Build the condition for a single `column[operator]=raw`
    ///
    /// # Errors
    ///
    /// Malformed input when the value can't be coerced, or whatever the column's
    /// handler returns.
    pub fn condition(
        &self,
        column: &str,
        operator: Operator,
        raw: &ParamValue,
    ) -> Result<Condition, ApiError> {
        let value = FilterValue::coerce(operator, raw)?;

        if let Some(handler) = self.handlers.get(column) {
            let args = FilterArgs {
                column,
                operator: operator.bin_oper(),
                value: &value,
                raw,
            };
            return Ok(Condition::all().add(handler(&args)?));
        }

        let field_type = self.field_type(column)?;
        let target = Expr::col(column_ref(self.mapped(column)));
        let expr = match &value {
            FilterValue::List(_) => target.is_in(value.values(field_type)),
            FilterValue::Range(low, high) => {
                target.between(bind(low, field_type), bind(high, field_type))
            }
            FilterValue::Bool(flag) => target.binary(operator.bin_oper(), *flag),
            FilterValue::Text(text) => target.binary(operator.bin_oper(), bind(text, field_type)),
        };
        Ok(Condition::all().add(expr))
    }

    fn field_type(&self, column: &str) -> Result<Option<FieldType>, ApiError> {
        Ok(self
            .allowed_columns
            .iter()
            .find(|(allowed, _)| allowed == column)
            .map(|(_, spec)| spec.field_type())
            .transpose()?
            .flatten())
    }

    fn mapped<'a>(&'a self, column: &'a str) -> &'a str {
        self.column_mappings
            .get(column)
            .map_or(column, String::as_str)
    }
}

impl<Q: QueryContext> Stage<Q> for ResourceFilters {
    fn handle(&self, query: &mut Q, params: &QueryParams) -> Result<(), ApiError> {
        self.apply(query, params)
    }
}
