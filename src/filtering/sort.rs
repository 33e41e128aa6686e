use std::{collections::HashMap, sync::Arc};

use sea_orm::sea_query::{Order, SimpleExpr};

use crate::{
    ApiError,
    core::{QueryContext, column_ref},
    params::{ParamValue, QueryParams},
    pipeline::Stage,
};

const ORDER_SYNTAX: &str = "Order parameter must have a numeric index, a direction and a field name, example: order[0][asc]=field_name";

/// Builds the ordering for one column, replacing the default `ORDER BY column`.
pub type OrderHandler = Arc<dyn Fn(Order) -> Vec<(SimpleExpr, Order)> + Send + Sync>;

/// A validated `order[i][direction]=field` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDirective {
    pub column: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Strict parse for request directives: only `asc` and `desc`
    #[must_use]
    pub fn from_param(direction: &str) -> Option<Self> {
        match direction {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    /// Lenient parse for configured defaults: anything but `desc` (any case) is ascending
    #[must_use]
    pub fn from_default(direction: &str) -> Self {
        if direction.eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }

    #[must_use]
    pub fn order(self) -> Order {
        match self {
            Self::Asc => Order::Asc,
            Self::Desc => Order::Desc,
        }
    }
}

/// Translates `order[0][asc]=title&order[1][desc]=created_at` into an ordering.
///
/// Without an `order` parameter the configured default order is applied.
/// Fields outside the allow-list and repeated fields are dropped; a directive
/// with the wrong shape rejects the whole request before anything is applied.
///
/// ```rust,ignore
/// let orders = ResourceOrders::new()
///     .default_order("created_at", "desc")
///     .column("title")
///     .column_as("author", "author_id")
///     .handler("popularity", |direction| vec![(popularity_expr(), direction)]);
/// ```
#[derive(Clone, Default)]
pub struct ResourceOrders {
    default_order: Vec<(String, Direction)>,
    allowed_columns: Vec<(String, Option<String>)>,
    handlers: HashMap<String, OrderHandler>,
}

impl ResourceOrders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default ordering entry; directions other than `asc`/`desc` (any case) become ascending
    #[must_use]
    pub fn default_order(mut self, column: impl Into<String>, direction: &str) -> Self {
        self.default_order
            .push((column.into(), Direction::from_default(direction)));
        self
    }

    /// Default ordering entry without a direction (ascending)
    #[must_use]
    pub fn default_column(mut self, column: impl Into<String>) -> Self {
        self.default_order.push((column.into(), Direction::Asc));
        self
    }

    /// Allow ordering by `column`
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.allowed_columns.push((column.into(), None));
        self
    }

    /// Allow ordering by `alias`, applied to the storage field `column`
    #[must_use]
    pub fn column_as(mut self, alias: impl Into<String>, column: impl Into<String>) -> Self {
        self.allowed_columns.push((alias.into(), Some(column.into())));
        self
    }

    /// Take over ordering for an allow-listed column
    #[must_use]
    pub fn handler<F>(mut self, column: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Order) -> Vec<(SimpleExpr, Order)> + Send + Sync + 'static,
    {
        self.handlers.insert(column.into(), Arc::new(handler));
        self
    }

    /// Validate and clean the request's `order` directive
    ///
    /// Returns `None` when the request has no (or a blank) `order` parameter. Entries keep the
    /// request order; the first entry for a field wins.
    ///
    /// # Errors
    ///
    /// Malformed input when the directive isn't `order[index][asc|desc]=field`.
    pub fn directives(&self, params: &QueryParams) -> Result<Option<Vec<OrderDirective>>, ApiError> {
        let Some(order) = params.get("order").filter(|order| !order.is_blank()) else {
            return Ok(None);
        };
        let entries = order.entries().ok_or_else(|| ApiError::bad_request(ORDER_SYNTAX))?;

        let mut cleaned: Vec<OrderDirective> = Vec::new();
        for (index, entry) in entries {
            let directive = parse_entry(index, entry)?;

            if !self.is_allowed(&directive.column) {
                tracing::debug!(column = %directive.column, "Ignoring order on a column outside the allow-list");
                continue;
            }
            if cleaned.iter().any(|seen| seen.column == directive.column) {
                tracing::debug!(column = %directive.column, "Ignoring repeated order column");
                continue;
            }
            cleaned.push(directive);
        }

        Ok(Some(cleaned))
    }

    /// Apply the request's ordering, or the default order when none was requested
    ///
    /// # Errors
    ///
    /// Malformed input when the directive has the wrong shape; nothing is applied.
    pub fn apply<Q: QueryContext>(
        &self,
        query: &mut Q,
        params: &QueryParams,
    ) -> Result<(), ApiError> {
        let Some(directives) = self.directives(params)? else {
            for (column, direction) in &self.default_order {
                query.order_by(SimpleExpr::Column(column_ref(column)), direction.order());
            }
            return Ok(());
        };

        for directive in directives {
            let order = directive.direction.order();
            if let Some(handler) = self.handlers.get(&directive.column) {
                for (expr, order) in handler(order) {
                    query.order_by(expr, order);
                }
            } else {
                let column = self.mapped(&directive.column);
                query.order_by(SimpleExpr::Column(column_ref(column)), order);
            }
        }

        Ok(())
    }

    fn is_allowed(&self, column: &str) -> bool {
        self.allowed_columns.iter().any(|(alias, _)| alias == column)
    }

    fn mapped<'a>(&'a self, column: &'a str) -> &'a str {
        self.allowed_columns
            .iter()
            .find(|(alias, _)| alias == column)
            .and_then(|(_, target)| target.as_deref())
            .unwrap_or(column)
    }
}

fn parse_entry(index: &str, entry: &ParamValue) -> Result<OrderDirective, ApiError> {
    let malformed = || ApiError::bad_request(ORDER_SYNTAX);

    if index.parse::<u64>().is_err() {
        return Err(malformed());
    }
    let [(direction, field)] = entry.entries().ok_or_else(malformed)? else {
        return Err(malformed());
    };
    let direction = Direction::from_param(direction).ok_or_else(malformed)?;
    let column = field
        .as_scalar()
        .filter(|column| !column.is_empty())
        .ok_or_else(malformed)?;

    Ok(OrderDirective {
        column: column.to_string(),
        direction,
    })
}

impl<Q: QueryContext> Stage<Q> for ResourceOrders {
    fn handle(&self, query: &mut Q, params: &QueryParams) -> Result<(), ApiError> {
        self.apply(query, params)
    }
}
