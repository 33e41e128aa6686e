use sea_orm::sea_query::BinOper;

use crate::ApiError;

/// Filter operators understood in `column[operator]=value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `LIKE '%value%'`
    Has,
    /// `IN (a, b, ...)`
    In,
    /// `BETWEEN a AND b`
    Btw,
}

impl Operator {
    pub const ALL: [Self; 9] = [
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Lte,
        Self::Gt,
        Self::Gte,
        Self::Has,
        Self::In,
        Self::Btw,
    ];

    /// Look up an operator by its query-string symbol
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|operator| operator.symbol() == symbol)
    }

    /// Symbol used in the query string
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Has => "has",
            Self::In => "in",
            Self::Btw => "btw",
        }
    }

    /// Storage-level operator this symbol maps to
    #[must_use]
    pub const fn bin_oper(self) -> BinOper {
        match self {
            Self::Eq => BinOper::Equal,
            Self::Ne => BinOper::NotEqual,
            Self::Lt => BinOper::SmallerThan,
            Self::Lte => BinOper::SmallerThanOrEqual,
            Self::Gt => BinOper::GreaterThan,
            Self::Gte => BinOper::GreaterThanOrEqual,
            Self::Has => BinOper::Like,
            Self::In => BinOper::In,
            Self::Btw => BinOper::Between,
        }
    }
}

/// Semantic column types with their default operator sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Numeric,
    Boolean,
    Date,
}

impl FieldType {
    /// Resolve a type tag from a column spec
    ///
    /// # Errors
    ///
    /// Unknown tags are a configuration error: the resource definition is broken,
    /// not the request.
    pub fn from_tag(tag: &str) -> Result<Self, ApiError> {
        match tag {
            "string" => Ok(Self::String),
            "numeric" => Ok(Self::Numeric),
            "boolean" => Ok(Self::Boolean),
            "date" => Ok(Self::Date),
            _ => Err(ApiError::configuration(format!(
                "Invalid \"{tag}\" field type"
            ))),
        }
    }

    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Numeric => "numeric",
            Self::Boolean => "boolean",
            Self::Date => "date",
        }
    }

    #[must_use]
    pub const fn operators(self) -> &'static [Operator] {
        use Operator::{Btw, Eq, Gt, Gte, Has, In, Lt, Lte, Ne};
        match self {
            Self::String => &[Eq, Ne, Has],
            Self::Numeric => &[Eq, Ne, Lt, Lte, Gt, Gte, In, Btw],
            Self::Boolean => &[Eq, Ne],
            Self::Date => &[Eq, Ne, Lt, Lte, Gt, Gte, Btw],
        }
    }
}

/// Which operators an allow-listed column accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSpec {
    /// Explicit operator symbols, e.g. `["eq", "in"]`
    Operators(Vec<String>),
    /// A type tag expanded through [`FieldType`], e.g. `"numeric"`
    Type(String),
}

impl ColumnSpec {
    pub fn operators<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Operators(symbols.into_iter().map(Into::into).collect())
    }

    pub fn typed(tag: impl Into<String>) -> Self {
        Self::Type(tag.into())
    }

    /// Operator symbols this column accepts, in allow-list order
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown type tag.
    pub fn symbols(&self) -> Result<Vec<&str>, ApiError> {
        match self {
            Self::Operators(symbols) => Ok(symbols.iter().map(String::as_str).collect()),
            Self::Type(tag) => Ok(FieldType::from_tag(tag)?
                .operators()
                .iter()
                .map(|operator| operator.symbol())
                .collect()),
        }
    }

    /// Semantic type of the column, `None` for an explicit operator list
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown type tag.
    pub fn field_type(&self) -> Result<Option<FieldType>, ApiError> {
        match self {
            Self::Operators(_) => Ok(None),
            Self::Type(tag) => FieldType::from_tag(tag).map(Some),
        }
    }
}

impl From<FieldType> for ColumnSpec {
    fn from(field_type: FieldType) -> Self {
        Self::Type(field_type.tag().to_string())
    }
}
