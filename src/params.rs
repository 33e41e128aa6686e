//! Query-string decoding with bracket syntax.
//!
//! Resource endpoints receive their filters, ordering and relation directives as
//! nested query parameters:
//!
//! ```text
//! GET /posts?title[has]=rust&views[btw]=10,100&order[0][desc]=created_at&with[]=comments
//! ```
//!
//! [`QueryParams::parse`] turns that into an ordered tree of [`ParamValue`]s.
//! `a[k]=v` creates a keyed entry, `a[]=v` appends under the next integer key,
//! and a repeated scalar key keeps the last value. Entries keep the order in
//! which they first appeared in the query string.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use url::form_urlencoded;

/// A single decoded query parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// `name=value`
    Scalar(String),
    /// `name[key]=value` / `name[]=value`, in first-seen order
    Nested(Vec<(String, ParamValue)>),
}

impl ParamValue {
    /// Scalar contents, `None` for nested values
    #[must_use]
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(value) => Some(value),
            Self::Nested(_) => None,
        }
    }

    /// Keyed entries, `None` for scalars
    #[must_use]
    pub fn entries(&self) -> Option<&[(String, ParamValue)]> {
        match self {
            Self::Scalar(_) => None,
            Self::Nested(entries) => Some(entries),
        }
    }

    /// Look up a key of a nested value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries()?
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// An empty scalar carries no value
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Scalar(value) if value.is_empty())
    }

    /// Scalars of a nested value in order, `None` if any entry is itself nested
    #[must_use]
    pub fn scalar_list(&self) -> Option<Vec<&str>> {
        self.entries()?
            .iter()
            .map(|(_, value)| value.as_scalar())
            .collect()
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

/// Decoded query string of a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    raw: String,
    pairs: Vec<(String, String)>,
    entries: Vec<(String, ParamValue)>,
}

impl QueryParams {
    /// Decode a raw (still percent-encoded) query string, without the leading `?`
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let pairs: Vec<(String, String)> = form_urlencoded::parse(raw.as_bytes())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        let mut entries = Vec::new();
        for (key, value) in &pairs {
            let (base, path) = split_key(key);
            if base.is_empty() {
                continue;
            }
            insert(&mut entries, base, &path, value.clone());
        }

        Self {
            raw: raw.to_string(),
            pairs,
            entries,
        }
    }

    /// The query string as received
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Decoded `(key, value)` pairs in request order, keys still in bracket form
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// `1`, `true`, `on` and `yes` (any case) are true, anything else is false
    #[must_use]
    pub fn boolean(&self, name: &str) -> bool {
        self.get(name)
            .and_then(ParamValue::as_scalar)
            .is_some_and(|value| {
                matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "1" | "true" | "on" | "yes"
                )
            })
    }

    /// Non-negative integer value, `None` when missing or not a number
    #[must_use]
    pub fn integer(&self, name: &str) -> Option<u64> {
        self.get(name)
            .and_then(ParamValue::as_scalar)
            .and_then(|value| value.trim().parse().ok())
    }
}

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::parse(parts.uri.query().unwrap_or_default()))
    }
}

/// Split `name[a][b]` into `("name", ["a", "b"])`. Keys without a complete
/// bracket pair are taken verbatim.
fn split_key(key: &str) -> (&str, Vec<&str>) {
    let Some(open) = key.find('[') else {
        return (key, Vec::new());
    };

    let mut segments = Vec::new();
    let mut rest = &key[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            break;
        };
        segments.push(&inner[..close]);
        rest = &inner[close + 1..];
    }

    if segments.is_empty() || open == 0 {
        (key, Vec::new())
    } else {
        (&key[..open], segments)
    }
}

fn insert(entries: &mut Vec<(String, ParamValue)>, key: &str, path: &[&str], value: String) {
    let key = if key.is_empty() {
        next_index(entries)
    } else {
        key.to_string()
    };

    let Some((next, rest)) = path.split_first() else {
        match entries.iter_mut().find(|(name, _)| *name == key) {
            Some(slot) => slot.1 = ParamValue::Scalar(value),
            None => entries.push((key, ParamValue::Scalar(value))),
        }
        return;
    };

    let position = if let Some(position) = entries.iter().position(|(name, _)| *name == key) {
        if !matches!(entries[position].1, ParamValue::Nested(_)) {
            entries[position].1 = ParamValue::Nested(Vec::new());
        }
        position
    } else {
        entries.push((key, ParamValue::Nested(Vec::new())));
        entries.len() - 1
    };

    if let ParamValue::Nested(children) = &mut entries[position].1 {
        insert(children, next, rest, value);
    }
}

fn next_index(entries: &[(String, ParamValue)]) -> String {
    entries
        .iter()
        .filter_map(|(name, _)| name.parse::<u64>().ok())
        .max()
        .map_or(0, |max| max + 1)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_scalar() {
        let params = QueryParams::parse("title=hello%20world&views=10");
        assert_eq!(params.get("title"), Some(&ParamValue::from("hello world")));
        assert_eq!(params.get("views"), Some(&ParamValue::from("10")));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn test_operator_brackets() {
        let params = QueryParams::parse("views[gte]=10&views[lt]=20");
        let views = params.get("views").unwrap();
        assert_eq!(views.get("gte"), Some(&ParamValue::from("10")));
        assert_eq!(views.get("lt"), Some(&ParamValue::from("20")));
    }

    #[test]
    fn test_encoded_brackets() {
        let params = QueryParams::parse("views%5Bgte%5D=10");
        assert_eq!(
            params.get("views").and_then(|v| v.get("gte")),
            Some(&ParamValue::from("10"))
        );
    }

    #[test]
    fn test_append_brackets_use_next_index() {
        let params = QueryParams::parse("with[]=comments&with[]=author");
        let with = params.get("with").unwrap();
        assert_eq!(with.scalar_list(), Some(vec!["comments", "author"]));
        assert_eq!(with.get("0"), Some(&ParamValue::from("comments")));
        assert_eq!(with.get("1"), Some(&ParamValue::from("author")));
    }

    #[test]
    fn test_order_directive_keeps_request_order() {
        let params = QueryParams::parse("order[1][asc]=title&order[0][desc]=id");
        let order = params.get("order").unwrap().entries().unwrap();
        assert_eq!(order[0].0, "1");
        assert_eq!(order[1].0, "0");
        assert_eq!(order[1].1.get("desc"), Some(&ParamValue::from("id")));
    }

    #[test]
    fn test_last_scalar_wins() {
        let params = QueryParams::parse("title=a&title=b");
        assert_eq!(params.get("title"), Some(&ParamValue::from("b")));
    }

    #[test]
    fn test_unclosed_bracket_is_literal_key() {
        let params = QueryParams::parse("title[eq=a");
        assert_eq!(params.get("title[eq"), Some(&ParamValue::from("a")));
        assert_eq!(params.get("title"), None);
    }

    #[test]
    fn test_boolean_and_integer() {
        let params = QueryParams::parse("all=true&other=YES&off=0&perPage=25&bad=x");
        assert!(params.boolean("all"));
        assert!(params.boolean("other"));
        assert!(!params.boolean("off"));
        assert!(!params.boolean("missing"));
        assert_eq!(params.integer("perPage"), Some(25));
        assert_eq!(params.integer("bad"), None);
    }

    #[test]
    fn test_raw_and_pairs_are_preserved() {
        let params = QueryParams::parse("?a[]=1&b=2");
        assert_eq!(params.raw(), "a[]=1&b=2");
        assert_eq!(
            params.pairs(),
            &[
                ("a[]".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
    }
}
