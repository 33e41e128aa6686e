use std::{collections::HashMap, sync::Arc};

use sea_orm::sea_query::SelectStatement;

use crate::{
    ApiError,
    core::{QueryContext, RelationLoad, RelationLoader},
    params::{ParamValue, QueryParams},
    pipeline::Stage,
};

const WITH_SYNTAX: &str = "Parameter \"with\" must be a comma separated list or an array, example: with=comments,author or with[]=comments";

/// Translates `with=comments,author` / `with[]=comments` into eager loads.
///
/// Requested aliases are matched against the allow-list; anything else is
/// dropped. Relations can be constrained with loaders registered by name, and
/// relation counts have their own loader registry, so `comments` can be loaded
/// one way and counted another.
///
/// ```rust,ignore
/// let relations = ResourceRelations::new()
///     .with("author")
///     .with_count("comments")
///     .relation("comments")
///     .relation_as("people", ["author", "editor"])
///     .loader("comments", |select| {
///         select.order_by(comment::Column::CreatedAt, Order::Desc);
///     })
///     .count_loader("comments", |select| {
///         select.and_where(Expr::col(comment::Column::Approved).eq(true));
///     });
/// ```
#[derive(Clone, Default)]
pub struct ResourceRelations {
    with: Vec<RelationLoad>,
    with_count: Vec<String>,
    allowed_relations: Vec<(String, Vec<String>)>,
    loaders: HashMap<String, RelationLoader>,
    count_loaders: HashMap<String, RelationLoader>,
}

impl ResourceRelations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Relation loaded on every request
    #[must_use]
    pub fn with(mut self, relation: impl Into<String>) -> Self {
        self.with.push(RelationLoad::plain(relation));
        self
    }

    /// Relation loaded on every request through `loader`
    #[must_use]
    pub fn with_loader<F>(mut self, relation: impl Into<String>, loader: F) -> Self
    where
        F: Fn(&mut SelectStatement) + Send + Sync + 'static,
    {
        self.with.push(RelationLoad::custom(relation, Arc::new(loader)));
        self
    }

    /// Relation counted on every request
    #[must_use]
    pub fn with_count(mut self, relation: impl Into<String>) -> Self {
        self.with_count.push(relation.into());
        self
    }

    /// Allow `with=relation`
    #[must_use]
    pub fn relation(mut self, relation: impl Into<String>) -> Self {
        let relation = relation.into();
        self.allowed_relations.push((relation.clone(), vec![relation]));
        self
    }

    /// Allow `with=alias`, loading every relation in `relations`
    #[must_use]
    pub fn relation_as<I, S>(mut self, alias: impl Into<String>, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_relations
            .push((alias.into(), relations.into_iter().map(Into::into).collect()));
        self
    }

    /// Constrain every load of `name`
    ///
    /// A requested alias `name` or `name.anything` loads its relations through
    /// this loader, as does a relation called `name` loaded by any other route.
    #[must_use]
    pub fn loader<F>(mut self, name: impl Into<String>, loader: F) -> Self
    where
        F: Fn(&mut SelectStatement) + Send + Sync + 'static,
    {
        self.loaders.insert(name.into(), Arc::new(loader));
        self
    }

    /// Constrain the count of relation `name`
    #[must_use]
    pub fn count_loader<F>(mut self, name: impl Into<String>, loader: F) -> Self
    where
        F: Fn(&mut SelectStatement) + Send + Sync + 'static,
    {
        self.count_loaders.insert(name.into(), Arc::new(loader));
        self
    }

    /// Aliases requested through `with`, `None` when the parameter is missing or blank
    ///
    /// # Errors
    ///
    /// Malformed input when `with` is neither a scalar list nor a flat array.
    pub fn requested<'a>(&self, params: &'a QueryParams) -> Result<Option<Vec<&'a str>>, ApiError> {
        let Some(with) = params.get("with").filter(|with| !with.is_blank()) else {
            return Ok(None);
        };

        let aliases = match with {
            ParamValue::Scalar(value) => value.split(',').collect::<Vec<_>>(),
            ParamValue::Nested(_) => with
                .scalar_list()
                .ok_or_else(|| ApiError::bad_request(WITH_SYNTAX))?,
        };

        Ok(Some(
            aliases
                .into_iter()
                .filter(|alias| !alias.is_empty())
                .collect(),
        ))
    }

    /// Relations to load for this request, deduplicated by name
    ///
    /// # Errors
    ///
    /// Malformed input when `with` has the wrong shape.
    pub fn loads(&self, params: &QueryParams) -> Result<Vec<RelationLoad>, ApiError> {
        let mut loads = self.with.clone();

        if let Some(requested) = self.requested(params)? {
            for (alias, relations) in &self.allowed_relations {
                if !requested.contains(&alias.as_str()) {
                    continue;
                }

                let prefix = alias.split_once('.').map_or(alias.as_str(), |(prefix, _)| prefix);
                let loader = self.loaders.get(prefix);
                for relation in relations {
                    loads.push(match loader {
                        Some(loader) => RelationLoad::custom(relation, loader.clone()),
                        None => RelationLoad::plain(relation),
                    });
                }
            }

            for alias in requested {
                if !self.allowed_relations.iter().any(|(allowed, _)| allowed == alias) {
                    tracing::debug!(relation = %alias, "Ignoring relation outside the allow-list");
                }
            }
        }

        let loads = loads
            .into_iter()
            .map(|load| match self.loaders.get(load.name()) {
                Some(loader) if !load.is_custom() => RelationLoad::custom(load.name(), loader.clone()),
                _ => load,
            })
            .collect();

        Ok(dedupe(loads))
    }

    /// Relations to count, each with its count loader when one is registered
    #[must_use]
    pub fn counts(&self) -> Vec<RelationLoad> {
        let counts = self
            .with_count
            .iter()
            .map(|relation| match self.count_loaders.get(relation) {
                Some(loader) => RelationLoad::custom(relation, loader.clone()),
                None => RelationLoad::plain(relation),
            })
            .collect();

        dedupe(counts)
    }

    /// Register this request's relation loads and counts on `query`
    ///
    /// # Errors
    ///
    /// Malformed input when `with` has the wrong shape; nothing is registered.
    pub fn apply<Q: QueryContext>(
        &self,
        query: &mut Q,
        params: &QueryParams,
    ) -> Result<(), ApiError> {
        let loads = self.loads(params)?;
        query.with(loads);
        query.with_count(self.counts());
        Ok(())
    }
}

/// Keep one entry per name in first-seen position; a custom loader replaces a plain entry
fn dedupe(relations: Vec<RelationLoad>) -> Vec<RelationLoad> {
    let mut unique: Vec<RelationLoad> = Vec::with_capacity(relations.len());
    for relation in relations {
        match unique.iter_mut().find(|seen| seen.name() == relation.name()) {
            Some(seen) if !seen.is_custom() && relation.is_custom() => *seen = relation,
            Some(_) => {}
            None => unique.push(relation),
        }
    }
    unique
}

impl<Q: QueryContext> Stage<Q> for ResourceRelations {
    fn handle(&self, query: &mut Q, params: &QueryParams) -> Result<(), ApiError> {
        self.apply(query, params)
    }
}
