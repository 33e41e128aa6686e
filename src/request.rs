//! Request identity and per-operation request validation.
//!
//! [`RequestIdentity`] turns a request into a deterministic key a response cache
//! can partition on:
//!
//! ```text
//! GET /posts/7/comments [posts.comments@3f1c0a9b2e]
//! GET /posts/7/comments [posts.comments@3f1c0a9b2e:91ab0c]   (with a context string)
//! ```
//!
//! The hash covers the query string minus any `cache` parameter, so clients can
//! bust their own caches without changing the identity of the request. The key
//! is meant for cache partitioning only; it is not a security boundary.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, MatchedPath, RawPathParams},
    http::{Method, request::Parts},
};
use sha2::{Digest, Sha256};

use crate::{ApiError, params::QueryParams, validation::ValidationErrors};

/// Query parameter that never contributes to a request's identity
const CACHE_PARAM: &str = "cache";

/// Logical name of a route, attached with an [`Extension`](axum::Extension) layer.
///
/// ```rust,ignore
/// Router::new().route(
///     "/posts/{post}/comments",
///     get(list_comments).layer(Extension(RouteName::new("posts.comments"))),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteName(pub String);

impl RouteName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// What identifies a request for caching purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    method: Method,
    uri: String,
    route_name: String,
    query: String,
}

impl RequestIdentity {
    /// `template` is the route template, e.g. `/posts/{post}`, and `parameters`
    /// the concrete path parameters substituted into it
    pub fn new<'a>(
        method: Method,
        template: &str,
        parameters: impl IntoIterator<Item = (&'a str, &'a str)>,
        route_name: Option<&str>,
        query: &str,
    ) -> Self {
        Self {
            method,
            uri: substitute(template, parameters),
            route_name: route_name.unwrap_or_default().to_string(),
            query: query.strip_prefix('?').unwrap_or(query).to_string(),
        }
    }

    /// Route template with the path parameters filled in
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn route_name(&self) -> &str {
        &self.route_name
    }

    /// `"{METHOD} {uri} [{route}@{hash}]"`, with `:{hash}` of `context` appended
    /// inside the brackets when a non-empty context is given
    #[must_use]
    pub fn hash(&self, context: Option<&str>) -> String {
        let mut digest = short_hash(&strip_cache_param(&self.query), 10);
        if let Some(context) = context.filter(|context| !context.is_empty()) {
            digest.push(':');
            digest.push_str(&short_hash(context, 6));
        }

        format!(
            "{} {} [{}@{digest}]",
            self.method, self.uri, self.route_name
        )
    }
}

impl<S> FromRequestParts<S> for RequestIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let template = parts
            .extensions
            .get::<MatchedPath>()
            .map_or_else(|| parts.uri.path().to_string(), |path| path.as_str().to_string());

        // Routes without parameters have nothing to substitute
        let parameters: Vec<(String, String)> = RawPathParams::from_request_parts(parts, state)
            .await
            .map(|params| {
                params
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        let route_name = parts
            .extensions
            .get::<RouteName>()
            .map(|name| name.0.clone());

        Ok(Self::new(
            parts.method.clone(),
            &template,
            parameters.iter().map(|(key, value)| (key.as_str(), value.as_str())),
            route_name.as_deref(),
            parts.uri.query().unwrap_or_default(),
        ))
    }
}

fn substitute<'a>(template: &str, parameters: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    parameters
        .into_iter()
        .fold(template.to_string(), |uri, (key, value)| {
            uri.replace(&format!("{{{key}}}"), value)
                .replace(&format!("{{*{key}}}"), value)
        })
}

/// Drop every `cache=...` pair, keeping the rest of the raw query string intact
fn strip_cache_param(query: &str) -> String {
    query
        .split('&')
        .filter(|pair| {
            let key = pair.split_once('=').map_or(*pair, |(key, _)| key);
            !pair.is_empty() && key != CACHE_PARAM
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn short_hash(input: &str, length: usize) -> String {
    let mut digest = hex::encode(Sha256::digest(input.as_bytes()));
    digest.truncate(length);
    digest
}

/// Per-operation request checks, selected by HTTP method.
///
/// Every hook defaults to accepting the request; override the ones an endpoint
/// needs. Failures become a 422 with one detail per failed field.
///
/// ```rust,ignore
/// struct StorePost(PostCreate);
///
/// impl ResourceRequest for StorePost {
///     fn store(&self, _params: &QueryParams) -> Result<(), ValidationErrors> {
///         self.0.validate()
///     }
/// }
///
/// request.validate(&method, &params)?;
/// ```
pub trait ResourceRequest {
    /// `GET`
    ///
    /// # Errors
    ///
    /// Every failed check.
    fn index(&self, _params: &QueryParams) -> Result<(), ValidationErrors> {
        Ok(())
    }

    /// `POST`
    ///
    /// # Errors
    ///
    /// Every failed check.
    fn store(&self, _params: &QueryParams) -> Result<(), ValidationErrors> {
        Ok(())
    }

    /// `PUT` and `PATCH`
    ///
    /// # Errors
    ///
    /// Every failed check.
    fn update(&self, _params: &QueryParams) -> Result<(), ValidationErrors> {
        Ok(())
    }

    /// `DELETE`
    ///
    /// # Errors
    ///
    /// Every failed check.
    fn destroy(&self, _params: &QueryParams) -> Result<(), ValidationErrors> {
        Ok(())
    }

    /// Run the hook for `method`
    ///
    /// # Errors
    ///
    /// - Validation failure (422) with the hook's errors.
    /// - Internal error for a method without a hook.
    fn validate(&self, method: &Method, params: &QueryParams) -> Result<(), ApiError> {
        let outcome = match *method {
            Method::GET => self.index(params),
            Method::POST => self.store(params),
            Method::PUT | Method::PATCH => self.update(params),
            Method::DELETE => self.destroy(params),
            _ => {
                return Err(ApiError::internal(
                    format!("Unsupported method {method}"),
                    None,
                ));
            }
        };
        outcome.map_err(ApiError::from)
    }
}
