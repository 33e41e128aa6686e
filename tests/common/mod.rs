#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{OriginalUri, State},
    http::{HeaderMap, Method, Request, StatusCode},
    routing::get,
};
use querycrate::{
    ApiError, ColumnSpec, PaginateResults, PaginationConfig, Paginated, ParamValue, QueryParams,
    RequestIdentity, ResourceFilters, ResourceIndex, ResourceOrders, ResourceQuery,
    ResourceRelations, ResourceRequest, RouteName, Validatable, ValidationErrors,
    validation::validators,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, Database, DatabaseConnection, DbErr, RelationTrait, Schema,
};
use sea_orm_migration::prelude::*;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tower::ServiceExt;

pub mod author_entity;
pub mod comment_entity;
pub mod post_entity;

pub type PostQuery = ResourceQuery<post_entity::Entity>;

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;

    // Run migrations
    Migrator::up(&db, None).await?;
    seed(&db).await?;

    Ok(db)
}

/// Two authors, five posts, five comments
async fn seed(db: &DatabaseConnection) -> Result<(), DbErr> {
    for (id, name) in [(1, "Ada"), (2, "Linus")] {
        author_entity::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
        }
        .insert(db)
        .await?;
    }

    let posts = [
        (1, "Rust ownership", 120, true, 1, "2024-01-05"),
        (2, "Async Rust", 45, true, 2, "2024-02-10"),
        (3, "Draft: lifetimes", 3, false, 1, "2024-03-01"),
        (4, "SQL joins", 80, true, 2, "2024-01-20"),
        (5, "Pagination tips", 10, false, 1, "2024-02-28"),
    ];
    for (id, title, views, published, author_id, created_at) in posts {
        post_entity::ActiveModel {
            id: Set(id),
            title: Set(title.to_string()),
            views: Set(views),
            published: Set(published),
            author_id: Set(author_id),
            created_at: Set(created_at.to_string()),
        }
        .insert(db)
        .await?;
    }

    let comments = [
        (1, 1, "Great read", true),
        (2, 1, "Buy cheap watches", false),
        (3, 1, "Thanks", true),
        (4, 2, "Nice", true),
        (5, 4, "Helpful", false),
    ];
    for (id, post_id, body, approved) in comments {
        comment_entity::ActiveModel {
            id: Set(id),
            post_id: Set(post_id),
            body: Set(body.to_string()),
            approved: Set(approved),
        }
        .insert(db)
        .await?;
    }

    Ok(())
}

/// Fresh query over posts with its loadable relations registered
pub fn post_query() -> PostQuery {
    ResourceQuery::find()
        .relation("comments", post_entity::Relation::Comments.def())
        .relation("author", post_entity::Relation::Author.def())
}

pub fn post_filters() -> ResourceFilters {
    ResourceFilters::new()
        .column("title", ColumnSpec::typed("string"))
        .column("views", ColumnSpec::typed("numeric"))
        .column("published", ColumnSpec::typed("boolean"))
        .column("created_at", ColumnSpec::typed("date"))
        .column("author", ColumnSpec::operators(["eq", "in"]))
        .map_column("author", "posts.author_id")
}

pub fn post_orders() -> ResourceOrders {
    ResourceOrders::new()
        .default_order("id", "asc")
        .column("title")
        .column("views")
        .column("created_at")
        .column_as("author", "author_id")
}

pub fn approved_only(select: &mut SelectStatement) {
    select.and_where(
        Expr::col((comment_entity::Entity, comment_entity::Column::Approved)).eq(true),
    );
}

pub fn post_relations() -> ResourceRelations {
    ResourceRelations::new()
        .with_count("comments")
        .relation("comments")
        .relation("author")
        .count_loader("comments", approved_only)
}

pub fn post_index() -> ResourceIndex<PostQuery> {
    ResourceIndex::new(PaginateResults::new(
        PaginationConfig::default().with_default_per_page(2),
    ))
    .through(post_filters())
    .through(post_orders())
    .through(post_relations())
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub posts: Arc<ResourceIndex<PostQuery>>,
    pub misconfigured: Arc<ResourceIndex<PostQuery>>,
}

#[derive(Debug, Deserialize)]
pub struct PostCreate {
    pub title: String,
    pub views: i32,
}

impl Validatable for PostCreate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(validators::validate_required("title", &self.title));
        errors.check(validators::validate_length("title", &self.title, None, Some(80)));
        errors.check(validators::validate_range("views", self.views, Some(0), None));
        errors.result()
    }
}

struct StorePost(PostCreate);

impl ResourceRequest for StorePost {
    fn store(&self, _params: &QueryParams) -> Result<(), ValidationErrors> {
        self.0.validate()
    }
}

async fn list_posts(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    params: QueryParams,
) -> Result<Paginated<JsonValue>, ApiError> {
    state.posts.list(post_query(), &params, &state.db, uri.path()).await
}

async fn list_misconfigured(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    params: QueryParams,
) -> Result<Paginated<JsonValue>, ApiError> {
    state
        .misconfigured
        .list(post_query(), &params, &state.db, uri.path())
        .await
}

async fn create_post(
    method: Method,
    params: QueryParams,
    Json(payload): Json<PostCreate>,
) -> Result<StatusCode, ApiError> {
    StorePost(payload).validate(&method, &params)?;
    Ok(StatusCode::CREATED)
}

async fn identify(identity: RequestIdentity, params: QueryParams) -> String {
    identity.hash(params.get("context").and_then(ParamValue::as_scalar))
}

pub fn setup_test_app(db: DatabaseConnection) -> Router {
    let state = AppState {
        db,
        posts: Arc::new(post_index()),
        misconfigured: Arc::new(
            ResourceIndex::default()
                .through(ResourceFilters::new().column("views", ColumnSpec::typed("money"))),
        ),
    };

    let api = Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/drafts", get(list_misconfigured))
        .route(
            "/posts/{post}/comments",
            get(identify).layer(Extension(RouteName::new("posts.comments"))),
        )
        .with_state(state);

    Router::new().nest("/api/v1", api)
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, HeaderMap, JsonValue) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, serde_json::from_slice(&body).unwrap())
}

pub async fn get_text(app: &Router, uri: &str) -> String {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

/// `title` of every row, in order
pub fn titles(rows: &JsonValue) -> Vec<&str> {
    rows.as_array()
        .unwrap()
        .iter()
        .map(|row| row["title"].as_str().unwrap())
        .collect()
}

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateBlogTables)]
    }
}

pub struct CreateBlogTables;

#[async_trait::async_trait]
impl MigrationName for CreateBlogTables {
    fn name(&self) -> &'static str {
        "m20240101_000001_create_blog_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateBlogTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(manager.get_database_backend());

        manager
            .create_table(schema.create_table_from_entity(author_entity::Entity))
            .await?;
        manager
            .create_table(schema.create_table_from_entity(post_entity::Entity))
            .await?;
        manager
            .create_table(schema.create_table_from_entity(comment_entity::Entity))
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            comment_entity::Entity.into_table_ref(),
            post_entity::Entity.into_table_ref(),
            author_entity::Entity.into_table_ref(),
        ] {
            manager
                .drop_table(Table::drop().table(table).to_owned())
                .await?;
        }
        Ok(())
    }
}
