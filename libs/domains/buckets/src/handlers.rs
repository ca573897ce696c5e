use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use axum_helpers::{
    FieldValidator, IdPath, JsonBody, MutationResponse,
    errors::responses::{
        BadRequestResponse, ConflictResponse, InternalServerErrorResponse, NotFoundResponse,
    },
};
use database::pagination::{Connection, PageRequest};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::BucketResult;
use crate::models::{
    AddBucketCategory, Bucket, BucketCategory, BucketCategoryInput, BucketInput, DeleteOptions,
    MembershipFilter, PatchBucket, PatchSuggestionCategory, ReplaceBucketCategories,
    RetrieveType, SortBucketCategories, SuggestionCategory, SuggestionCategoryInput,
};
use crate::repository::BucketRepository;
use crate::service::BucketService;

pub const BUCKETS_TAG: &str = "buckets";
pub const CATEGORIES_TAG: &str = "suggestion-categories";

#[derive(OpenApi)]
#[openapi(
    paths(
        list_buckets,
        create_bucket,
        get_bucket,
        update_bucket,
        patch_bucket,
        delete_bucket,
        bucket_categories,
        add_category,
        replace_categories,
        sort_categories,
        remove_category,
        list_categories,
        create_category,
        get_category,
        update_category,
        patch_category,
        delete_category,
        unbound_buckets,
    ),
    components(
        schemas(
            Bucket,
            BucketInput,
            PatchBucket,
            RetrieveType,
            SuggestionCategory,
            SuggestionCategoryInput,
            PatchSuggestionCategory,
            BucketCategory,
            BucketCategoryInput,
            AddBucketCategory,
            SortBucketCategories,
            ReplaceBucketCategories,
            FieldValidator,
        ),
        responses(
            NotFoundResponse,
            BadRequestResponse,
            ConflictResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = BUCKETS_TAG, description = "Buckets and their ordered suggestion categories"),
        (name = CATEGORIES_TAG, description = "Suggestion category management")
    )
)]
pub struct ApiDoc;

/// Create the bucket router; paths are absolute so the caller merges it
pub fn router<R: BucketRepository + 'static>(service: BucketService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/buckets", get(list_buckets).post(create_bucket))
        .route(
            "/buckets/{id}",
            get(get_bucket)
                .put(update_bucket)
                .patch(patch_bucket)
                .delete(delete_bucket),
        )
        .route(
            "/buckets/{id}/suggestion-categories",
            get(bucket_categories)
                .post(add_category)
                .put(replace_categories),
        )
        .route(
            "/buckets/{id}/suggestion-categories/sort",
            post(sort_categories),
        )
        .route(
            "/buckets/{id}/suggestion-categories/{category_id}",
            delete(remove_category),
        )
        .route(
            "/suggestion-categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/suggestion-categories/{id}",
            get(get_category)
                .put(update_category)
                .patch(patch_category)
                .delete(delete_category),
        )
        .route(
            "/suggestion-categories/{id}/unbound-buckets",
            get(unbound_buckets),
        )
        .with_state(shared_service)
}

/// List buckets
#[utoipa::path(
    get,
    path = "/buckets",
    tag = BUCKETS_TAG,
    params(PageRequest),
    responses(
        (status = 200, description = "Page of buckets", body = Connection<Bucket>),
        (status = 400, response = BadRequestResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_buckets<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    Query(page): Query<PageRequest>,
) -> BucketResult<Json<Connection<Bucket>>> {
    Ok(Json(service.list_buckets(&page).await?))
}

/// Create a bucket
#[utoipa::path(
    post,
    path = "/buckets",
    tag = BUCKETS_TAG,
    request_body = BucketInput,
    responses(
        (status = 201, description = "Bucket created", body = MutationResponse<Bucket>),
        (status = 400, description = "Field validators", body = MutationResponse<Bucket>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_bucket<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    JsonBody(input): JsonBody<BucketInput>,
) -> BucketResult<Response> {
    let response = service.create_bucket(input).await?;
    Ok(response.into_response_with(StatusCode::CREATED))
}

#[utoipa::path(
    get,
    path = "/buckets/{id}",
    tag = BUCKETS_TAG,
    params(("id" = i64, Path, description = "Bucket ID")),
    responses(
        (status = 200, description = "Bucket found", body = Bucket),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_bucket<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    IdPath(id): IdPath,
) -> BucketResult<Json<Bucket>> {
    Ok(Json(service.get_bucket(id).await?))
}

#[utoipa::path(
    put,
    path = "/buckets/{id}",
    tag = BUCKETS_TAG,
    params(("id" = i64, Path, description = "Bucket ID")),
    request_body = BucketInput,
    responses(
        (status = 200, description = "Bucket updated", body = MutationResponse<Bucket>),
        (status = 400, description = "Field validators", body = MutationResponse<Bucket>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_bucket<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    IdPath(id): IdPath,
    JsonBody(input): JsonBody<BucketInput>,
) -> BucketResult<Response> {
    Ok(service.update_bucket(id, input).await?.into_response())
}

#[utoipa::path(
    patch,
    path = "/buckets/{id}",
    tag = BUCKETS_TAG,
    params(("id" = i64, Path, description = "Bucket ID")),
    request_body = PatchBucket,
    responses(
        (status = 200, description = "Bucket updated", body = MutationResponse<Bucket>),
        (status = 400, description = "Field validators", body = MutationResponse<Bucket>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn patch_bucket<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    IdPath(id): IdPath,
    JsonBody(patch): JsonBody<PatchBucket>,
) -> BucketResult<Response> {
    Ok(service.patch_bucket(id, patch).await?.into_response())
}

/// Delete a bucket and its category memberships
#[utoipa::path(
    delete,
    path = "/buckets/{id}",
    tag = BUCKETS_TAG,
    params(("id" = i64, Path, description = "Bucket ID")),
    responses(
        (status = 200, description = "Deleted bucket", body = Bucket),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_bucket<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    IdPath(id): IdPath,
) -> BucketResult<Json<Bucket>> {
    Ok(Json(service.delete_bucket(id).await?))
}

/// Categories of a bucket in traversal order, or the unbound ones with `not_equal=true`
#[utoipa::path(
    get,
    path = "/buckets/{id}/suggestion-categories",
    tag = BUCKETS_TAG,
    params(("id" = i64, Path, description = "Bucket ID"), MembershipFilter, PageRequest),
    responses(
        (status = 200, description = "Page of categories", body = Connection<BucketCategory>),
        (status = 400, response = BadRequestResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn bucket_categories<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    IdPath(id): IdPath,
    Query(filter): Query<MembershipFilter>,
    Query(page): Query<PageRequest>,
) -> BucketResult<Json<Connection<BucketCategory>>> {
    Ok(Json(
        service
            .bucket_suggestion_categories(id, &page, filter.not_equal)
            .await?,
    ))
}

/// Add a category at the tail (default) or head of a bucket
#[utoipa::path(
    post,
    path = "/buckets/{id}/suggestion-categories",
    tag = BUCKETS_TAG,
    params(("id" = i64, Path, description = "Bucket ID")),
    request_body = AddBucketCategory,
    responses(
        (status = 200, description = "Bucket categories in order", body = Vec<BucketCategory>),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn add_category<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    IdPath(id): IdPath,
    JsonBody(input): JsonBody<AddBucketCategory>,
) -> BucketResult<Json<Vec<BucketCategory>>> {
    Ok(Json(
        service
            .add_suggestion_category(id, input.suggestion_category_id, input.tail)
            .await?,
    ))
}

/// Replace the categories of a bucket, or upsert them with `partial=true`
#[utoipa::path(
    put,
    path = "/buckets/{id}/suggestion-categories",
    tag = BUCKETS_TAG,
    params(("id" = i64, Path, description = "Bucket ID")),
    request_body = ReplaceBucketCategories,
    responses(
        (status = 200, description = "Bucket categories in order", body = MutationResponse<Vec<BucketCategory>>),
        (status = 400, description = "Field validators", body = MutationResponse<Vec<BucketCategory>>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn replace_categories<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    IdPath(id): IdPath,
    JsonBody(input): JsonBody<ReplaceBucketCategories>,
) -> BucketResult<Response> {
    let response = service
        .replace_suggestion_categories(id, input.suggestion_categories, input.partial)
        .await?;
    Ok(response.into_response())
}

/// Reorder bucket categories; unknown ids are ignored
#[utoipa::path(
    post,
    path = "/buckets/{id}/suggestion-categories/sort",
    tag = BUCKETS_TAG,
    params(("id" = i64, Path, description = "Bucket ID")),
    request_body = SortBucketCategories,
    responses(
        (status = 200, description = "Bucket categories in order", body = Vec<BucketCategory>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn sort_categories<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    IdPath(id): IdPath,
    JsonBody(input): JsonBody<SortBucketCategories>,
) -> BucketResult<Json<Vec<BucketCategory>>> {
    Ok(Json(
        service
            .sort_suggestion_categories(id, input.suggestion_category_ids)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/buckets/{id}/suggestion-categories/{category_id}",
    tag = BUCKETS_TAG,
    params(
        ("id" = i64, Path, description = "Bucket ID"),
        ("category_id" = i64, Path, description = "Suggestion category ID")
    ),
    responses(
        (status = 200, description = "Remaining bucket categories", body = Vec<BucketCategory>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn remove_category<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    IdPath((id, category_id)): IdPath<(i64, i64)>,
) -> BucketResult<Json<Vec<BucketCategory>>> {
    Ok(Json(service.remove_suggestion_category(id, category_id).await?))
}

/// List suggestion categories
#[utoipa::path(
    get,
    path = "/suggestion-categories",
    tag = CATEGORIES_TAG,
    params(PageRequest),
    responses(
        (status = 200, description = "Page of categories", body = Connection<SuggestionCategory>),
        (status = 400, response = BadRequestResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_categories<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    Query(page): Query<PageRequest>,
) -> BucketResult<Json<Connection<SuggestionCategory>>> {
    Ok(Json(service.list_categories(&page).await?))
}

#[utoipa::path(
    post,
    path = "/suggestion-categories",
    tag = CATEGORIES_TAG,
    request_body = SuggestionCategoryInput,
    responses(
        (status = 201, description = "Category created", body = MutationResponse<SuggestionCategory>),
        (status = 400, description = "Field validators", body = MutationResponse<SuggestionCategory>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_category<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    JsonBody(input): JsonBody<SuggestionCategoryInput>,
) -> BucketResult<Response> {
    let response = service.create_category(input).await?;
    Ok(response.into_response_with(StatusCode::CREATED))
}

#[utoipa::path(
    get,
    path = "/suggestion-categories/{id}",
    tag = CATEGORIES_TAG,
    params(("id" = i64, Path, description = "Suggestion category ID")),
    responses(
        (status = 200, description = "Category found", body = SuggestionCategory),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_category<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    IdPath(id): IdPath,
) -> BucketResult<Json<SuggestionCategory>> {
    Ok(Json(service.get_category(id).await?))
}

#[utoipa::path(
    put,
    path = "/suggestion-categories/{id}",
    tag = CATEGORIES_TAG,
    params(("id" = i64, Path, description = "Suggestion category ID")),
    request_body = SuggestionCategoryInput,
    responses(
        (status = 200, description = "Category updated", body = MutationResponse<SuggestionCategory>),
        (status = 400, description = "Field validators", body = MutationResponse<SuggestionCategory>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_category<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    IdPath(id): IdPath,
    JsonBody(input): JsonBody<SuggestionCategoryInput>,
) -> BucketResult<Response> {
    Ok(service.update_category(id, input).await?.into_response())
}

#[utoipa::path(
    patch,
    path = "/suggestion-categories/{id}",
    tag = CATEGORIES_TAG,
    params(("id" = i64, Path, description = "Suggestion category ID")),
    request_body = PatchSuggestionCategory,
    responses(
        (status = 200, description = "Category updated", body = MutationResponse<SuggestionCategory>),
        (status = 400, description = "Field validators", body = MutationResponse<SuggestionCategory>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn patch_category<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    IdPath(id): IdPath,
    JsonBody(patch): JsonBody<PatchSuggestionCategory>,
) -> BucketResult<Response> {
    Ok(service.patch_category(id, patch).await?.into_response())
}

/// Delete a suggestion category
///
/// Fails with 409 while a bucket uses the category, unless `detach=true`.
#[utoipa::path(
    delete,
    path = "/suggestion-categories/{id}",
    tag = CATEGORIES_TAG,
    params(("id" = i64, Path, description = "Suggestion category ID"), DeleteOptions),
    responses(
        (status = 200, description = "Deleted category", body = SuggestionCategory),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_category<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    IdPath(id): IdPath,
    Query(options): Query<DeleteOptions>,
) -> BucketResult<Json<SuggestionCategory>> {
    Ok(Json(service.delete_category(id, options.detach).await?))
}

/// Buckets that do not contain the category
#[utoipa::path(
    get,
    path = "/suggestion-categories/{id}/unbound-buckets",
    tag = CATEGORIES_TAG,
    params(("id" = i64, Path, description = "Suggestion category ID"), PageRequest),
    responses(
        (status = 200, description = "Page of buckets", body = Connection<Bucket>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn unbound_buckets<R: BucketRepository>(
    State(service): State<Arc<BucketService<R>>>,
    IdPath(id): IdPath,
    Query(page): Query<PageRequest>,
) -> BucketResult<Json<Connection<Bucket>>> {
    Ok(Json(service.unbound_buckets(id, &page).await?))
}
