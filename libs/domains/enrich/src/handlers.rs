use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
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

use crate::error::EnrichResult;
use crate::models::{
    AddPipelineItem, BehaviorMergeType, BehaviorOnError, DeleteOptions, EnrichItem,
    EnrichItemInput, EnrichItemType, EnrichPipeline, EnrichPipelineInput, MembershipFilter,
    PatchEnrichItem, PatchEnrichPipeline, PipelineItem, PipelineItemInput, SortPipelineItems,
};
use crate::repository::EnrichRepository;
use crate::service::EnrichService;

pub const ITEMS_TAG: &str = "enrich-items";
pub const PIPELINES_TAG: &str = "enrich-pipelines";

/// OpenAPI documentation for the enrich API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_items,
        create_item,
        get_item,
        update_item,
        patch_item,
        delete_item,
        unbound_pipelines,
        list_pipelines,
        create_pipeline,
        get_pipeline,
        update_pipeline,
        patch_pipeline,
        delete_pipeline,
        pipeline_items,
        add_item,
        add_item_at_tail,
        remove_item,
        sort_items,
        first_item,
        next_item,
    ),
    components(
        schemas(
            EnrichItem,
            EnrichItemInput,
            PatchEnrichItem,
            EnrichItemType,
            BehaviorMergeType,
            BehaviorOnError,
            EnrichPipeline,
            EnrichPipelineInput,
            PatchEnrichPipeline,
            PipelineItemInput,
            PipelineItem,
            AddPipelineItem,
            SortPipelineItems,
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
        (name = ITEMS_TAG, description = "Enrich item management"),
        (name = PIPELINES_TAG, description = "Enrich pipelines and their ordered items")
    )
)]
pub struct ApiDoc;

/// Create the enrich router; paths are absolute so the caller merges it
#[allow(deprecated)]
pub fn router<R: EnrichRepository + 'static>(service: EnrichService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/enrich-items", get(list_items).post(create_item))
        .route(
            "/enrich-items/{id}",
            get(get_item)
                .put(update_item)
                .patch(patch_item)
                .delete(delete_item),
        )
        .route("/enrich-items/{id}/unbound-pipelines", get(unbound_pipelines))
        .route("/enrich-pipelines", get(list_pipelines).post(create_pipeline))
        .route(
            "/enrich-pipelines/{id}",
            get(get_pipeline)
                .put(update_pipeline)
                .patch(patch_pipeline)
                .delete(delete_pipeline),
        )
        .route("/enrich-pipelines/{id}/items", get(pipeline_items).post(add_item))
        .route("/enrich-pipelines/{id}/items/sort", post(sort_items))
        .route(
            "/enrich-pipelines/{id}/items/{item_id}",
            put(add_item_at_tail).delete(remove_item),
        )
        .route("/enrich-pipelines/{id}/items/{item_id}/next", get(next_item))
        .route("/enrich-pipelines/{id}/first-item", get(first_item))
        .with_state(shared_service)
}

/// List enrich items
#[utoipa::path(
    get,
    path = "/enrich-items",
    tag = ITEMS_TAG,
    params(PageRequest),
    responses(
        (status = 200, description = "Page of enrich items", body = Connection<EnrichItem>),
        (status = 400, response = BadRequestResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_items<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    Query(page): Query<PageRequest>,
) -> EnrichResult<Json<Connection<EnrichItem>>> {
    Ok(Json(service.list_items(&page).await?))
}

/// Create an enrich item
#[utoipa::path(
    post,
    path = "/enrich-items",
    tag = ITEMS_TAG,
    request_body = EnrichItemInput,
    responses(
        (status = 201, description = "Enrich item created", body = MutationResponse<EnrichItem>),
        (status = 400, description = "Field validators", body = MutationResponse<EnrichItem>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_item<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    JsonBody(input): JsonBody<EnrichItemInput>,
) -> EnrichResult<Response> {
    let response = service.create_item(input).await?;
    Ok(response.into_response_with(StatusCode::CREATED))
}

/// Get an enrich item by ID
#[utoipa::path(
    get,
    path = "/enrich-items/{id}",
    tag = ITEMS_TAG,
    params(("id" = i64, Path, description = "Enrich item ID")),
    responses(
        (status = 200, description = "Enrich item found", body = EnrichItem),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_item<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    IdPath(id): IdPath,
) -> EnrichResult<Json<EnrichItem>> {
    Ok(Json(service.get_item(id).await?))
}

/// Replace every field of an enrich item
#[utoipa::path(
    put,
    path = "/enrich-items/{id}",
    tag = ITEMS_TAG,
    params(("id" = i64, Path, description = "Enrich item ID")),
    request_body = EnrichItemInput,
    responses(
        (status = 200, description = "Enrich item updated", body = MutationResponse<EnrichItem>),
        (status = 400, description = "Field validators", body = MutationResponse<EnrichItem>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_item<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    IdPath(id): IdPath,
    JsonBody(input): JsonBody<EnrichItemInput>,
) -> EnrichResult<Response> {
    Ok(service.update_item(id, input).await?.into_response())
}

/// Update the provided fields of an enrich item
#[utoipa::path(
    patch,
    path = "/enrich-items/{id}",
    tag = ITEMS_TAG,
    params(("id" = i64, Path, description = "Enrich item ID")),
    request_body = PatchEnrichItem,
    responses(
        (status = 200, description = "Enrich item updated", body = MutationResponse<EnrichItem>),
        (status = 400, description = "Field validators", body = MutationResponse<EnrichItem>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn patch_item<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    IdPath(id): IdPath,
    JsonBody(patch): JsonBody<PatchEnrichItem>,
) -> EnrichResult<Response> {
    Ok(service.patch_item(id, patch).await?.into_response())
}

/// Delete an enrich item
///
/// Fails with 409 while the item belongs to a pipeline, unless `detach=true`.
#[utoipa::path(
    delete,
    path = "/enrich-items/{id}",
    tag = ITEMS_TAG,
    params(("id" = i64, Path, description = "Enrich item ID"), DeleteOptions),
    responses(
        (status = 200, description = "Deleted enrich item", body = EnrichItem),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_item<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    IdPath(id): IdPath,
    Query(options): Query<DeleteOptions>,
) -> EnrichResult<Json<EnrichItem>> {
    Ok(Json(service.delete_item(id, options.detach).await?))
}

/// Pipelines that do not contain the enrich item
#[utoipa::path(
    get,
    path = "/enrich-items/{id}/unbound-pipelines",
    tag = ITEMS_TAG,
    params(("id" = i64, Path, description = "Enrich item ID"), PageRequest),
    responses(
        (status = 200, description = "Page of pipelines", body = Connection<EnrichPipeline>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn unbound_pipelines<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    IdPath(id): IdPath,
    Query(page): Query<PageRequest>,
) -> EnrichResult<Json<Connection<EnrichPipeline>>> {
    Ok(Json(service.unbound_pipelines(id, &page).await?))
}

/// List enrich pipelines
#[utoipa::path(
    get,
    path = "/enrich-pipelines",
    tag = PIPELINES_TAG,
    params(PageRequest),
    responses(
        (status = 200, description = "Page of pipelines", body = Connection<EnrichPipeline>),
        (status = 400, response = BadRequestResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_pipelines<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    Query(page): Query<PageRequest>,
) -> EnrichResult<Json<Connection<EnrichPipeline>>> {
    Ok(Json(service.list_pipelines(&page).await?))
}

/// Create a pipeline, optionally with its items
#[utoipa::path(
    post,
    path = "/enrich-pipelines",
    tag = PIPELINES_TAG,
    request_body = EnrichPipelineInput,
    responses(
        (status = 201, description = "Pipeline created", body = MutationResponse<EnrichPipeline>),
        (status = 400, description = "Field validators", body = MutationResponse<EnrichPipeline>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_pipeline<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    JsonBody(input): JsonBody<EnrichPipelineInput>,
) -> EnrichResult<Response> {
    let response = service.create_pipeline(input).await?;
    Ok(response.into_response_with(StatusCode::CREATED))
}

/// Get a pipeline by ID
#[utoipa::path(
    get,
    path = "/enrich-pipelines/{id}",
    tag = PIPELINES_TAG,
    params(("id" = i64, Path, description = "Pipeline ID")),
    responses(
        (status = 200, description = "Pipeline found", body = EnrichPipeline),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_pipeline<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    IdPath(id): IdPath,
) -> EnrichResult<Json<EnrichPipeline>> {
    Ok(Json(service.get_pipeline(id).await?))
}

/// Replace a pipeline; omitting `items` empties it
#[utoipa::path(
    put,
    path = "/enrich-pipelines/{id}",
    tag = PIPELINES_TAG,
    params(("id" = i64, Path, description = "Pipeline ID")),
    request_body = EnrichPipelineInput,
    responses(
        (status = 200, description = "Pipeline updated", body = MutationResponse<EnrichPipeline>),
        (status = 400, description = "Field validators", body = MutationResponse<EnrichPipeline>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_pipeline<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    IdPath(id): IdPath,
    JsonBody(input): JsonBody<EnrichPipelineInput>,
) -> EnrichResult<Response> {
    Ok(service.update_pipeline(id, input).await?.into_response())
}

/// Update the provided fields of a pipeline; `items` are upserted
#[utoipa::path(
    patch,
    path = "/enrich-pipelines/{id}",
    tag = PIPELINES_TAG,
    params(("id" = i64, Path, description = "Pipeline ID")),
    request_body = PatchEnrichPipeline,
    responses(
        (status = 200, description = "Pipeline updated", body = MutationResponse<EnrichPipeline>),
        (status = 400, description = "Field validators", body = MutationResponse<EnrichPipeline>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn patch_pipeline<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    IdPath(id): IdPath,
    JsonBody(patch): JsonBody<PatchEnrichPipeline>,
) -> EnrichResult<Response> {
    Ok(service.patch_pipeline(id, patch).await?.into_response())
}

/// Delete a pipeline and its memberships
#[utoipa::path(
    delete,
    path = "/enrich-pipelines/{id}",
    tag = PIPELINES_TAG,
    params(("id" = i64, Path, description = "Pipeline ID")),
    responses(
        (status = 200, description = "Deleted pipeline", body = EnrichPipeline),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_pipeline<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    IdPath(id): IdPath,
) -> EnrichResult<Json<EnrichPipeline>> {
    Ok(Json(service.delete_pipeline(id).await?))
}

/// Items of a pipeline in traversal order, or the unbound items with `not_equal=true`
#[utoipa::path(
    get,
    path = "/enrich-pipelines/{id}/items",
    tag = PIPELINES_TAG,
    params(("id" = i64, Path, description = "Pipeline ID"), MembershipFilter, PageRequest),
    responses(
        (status = 200, description = "Page of pipeline items", body = Connection<PipelineItem>),
        (status = 400, response = BadRequestResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn pipeline_items<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    IdPath(id): IdPath,
    Query(filter): Query<MembershipFilter>,
    Query(page): Query<PageRequest>,
) -> EnrichResult<Json<Connection<PipelineItem>>> {
    Ok(Json(service.pipeline_items(id, &page, filter.not_equal).await?))
}

/// Add an item at the tail (default) or head of a pipeline
#[utoipa::path(
    post,
    path = "/enrich-pipelines/{id}/items",
    tag = PIPELINES_TAG,
    params(("id" = i64, Path, description = "Pipeline ID")),
    request_body = AddPipelineItem,
    responses(
        (status = 200, description = "Pipeline items in order", body = Vec<PipelineItem>),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn add_item<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    IdPath(id): IdPath,
    JsonBody(input): JsonBody<AddPipelineItem>,
) -> EnrichResult<Json<Vec<PipelineItem>>> {
    Ok(Json(service.add_item(id, input.enrich_item_id, input.tail).await?))
}

/// Append an item to a pipeline
#[utoipa::path(
    put,
    path = "/enrich-pipelines/{id}/items/{item_id}",
    tag = PIPELINES_TAG,
    params(
        ("id" = i64, Path, description = "Pipeline ID"),
        ("item_id" = i64, Path, description = "Enrich item ID")
    ),
    responses(
        (status = 200, description = "Pipeline items in order", body = Vec<PipelineItem>),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
#[deprecated(note = "use POST /enrich-pipelines/{id}/items")]
async fn add_item_at_tail<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    IdPath((id, item_id)): IdPath<(i64, i64)>,
) -> EnrichResult<Json<Vec<PipelineItem>>> {
    Ok(Json(service.add_item(id, item_id, true).await?))
}

/// Remove an item from a pipeline
#[utoipa::path(
    delete,
    path = "/enrich-pipelines/{id}/items/{item_id}",
    tag = PIPELINES_TAG,
    params(
        ("id" = i64, Path, description = "Pipeline ID"),
        ("item_id" = i64, Path, description = "Enrich item ID")
    ),
    responses(
        (status = 200, description = "Remaining pipeline items", body = Vec<PipelineItem>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn remove_item<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    IdPath((id, item_id)): IdPath<(i64, i64)>,
) -> EnrichResult<Json<Vec<PipelineItem>>> {
    Ok(Json(service.remove_item(id, item_id).await?))
}

/// Reorder pipeline items
///
/// Listed items get weights 0, 1, 2, ... in the given order; items not
/// listed keep their weight and unknown ids are ignored.
#[utoipa::path(
    post,
    path = "/enrich-pipelines/{id}/items/sort",
    tag = PIPELINES_TAG,
    params(("id" = i64, Path, description = "Pipeline ID")),
    request_body = SortPipelineItems,
    responses(
        (status = 200, description = "Pipeline items in order", body = Vec<PipelineItem>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn sort_items<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    IdPath(id): IdPath,
    JsonBody(input): JsonBody<SortPipelineItems>,
) -> EnrichResult<Json<Vec<PipelineItem>>> {
    Ok(Json(service.sort_items(id, input.enrich_item_ids).await?))
}

/// First item of a pipeline, `null` when it is empty
#[utoipa::path(
    get,
    path = "/enrich-pipelines/{id}/first-item",
    tag = PIPELINES_TAG,
    params(("id" = i64, Path, description = "Pipeline ID")),
    responses(
        (status = 200, description = "First item", body = Option<PipelineItem>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn first_item<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    IdPath(id): IdPath,
) -> EnrichResult<Json<Option<PipelineItem>>> {
    Ok(Json(service.first_item(id).await?))
}

/// Item following `item_id`, `null` at the end of the pipeline
#[utoipa::path(
    get,
    path = "/enrich-pipelines/{id}/items/{item_id}/next",
    tag = PIPELINES_TAG,
    params(
        ("id" = i64, Path, description = "Pipeline ID"),
        ("item_id" = i64, Path, description = "Enrich item ID")
    ),
    responses(
        (status = 200, description = "Next item", body = Option<PipelineItem>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn next_item<R: EnrichRepository>(
    State(service): State<Arc<EnrichService<R>>>,
    IdPath((id, item_id)): IdPath<(i64, i64)>,
) -> EnrichResult<Json<Option<PipelineItem>>> {
    Ok(Json(service.next_item(id, item_id).await?))
}
