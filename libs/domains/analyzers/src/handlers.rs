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

use crate::error::AnalyzerResult;
use crate::models::{
    AddAnalyzerFilter, Analyzer, AnalyzerFilter, AnalyzerInput, DeleteOptions, Filter,
    FilterInput, FilterKind, FilterWeight, MembershipFilter, PatchAnalyzer, PatchFilter,
    ReplaceAnalyzerFilters, SortAnalyzerFilters,
};
use crate::repository::AnalyzerRepository;
use crate::service::AnalyzerService;

pub const ANALYZERS_TAG: &str = "analyzers";
pub const FILTERS_TAG: &str = "analysis-filters";

#[derive(OpenApi)]
#[openapi(
    paths(
        list_analyzers,
        create_analyzer,
        get_analyzer,
        update_analyzer,
        patch_analyzer,
        delete_analyzer,
        analyzer_filters,
        add_filter,
        replace_filters,
        clear_filters,
        sort_filters,
        remove_filter,
        list_filters,
        create_filter,
        get_filter,
        update_filter,
        patch_filter,
        delete_filter,
        unbound_analyzers,
    ),
    components(
        schemas(
            Analyzer,
            AnalyzerInput,
            PatchAnalyzer,
            Filter,
            FilterInput,
            PatchFilter,
            FilterKind,
            AnalyzerFilter,
            FilterWeight,
            AddAnalyzerFilter,
            SortAnalyzerFilters,
            ReplaceAnalyzerFilters,
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
        (name = ANALYZERS_TAG, description = "Analyzers and their ordered token / char filters"),
        (name = FILTERS_TAG, description = "Token and char filter management")
    )
)]
pub struct ApiDoc;

/// Create the analyzer router; paths are absolute so the caller merges it.
///
/// `{kind}` is `token-filters` or `char-filters`.
pub fn router<R: AnalyzerRepository + 'static>(service: AnalyzerService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/analyzers", get(list_analyzers).post(create_analyzer))
        .route(
            "/analyzers/{id}",
            get(get_analyzer)
                .put(update_analyzer)
                .patch(patch_analyzer)
                .delete(delete_analyzer),
        )
        .route(
            "/analyzers/{id}/{kind}",
            get(analyzer_filters)
                .post(add_filter)
                .put(replace_filters)
                .delete(clear_filters),
        )
        .route("/analyzers/{id}/{kind}/sort", post(sort_filters))
        .route("/analyzers/{id}/{kind}/{filter_id}", delete(remove_filter))
        .route("/analysis/{kind}", get(list_filters).post(create_filter))
        .route(
            "/analysis/{kind}/{id}",
            get(get_filter)
                .put(update_filter)
                .patch(patch_filter)
                .delete(delete_filter),
        )
        .route("/analysis/{kind}/{id}/unbound-analyzers", get(unbound_analyzers))
        .with_state(shared_service)
}

/// List analyzers
#[utoipa::path(
    get,
    path = "/analyzers",
    tag = ANALYZERS_TAG,
    params(PageRequest),
    responses(
        (status = 200, description = "Page of analyzers", body = Connection<Analyzer>),
        (status = 400, response = BadRequestResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_analyzers<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    Query(page): Query<PageRequest>,
) -> AnalyzerResult<Json<Connection<Analyzer>>> {
    Ok(Json(service.list_analyzers(&page).await?))
}

/// Create an analyzer
#[utoipa::path(
    post,
    path = "/analyzers",
    tag = ANALYZERS_TAG,
    request_body = AnalyzerInput,
    responses(
        (status = 201, description = "Analyzer created", body = MutationResponse<Analyzer>),
        (status = 400, description = "Field validators", body = MutationResponse<Analyzer>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_analyzer<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    JsonBody(input): JsonBody<AnalyzerInput>,
) -> AnalyzerResult<Response> {
    let response = service.create_analyzer(input).await?;
    Ok(response.into_response_with(StatusCode::CREATED))
}

#[utoipa::path(
    get,
    path = "/analyzers/{id}",
    tag = ANALYZERS_TAG,
    params(("id" = i64, Path, description = "Analyzer ID")),
    responses(
        (status = 200, description = "Analyzer found", body = Analyzer),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_analyzer<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath(id): IdPath,
) -> AnalyzerResult<Json<Analyzer>> {
    Ok(Json(service.get_analyzer(id).await?))
}

#[utoipa::path(
    put,
    path = "/analyzers/{id}",
    tag = ANALYZERS_TAG,
    params(("id" = i64, Path, description = "Analyzer ID")),
    request_body = AnalyzerInput,
    responses(
        (status = 200, description = "Analyzer updated", body = MutationResponse<Analyzer>),
        (status = 400, description = "Field validators", body = MutationResponse<Analyzer>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_analyzer<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath(id): IdPath,
    JsonBody(input): JsonBody<AnalyzerInput>,
) -> AnalyzerResult<Response> {
    Ok(service.update_analyzer(id, input).await?.into_response())
}

#[utoipa::path(
    patch,
    path = "/analyzers/{id}",
    tag = ANALYZERS_TAG,
    params(("id" = i64, Path, description = "Analyzer ID")),
    request_body = PatchAnalyzer,
    responses(
        (status = 200, description = "Analyzer updated", body = MutationResponse<Analyzer>),
        (status = 400, description = "Field validators", body = MutationResponse<Analyzer>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn patch_analyzer<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath(id): IdPath,
    JsonBody(patch): JsonBody<PatchAnalyzer>,
) -> AnalyzerResult<Response> {
    Ok(service.patch_analyzer(id, patch).await?.into_response())
}

/// Delete an analyzer and both of its filter sets
#[utoipa::path(
    delete,
    path = "/analyzers/{id}",
    tag = ANALYZERS_TAG,
    params(("id" = i64, Path, description = "Analyzer ID")),
    responses(
        (status = 200, description = "Deleted analyzer", body = Analyzer),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_analyzer<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath(id): IdPath,
) -> AnalyzerResult<Json<Analyzer>> {
    Ok(Json(service.delete_analyzer(id).await?))
}

/// Filters of an analyzer in traversal order, or the unbound ones with `not_equal=true`
#[utoipa::path(
    get,
    path = "/analyzers/{id}/{kind}",
    tag = ANALYZERS_TAG,
    params(
        ("id" = i64, Path, description = "Analyzer ID"),
        ("kind" = FilterKind, Path, description = "Filter kind"),
        MembershipFilter,
        PageRequest
    ),
    responses(
        (status = 200, description = "Page of filters", body = Connection<AnalyzerFilter>),
        (status = 400, response = BadRequestResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn analyzer_filters<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath((id, kind)): IdPath<(i64, FilterKind)>,
    Query(filter): Query<MembershipFilter>,
    Query(page): Query<PageRequest>,
) -> AnalyzerResult<Json<Connection<AnalyzerFilter>>> {
    Ok(Json(
        service
            .analyzer_filters(kind, id, &page, filter.not_equal)
            .await?,
    ))
}

/// Add a filter at the tail (default) or head of the analyzer's chain
#[utoipa::path(
    post,
    path = "/analyzers/{id}/{kind}",
    tag = ANALYZERS_TAG,
    params(
        ("id" = i64, Path, description = "Analyzer ID"),
        ("kind" = FilterKind, Path, description = "Filter kind")
    ),
    request_body = AddAnalyzerFilter,
    responses(
        (status = 200, description = "Filters in order", body = Vec<AnalyzerFilter>),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn add_filter<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath((id, kind)): IdPath<(i64, FilterKind)>,
    JsonBody(input): JsonBody<AddAnalyzerFilter>,
) -> AnalyzerResult<Json<Vec<AnalyzerFilter>>> {
    Ok(Json(
        service
            .add_filter(kind, id, input.filter_id, input.tail)
            .await?,
    ))
}

/// Replace the analyzer's filters of one kind, or upsert them with `partial=true`
#[utoipa::path(
    put,
    path = "/analyzers/{id}/{kind}",
    tag = ANALYZERS_TAG,
    params(
        ("id" = i64, Path, description = "Analyzer ID"),
        ("kind" = FilterKind, Path, description = "Filter kind")
    ),
    request_body = ReplaceAnalyzerFilters,
    responses(
        (status = 200, description = "Filters in order", body = MutationResponse<Vec<AnalyzerFilter>>),
        (status = 400, description = "Field validators", body = MutationResponse<Vec<AnalyzerFilter>>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn replace_filters<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath((id, kind)): IdPath<(i64, FilterKind)>,
    JsonBody(input): JsonBody<ReplaceAnalyzerFilters>,
) -> AnalyzerResult<Response> {
    let response = service
        .replace_filters(kind, id, input.filters, input.partial)
        .await?;
    Ok(response.into_response())
}

/// Remove every filter of one kind from the analyzer
#[utoipa::path(
    delete,
    path = "/analyzers/{id}/{kind}",
    tag = ANALYZERS_TAG,
    params(
        ("id" = i64, Path, description = "Analyzer ID"),
        ("kind" = FilterKind, Path, description = "Filter kind")
    ),
    responses(
        (status = 200, description = "Empty filter list", body = Vec<AnalyzerFilter>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn clear_filters<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath((id, kind)): IdPath<(i64, FilterKind)>,
) -> AnalyzerResult<Json<Vec<AnalyzerFilter>>> {
    Ok(Json(service.clear_filters(kind, id).await?))
}

/// Reorder the analyzer's filters of one kind; unknown ids are ignored
#[utoipa::path(
    post,
    path = "/analyzers/{id}/{kind}/sort",
    tag = ANALYZERS_TAG,
    params(
        ("id" = i64, Path, description = "Analyzer ID"),
        ("kind" = FilterKind, Path, description = "Filter kind")
    ),
    request_body = SortAnalyzerFilters,
    responses(
        (status = 200, description = "Filters in order", body = Vec<AnalyzerFilter>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn sort_filters<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath((id, kind)): IdPath<(i64, FilterKind)>,
    JsonBody(input): JsonBody<SortAnalyzerFilters>,
) -> AnalyzerResult<Json<Vec<AnalyzerFilter>>> {
    Ok(Json(service.sort_filters(kind, id, input.filter_ids).await?))
}

#[utoipa::path(
    delete,
    path = "/analyzers/{id}/{kind}/{filter_id}",
    tag = ANALYZERS_TAG,
    params(
        ("id" = i64, Path, description = "Analyzer ID"),
        ("kind" = FilterKind, Path, description = "Filter kind"),
        ("filter_id" = i64, Path, description = "Filter ID")
    ),
    responses(
        (status = 200, description = "Remaining filters", body = Vec<AnalyzerFilter>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn remove_filter<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath((id, kind, filter_id)): IdPath<(i64, FilterKind, i64)>,
) -> AnalyzerResult<Json<Vec<AnalyzerFilter>>> {
    Ok(Json(service.remove_filter(kind, id, filter_id).await?))
}

/// List token or char filters
#[utoipa::path(
    get,
    path = "/analysis/{kind}",
    tag = FILTERS_TAG,
    params(("kind" = FilterKind, Path, description = "Filter kind"), PageRequest),
    responses(
        (status = 200, description = "Page of filters", body = Connection<Filter>),
        (status = 400, response = BadRequestResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_filters<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath(kind): IdPath<FilterKind>,
    Query(page): Query<PageRequest>,
) -> AnalyzerResult<Json<Connection<Filter>>> {
    Ok(Json(service.list_filters(kind, &page).await?))
}

#[utoipa::path(
    post,
    path = "/analysis/{kind}",
    tag = FILTERS_TAG,
    params(("kind" = FilterKind, Path, description = "Filter kind")),
    request_body = FilterInput,
    responses(
        (status = 201, description = "Filter created", body = MutationResponse<Filter>),
        (status = 400, description = "Field validators", body = MutationResponse<Filter>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_filter<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath(kind): IdPath<FilterKind>,
    JsonBody(input): JsonBody<FilterInput>,
) -> AnalyzerResult<Response> {
    let response = service.create_filter(kind, input).await?;
    Ok(response.into_response_with(StatusCode::CREATED))
}

#[utoipa::path(
    get,
    path = "/analysis/{kind}/{id}",
    tag = FILTERS_TAG,
    params(
        ("kind" = FilterKind, Path, description = "Filter kind"),
        ("id" = i64, Path, description = "Filter ID")
    ),
    responses(
        (status = 200, description = "Filter found", body = Filter),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_filter<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath((kind, id)): IdPath<(FilterKind, i64)>,
) -> AnalyzerResult<Json<Filter>> {
    Ok(Json(service.get_filter(kind, id).await?))
}

#[utoipa::path(
    put,
    path = "/analysis/{kind}/{id}",
    tag = FILTERS_TAG,
    params(
        ("kind" = FilterKind, Path, description = "Filter kind"),
        ("id" = i64, Path, description = "Filter ID")
    ),
    request_body = FilterInput,
    responses(
        (status = 200, description = "Filter updated", body = MutationResponse<Filter>),
        (status = 400, description = "Field validators", body = MutationResponse<Filter>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_filter<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath((kind, id)): IdPath<(FilterKind, i64)>,
    JsonBody(input): JsonBody<FilterInput>,
) -> AnalyzerResult<Response> {
    Ok(service.update_filter(kind, id, input).await?.into_response())
}

#[utoipa::path(
    patch,
    path = "/analysis/{kind}/{id}",
    tag = FILTERS_TAG,
    params(
        ("kind" = FilterKind, Path, description = "Filter kind"),
        ("id" = i64, Path, description = "Filter ID")
    ),
    request_body = PatchFilter,
    responses(
        (status = 200, description = "Filter updated", body = MutationResponse<Filter>),
        (status = 400, description = "Field validators", body = MutationResponse<Filter>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn patch_filter<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath((kind, id)): IdPath<(FilterKind, i64)>,
    JsonBody(patch): JsonBody<PatchFilter>,
) -> AnalyzerResult<Response> {
    Ok(service.patch_filter(kind, id, patch).await?.into_response())
}

/// Delete a filter
///
/// Fails with 409 while an analyzer uses the filter, unless `detach=true`.
#[utoipa::path(
    delete,
    path = "/analysis/{kind}/{id}",
    tag = FILTERS_TAG,
    params(
        ("kind" = FilterKind, Path, description = "Filter kind"),
        ("id" = i64, Path, description = "Filter ID"),
        DeleteOptions
    ),
    responses(
        (status = 200, description = "Deleted filter", body = Filter),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_filter<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath((kind, id)): IdPath<(FilterKind, i64)>,
    Query(options): Query<DeleteOptions>,
) -> AnalyzerResult<Json<Filter>> {
    Ok(Json(service.delete_filter(kind, id, options.detach).await?))
}

/// Analyzers that do not use the filter
#[utoipa::path(
    get,
    path = "/analysis/{kind}/{id}/unbound-analyzers",
    tag = FILTERS_TAG,
    params(
        ("kind" = FilterKind, Path, description = "Filter kind"),
        ("id" = i64, Path, description = "Filter ID"),
        PageRequest
    ),
    responses(
        (status = 200, description = "Page of analyzers", body = Connection<Analyzer>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn unbound_analyzers<R: AnalyzerRepository>(
    State(service): State<Arc<AnalyzerService<R>>>,
    IdPath((kind, id)): IdPath<(FilterKind, i64)>,
    Query(page): Query<PageRequest>,
) -> AnalyzerResult<Json<Connection<Analyzer>>> {
    Ok(Json(service.unbound_analyzers(kind, id, &page).await?))
}
