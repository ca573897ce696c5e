use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    components(schemas(axum_helpers::ErrorResponse)),
    info(
        title = "Datasource API",
        version = "0.1.0",
        description = "Admin control plane for enrich pipelines, suggestion buckets and text analyzers, with their ordered member sets"
    ),
    servers((url = "/api", description = "API base path")),
    nest((path = "/events", api = entity_events::ApiDoc))
)]
struct BaseDoc;

/// Combined document served by the docs UIs.
///
/// Domain routers register absolute paths, so their documents are merged
/// rather than nested.
pub struct ApiDoc;

impl OpenApi for ApiDoc {
    fn openapi() -> utoipa::openapi::OpenApi {
        let mut doc = BaseDoc::openapi();
        doc.merge(domain_enrich::ApiDoc::openapi());
        doc.merge(domain_buckets::ApiDoc::openapi());
        doc.merge(domain_analyzers::ApiDoc::openapi());
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_domain() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        for path in [
            "/events",
            "/enrich-pipelines/{id}/items",
            "/buckets/{id}/suggestion-categories",
            "/analyzers/{id}/{kind}",
            "/analysis/{kind}/{id}",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }

        let tags: Vec<_> = doc
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|tag| tag.name)
            .collect();
        assert!(tags.contains(&"events".to_string()));
        assert!(tags.contains(&"buckets".to_string()));
    }
}
