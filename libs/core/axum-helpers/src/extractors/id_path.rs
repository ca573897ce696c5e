use crate::errors::AppError;
use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

/// Numeric path parameters.
///
/// `IdPath<i64>` for `/{id}`, `IdPath<(i64, i64)>` for `/{id}/items/{item_id}`.
///
/// ```ignore
/// async fn get_pipeline(IdPath(id): IdPath) -> String {
///     format!("pipeline {id}")
/// }
///
/// let app = Router::new().route("/enrich-pipelines/{id}", get(get_pipeline));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdPath<T = i64>(pub T);

impl<S, T> FromRequestParts<S> for IdPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(IdPath(value))
    }
}
