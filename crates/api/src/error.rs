use crate::handlers::ErrorResponse;
use axum::{http::StatusCode, Json};
use wsrbac_authz::AuthzError;

pub type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

pub fn status_for(err: &AuthzError) -> StatusCode {
    match err {
        AuthzError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        AuthzError::NotFound(_) => StatusCode::NOT_FOUND,
        AuthzError::Validation(_) | AuthzError::ImmutableField(_) => StatusCode::BAD_REQUEST,
        AuthzError::AlreadyMember(_) | AuthzError::Conflict(_) => StatusCode::CONFLICT,
        AuthzError::DoesNotExist(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AuthzError::ProtectedOwner(_) | AuthzError::PolicyViolation(_) => StatusCode::FORBIDDEN,
        AuthzError::Infrastructure(_) => StatusCode::SERVICE_UNAVAILABLE,
        AuthzError::Cache(_) | AuthzError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn authz_error(err: AuthzError) -> (StatusCode, Json<ErrorResponse>) {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    }
    (status, Json(ErrorResponse::new(err.code(), &err.to_string())))
}

pub fn not_found(what: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("not_found", &format!("{} not found", what))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_failure_kind_has_its_own_status() {
        assert_eq!(status_for(&AuthzError::NotFound(String::new())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&AuthzError::AlreadyMember(String::new())), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&AuthzError::DoesNotExist(String::new())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(&AuthzError::ProtectedOwner(String::new())), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(&AuthzError::Infrastructure(String::new())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
