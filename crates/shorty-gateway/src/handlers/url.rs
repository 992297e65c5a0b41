use crate::error::{AppError, Result, EMPTY_BODY_MESSAGE, EMPTY_CODE_MESSAGE};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method, Uri};
use tracing::debug;

/// `POST /`: maps the raw request body to a short code and returns
/// `{host}/{code}`.
pub async fn create_url_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<String> {
    if body.is_empty() {
        return Err(AppError::BadRequest(EMPTY_BODY_MESSAGE.to_string()));
    }

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let code = state.shortener().resolve_or_create(&body).await?;
    debug!(code = %code, host, "Shortened long value");

    Ok(code.to_url(host))
}

/// `GET /{code}`: returns the long value stored for the code.
pub async fn resolve_url_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Vec<u8>> {
    Ok(state.shortener().resolve_by_code(&code).await?)
}

/// Any path no route matched, such as `/a/b`. A `GET` treats the whole path
/// as the code, so it answers like any other unknown code.
pub async fn resolve_path_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> Result<Vec<u8>> {
    if method != Method::GET && method != Method::HEAD {
        return Err(AppError::MethodNotAllowed);
    }

    let code = uri.path().trim_start_matches('/');
    Ok(state.shortener().resolve_by_code(code).await?)
}

/// `GET /`: a lookup without a code.
pub async fn empty_code_handler() -> AppError {
    AppError::BadRequest(EMPTY_CODE_MESSAGE.to_string())
}
