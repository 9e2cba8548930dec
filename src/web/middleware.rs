use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

/// 404s any path with a dot-prefixed segment so `.env` and friends never leave the static root.
pub(crate) async fn hide_dotfiles(request: Request<Body>, next: Next) -> Response {
    if is_hidden_path(request.uri().path()) {
        debug!("Refusing hidden path {}", request.uri().path());
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(request).await
}

fn is_hidden_path(path: &str) -> bool {
    path.split('/').any(|segment| {
        segment.starts_with('.')
            || segment
                .get(..3)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("%2e"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_segments_are_hidden() {
        for path in ["/.env", "/assets/.git/config", "/%2Eenv", "/a/%2e%2e/secret"] {
            assert!(is_hidden_path(path), "{path}");
        }
        for path in ["/", "/index.html", "/assets/overlays/a.png", "/api/reference-images"] {
            assert!(!is_hidden_path(path), "{path}");
        }
    }
}
