pub(crate) use crate::error::StudioError;
pub(crate) use crate::web::AppState;
pub(crate) use askama::Template;
pub(crate) use askama_web::WebTemplate;
pub(crate) use axum::extract::{Form, State};
pub(crate) use axum::response::IntoResponse;
pub(crate) use serde::Deserialize;
pub(crate) use tracing::{error, info};
