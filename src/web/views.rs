use super::prelude::*;
use axum::extract::rejection::FormRejection;
use axum::response::Response;
use tracing::debug;

use crate::prompt::{Prompt, trim_prompt};

#[derive(Deserialize)]
pub(crate) struct ComposeForm {
    #[serde(default)]
    prompt: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub(crate) struct HomeTemplate {
    pub(crate) api_base_url: String,
    pub(crate) prompt: String,
    pub(crate) has_error: bool,
    pub(crate) error_message: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "result.html")]
pub(crate) struct ResultTemplate {
    pub(crate) api_base_url: String,
    pub(crate) prompt: String,
    pub(crate) image_url: String,
    pub(crate) overlay_name: String,
    pub(crate) file_name: String,
}

/// handles the / GET
pub(crate) async fn home_handler(State(state): State<AppState>) -> HomeTemplate {
    HomeTemplate {
        api_base_url: state.public_api_base_url().to_string(),
        prompt: String::new(),
        has_error: false,
        error_message: String::new(),
    }
}

/// handles the /compose POST from the home page form
pub(crate) async fn compose_form_handler(
    State(state): State<AppState>,
    form: Result<Form<ComposeForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            debug!("Rejected compose form: {rejection}");
            ComposeForm {
                prompt: String::new(),
            }
        }
    };
    let api_base_url = state.public_api_base_url().to_string();
    let result = match Prompt::parse(&form.prompt) {
        Ok(prompt) => state.compose(&prompt).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(composed) => ResultTemplate {
            api_base_url,
            prompt: trim_prompt(&form.prompt).to_string(),
            image_url: composed.image_url,
            overlay_name: composed.overlay.name,
            file_name: composed.file_name,
        }
        .into_response(),
        Err(err) => {
            let status = err.status_code();
            if status.is_server_error() {
                error!("Compose form failed: {err}");
            }
            (
                status,
                HomeTemplate {
                    api_base_url,
                    prompt: form.prompt,
                    has_error: true,
                    error_message: err.to_string(),
                },
            )
                .into_response()
        }
    }
}
