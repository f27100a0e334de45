//! Service status and documentation endpoints.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
    /// Only reported in demo mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `GET /api/health`
///
/// Responds 200 with `status: "ok"` while the store is reachable, 503 otherwise.
#[inline]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let environment = state
        .demo
        .then(|| state.settings.daemon.environment.to_string());

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(Health {
                status: "ok",
                environment,
                timestamp,
                error: None,
            }),
        ),
        Err(e) => {
            log::error!("Health check failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Health {
                    status: "error",
                    environment,
                    timestamp,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// `GET /api/docs`
#[inline]
pub async fn docs(State(state): State<AppState>) -> Html<String> {
    let settings = &state.settings.daemon;
    let max_mib = settings.max_upload_size / (1024 * 1024);
    let types = settings.allowed_mime_types.join(", ");

    let deployment = if state.demo {
        format!(
            r#"
    <p>Environment: {}</p>
    <h2>Deployment status</h2>
    <ul>
      <li>Server is running</li>
      <li>API is available</li>
      <li>Song metadata is kept in memory and is lost on restart</li>
    </ul>"#,
            settings.environment
        )
    } else {
        String::new()
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <title>Songbox API</title>
    <style>
      body {{ font-family: sans-serif; margin: 40px; }}
      .endpoint {{ background: #f5f5f5; padding: 16px; margin: 10px 0; border-radius: 5px; }}
    </style>
  </head>
  <body>
    <h1>Songbox API</h1>{deployment}
    <div class="endpoint">
      <h3>GET /api/health</h3>
      <p>Service health check.</p>
    </div>
    <div class="endpoint">
      <h3>GET /api/songs</h3>
      <p>List every uploaded song.</p>
    </div>
    <div class="endpoint">
      <h3>POST /api/songs</h3>
      <p>Upload a song, as <code>multipart/form-data</code> with the fields:</p>
      <ul>
        <li><code>title</code>: name of the song</li>
        <li><code>artist</code>: the performing artist</li>
        <li><code>song</code>: the audio file ({types}, at most {max_mib} MiB)</li>
      </ul>
    </div>
  </body>
</html>
"#
    ))
}
