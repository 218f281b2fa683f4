use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// ARM error envelope `{"error": {"code", "message"}}`.
    #[error("{code} ({status}): {message}")]
    Cloud { status: u16, code: String, message: String },
    #[error("long-running operation ended with status {status}: {message}")]
    Operation { status: String, message: String },
    #[error("operation did not finish after {attempts} polls")]
    Timeout { attempts: u32 },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl AzureError {
    pub(crate) fn from_body(status: u16, body: &str) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let err = parsed.as_ref().and_then(|v| v.get("error"));
        let field = |k: &str| err.and_then(|e| e.get(k)).and_then(|v| v.as_str()).map(str::to_string);
        AzureError::Cloud {
            status,
            code: field("code").unwrap_or_else(|| "HttpError".to_string()),
            message: field("message").unwrap_or_else(|| body.trim().to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AzureError>;
