//! Shared HTTP client utilities and error types.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use anyhow::anyhow;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_LAST_EVENT_ID: &str = "Last-Event-ID";

/// Separates bad input (exit code 2) from operational failures (exit code 3).
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// Handler context: configured client plus the server root.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) client: Client,
    pub(crate) base_url: Url,
}

impl AppContext {
    /// Build a client that tags every request with `trace_id`.
    pub(crate) fn new(base_url: Url, timeout_secs: u64, trace_id: &str) -> CliResult<Self> {
        let mut default_headers = HeaderMap::new();
        let request_id = HeaderValue::from_str(trace_id).map_err(|_| {
            CliError::failure(anyhow!("trace identifier contains invalid characters"))
        })?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, base_url })
    }

    pub(crate) fn endpoint(&self, path: &str) -> CliResult<Url> {
        self.base_url
            .join(path)
            .map_err(|err| CliError::failure(anyhow!("invalid base URL: {err}")))
    }
}

/// Parse the API URL provided to the CLI.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

#[derive(Debug, Deserialize)]
struct ProblemBody {
    title: String,
    status: u16,
    #[serde(default)]
    detail: Option<String>,
}

/// Classify an unsuccessful response into a CLI error.
pub(crate) async fn classify_problem(response: reqwest::Response) -> CliError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();
    let body_text = String::from_utf8_lossy(&bytes).trim().to_string();
    let problem = serde_json::from_slice::<ProblemBody>(&bytes).ok();

    let message = problem
        .as_ref()
        .and_then(|problem| problem.detail.clone())
        .unwrap_or_else(|| {
            problem
                .as_ref()
                .map_or_else(|| body_text.clone(), |problem| problem.title.clone())
        });

    if status == StatusCode::BAD_REQUEST {
        CliError::validation(message)
    } else if let Some(problem) = problem {
        CliError::failure(anyhow!("{message} (status {})", problem.status))
    } else if body_text.is_empty() {
        CliError::failure(anyhow!("request failed with status {status}"))
    } else {
        CliError::failure(anyhow!("{message} (status {status})"))
    }
}
