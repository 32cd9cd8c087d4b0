//! API client for a running prediction server

use precept_lib::serving::{ColumnsResponse, ErrorBody};
use precept_lib::Frame;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a structured error body
    #[error("server rejected request ({status}, {class}): {message}")]
    Api {
        status: StatusCode,
        class: String,
        message: String,
    },

    /// Server answered with an error that is not a structured body
    #[error("server error ({status}): {body}")]
    Status { status: StatusCode, body: String },
}

impl ClientError {
    /// True when the server blamed the request rather than itself
    pub fn is_client_failure(&self) -> bool {
        matches!(self, ClientError::Api { class, .. } if class == "client")
    }
}

/// HTTP client for the prediction server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let base_url = Url::parse(base_url)?;

        Ok(Self { client, base_url })
    }

    /// Input and output column names of the served model
    pub async fn columns(&self) -> Result<ColumnsResponse, ClientError> {
        let url = self.base_url.join("columns")?;
        let response = self.client.get(url).send().await?;
        decode(response).await
    }

    /// Predict outputs for every row of `inputs`
    pub async fn predict(&self, inputs: &Frame) -> Result<Frame, ClientError> {
        let url = self.base_url.join("predict")?;
        let response = self.client.post(url).json(inputs).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(err) => Err(ClientError::Api {
            status,
            class: err.error.as_str().to_string(),
            message: err.message,
        }),
        Err(_) => Err(ClientError::Status { status, body }),
    }
}
