// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! HTTP client for the remote mudra classifier

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub use reqwest::StatusCode;

use crate::config::ClassifierConfig;
use crate::media::Artifact;
use crate::{MudraError, Result};

/// A single classification: which mudra, and how sure the model is (percent)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub mudra: String,
    pub confidence: f64,
}

/// Anything that can label a photo with a mudra
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, photo: &Artifact) -> Result<Prediction>;
}

#[derive(Deserialize)]
struct PredictResponse {
    mudra: Option<String>,
    label: Option<String>,
    confidence: Option<f64>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

/// Classifier reached over HTTP with a multipart upload
pub struct HttpClassifier {
    client: Client,
    url: String,
    field_name: String,
}

impl HttpClassifier {
    /// Create a new classifier client
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            field_name: config.field_name.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Check that the classifier host answers at all
    pub async fn health_check(&self) -> Result<()> {
        let url = origin_of(&self.url);

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MudraError::Server {
                status: response.status().as_u16(),
                message: format!("Server error: {}", response.status().as_u16()),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, photo: &Artifact) -> Result<Prediction> {
        let part = Part::bytes(photo.bytes.clone())
            .file_name(photo.name.clone())
            .mime_str(&photo.mime)
            .map_err(|_| MudraError::InvalidMime(photo.mime.clone()))?;
        let form = Form::new().part(self.field_name.clone(), part);

        debug!("Sending {} ({} bytes) to {}", photo.name, photo.len(), self.url);

        let response = self.client.post(&self.url).multipart(form).send().await?;
        let status = response.status();
        debug!("Classifier responded with status {}", status);

        let body = response.bytes().await?;
        interpret_response(status, &body)
    }
}

/// Turn a classifier HTTP response into a prediction or a user-facing error
pub fn interpret_response(status: StatusCode, body: &[u8]) -> Result<Prediction> {
    if !status.is_success() {
        let error: ErrorResponse = match serde_json::from_slice(body) {
            Ok(error) => error,
            Err(_) => {
                warn!("Classifier returned {} with a non-JSON body", status);
                return Err(MudraError::ServerUnavailable);
            }
        };
        let message = error
            .error
            .unwrap_or_else(|| format!("Server error: {}", status.as_u16()));
        return Err(MudraError::Server {
            status: status.as_u16(),
            message,
        });
    }

    let parsed: PredictResponse =
        serde_json::from_slice(body).map_err(|_| MudraError::MalformedResponse)?;

    match (parsed.mudra.or(parsed.label), parsed.confidence) {
        (Some(mudra), Some(confidence)) if confidence.is_finite() => Ok(Prediction { mudra, confidence }),
        _ => Err(MudraError::MalformedResponse),
    }
}

/// `scheme://host[:port]/` of an endpoint URL
fn origin_of(url: &str) -> String {
    match url.find("://") {
        Some(idx) => {
            let rest = &url[idx + 3..];
            let host_end = rest.find('/').unwrap_or(rest.len());
            format!("{}/", &url[..idx + 3 + host_end])
        }
        None => url.to_string(),
    }
}
