/// Generation client — the single point of entry for all generative model
/// calls (Gemini for text, Imagen for images).
///
/// ARCHITECTURAL RULE: No other module may call the provider API directly.
/// All generation traffic MUST go through this module.
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::AppError;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// Text model used to turn tier context into an image prompt.
pub const TEXT_MODEL: &str = "gemini-1.5-pro";
/// Image model used to render the avatar. Exactly one image per call.
pub const IMAGE_MODEL: &str = "imagen-3.0-generate-002";
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Base64 decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Model returned empty content")]
    EmptyContent,
}

impl From<GenError> for AppError {
    fn from(e: GenError) -> Self {
        AppError::Generation(e.to_string())
    }
}

/// Text-generation collaborator. Deterministic template in, model text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str, system: &str) -> Result<String, AppError>;
}

/// Image-generation collaborator. Returns raw PNG bytes.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Result<Bytes, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: Vec<PredictInstance<'a>>,
    parameters: PredictParameters<'a>,
}

#[derive(Debug, Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters<'a> {
    sample_count: u32,
    aspect_ratio: &'a str,
    person_generation: &'a str,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The single generation client used by the avatar pipeline.
/// Wraps the Gemini and Imagen REST endpoints with retry logic.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// POSTs a JSON body to a model endpoint.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    async fn post_with_retry<B: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R, GenError> {
        let mut last_error: Option<GenError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Generation call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .header("content-type", "application/json")
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(GenError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let text = response.text().await.unwrap_or_default();
                warn!("Generation API returned {status}: {text}");
                last_error = Some(GenError::Api {
                    status: status.as_u16(),
                    message: text,
                });
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiError>(&text)
                    .map(|e| e.error.message)
                    .unwrap_or(text);
                return Err(GenError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return response.json::<R>().await.map_err(GenError::Http);
        }

        Err(last_error.unwrap_or(GenError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(&self, prompt: &str, system: &str) -> Result<String, AppError> {
        let url = format!("{API_BASE}/{TEXT_MODEL}:generateContent");
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            system_instruction: Some(Content {
                parts: vec![Part { text: system }],
            }),
        };

        let response: GenerateContentResponse = self.post_with_retry(&url, &request).await?;
        let text = extract_text(&response).ok_or(GenError::EmptyContent)?;

        debug!("Text generation succeeded ({} chars)", text.len());
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate_image(&self, prompt: &str) -> Result<Bytes, AppError> {
        let url = format!("{API_BASE}/{IMAGE_MODEL}:predict");
        let request = PredictRequest {
            instances: vec![PredictInstance { prompt }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio: "1:1",
                person_generation: "allow_adult",
            },
        };

        let response: PredictResponse = self.post_with_retry(&url, &request).await?;
        let bytes = decode_image(&response)?;

        debug!("Image generation succeeded ({} bytes)", bytes.len());
        Ok(bytes)
    }
}

/// Extracts the first non-empty text part from a generateContent response.
fn extract_text(response: &GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .iter()
        .flat_map(|c| c.content.parts.iter())
        .find_map(|p| {
            p.text
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .map(String::from)
        })
}

/// Decodes the first prediction's base64 payload into raw image bytes.
fn decode_image(response: &PredictResponse) -> Result<Bytes, GenError> {
    let encoded = response
        .predictions
        .iter()
        .find_map(|p| p.bytes_base64_encoded.as_deref())
        .ok_or(GenError::EmptyContent)?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    Ok(Bytes::from(decoded))
}
