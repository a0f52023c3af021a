//! Vertex AI text-embedding client.

use super::{embed_chunked, Embedder, DEFAULT_BATCH_SIZE};
use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};

/// Default region.
pub const DEFAULT_LOCATION: &str = "us-central1";

/// Default model.
pub const DEFAULT_MODEL: &str = "text-embedding-004";

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: Vec<Instance<'a>>,
}

#[derive(Serialize)]
struct Instance<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Prediction {
    embeddings: Values,
}

#[derive(Deserialize)]
struct Values {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiError {
    code: i64,
    message: String,
}

/// Blocking client for the Vertex AI `:predict` endpoint.
pub struct VertexEmbedder {
    project: String,
    location: String,
    model: String,
    base_url: String,
    access_token: String,
    batch_size: usize,
    client: reqwest::blocking::Client,
}

impl VertexEmbedder {
    /// Client for `project` in `location` with the default model and the
    /// regional endpoint.
    pub fn new(project: &str, location: &str, access_token: &str) -> Self {
        Self {
            project: project.to_string(),
            location: location.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: format!("https://{}-aiplatform.googleapis.com", location),
            access_token: access_token.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Use a different model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Use a different endpoint base, e.g. a local proxy.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Texts per request.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Full `:predict` URL.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:predict",
            self.base_url, self.project, self.location, self.model
        )
    }

    fn predict(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = PredictRequest {
            instances: texts.iter().map(|t| Instance { content: t }).collect(),
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().unwrap_or_default();
            return Err(GraphError::Embedding(format!(
                "Vertex AI returned status {}: {}",
                status, text
            )));
        }

        let parsed: PredictResponse = response.json()?;
        if let Some(err) = parsed.error {
            return Err(GraphError::Embedding(format!(
                "Vertex AI error {}: {}",
                err.code, err.message
            )));
        }
        Ok(parsed
            .predictions
            .into_iter()
            .map(|p| p.embeddings.values)
            .collect())
    }
}

impl Embedder for VertexEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        embed_chunked(texts, self.batch_size, |chunk| self.predict(chunk))
    }
}

impl std::fmt::Debug for VertexEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexEmbedder")
            .field("project", &self.project)
            .field("location", &self.location)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint() {
        let embedder = VertexEmbedder::new("acme", DEFAULT_LOCATION, "token");
        assert_eq!(
            embedder.endpoint(),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/acme/locations/us-central1/publishers/google/models/text-embedding-004:predict"
        );
    }

    #[test]
    fn test_custom_base_and_model() {
        let embedder = VertexEmbedder::new("acme", "europe-west4", "token")
            .with_base_url("http://localhost:8080/")
            .with_model("custom");
        assert_eq!(
            embedder.endpoint(),
            "http://localhost:8080/v1/projects/acme/locations/europe-west4/publishers/google/models/custom:predict"
        );
    }

    #[test]
    fn test_empty_batch_skips_request() {
        // Unroutable base: any request would fail.
        let embedder = VertexEmbedder::new("acme", "x", "t").with_base_url("http://127.0.0.1:1");
        assert!(embedder.embed_batch(&[]).expect("empty").is_empty());
    }

    #[test]
    fn test_response_shape() {
        let json = r#"{"predictions":[{"embeddings":{"values":[0.5,1.0]}}]}"#;
        let parsed: PredictResponse = serde_json::from_str(json).expect("response");
        assert_eq!(parsed.predictions[0].embeddings.values, vec![0.5, 1.0]);
        assert!(parsed.error.is_none());
    }

    #[test]
    fn test_debug_hides_token() {
        let embedder = VertexEmbedder::new("acme", DEFAULT_LOCATION, "secret-token");
        assert!(!format!("{:?}", embedder).contains("secret-token"));
    }
}
