use crate::adapters::http::json_or_vendor_error;
use crate::core::{ImageVendor, JobStatus, TaskHandle, TaskState};
use crate::utils::error::{DeckError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

pub const VENDOR_NAME: &str = "replicate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplicateModel {
    Flux,
    NanoBanana,
}

impl ReplicateModel {
    fn parse(model: &str) -> Option<Self> {
        match model {
            "flux" => Some(ReplicateModel::Flux),
            "nano-banana" => Some(ReplicateModel::NanoBanana),
            _ => None,
        }
    }

    fn version(self) -> &'static str {
        match self {
            ReplicateModel::Flux => "black-forest-labs/flux-1.1-pro",
            ReplicateModel::NanoBanana => "google/nano-banana-pro",
        }
    }

    fn input(self, prompt: &str) -> Value {
        match self {
            ReplicateModel::Flux => json!({
                "prompt": prompt,
                "aspect_ratio": "2:3",
                "output_format": "png",
                "output_quality": 90,
                "safety_tolerance": 2,
                "prompt_upsampling": true
            }),
            ReplicateModel::NanoBanana => json!({
                "prompt": prompt,
                "resolution": "2K",
                "aspect_ratio": "2:3",
                "output_format": "png",
                "safety_filter_level": "block_only_high"
            }),
        }
    }
}

/// Replicate predictions API.
#[derive(Debug, Clone)]
pub struct Replicate {
    client: Client,
    token: String,
    model: ReplicateModel,
    endpoint: String,
}

impl Replicate {
    pub fn new(client: Client, base_url: &str, model: &str, token: String) -> Result<Self> {
        let model = ReplicateModel::parse(model).ok_or_else(|| DeckError::InvalidConfigValueError {
            field: "vendor.model".to_string(),
            value: model.to_string(),
            reason: "Replicate supports flux and nano-banana".to_string(),
        })?;

        Ok(Self {
            client,
            token,
            model,
            endpoint: format!("{}/v1/predictions", base_url.trim_end_matches('/')),
        })
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "version": self.model.version(),
            "input": self.model.input(prompt)
        })
    }
}

pub fn parse_task_id(body: &Value) -> Result<String> {
    body.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DeckError::VendorResponseError {
            vendor: VENDOR_NAME.to_string(),
            field: "id".to_string(),
        })
}

pub fn parse_state(body: &Value) -> TaskState {
    let error = || {
        body.get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    match body.get("status").and_then(Value::as_str).unwrap_or("unknown") {
        "succeeded" => TaskState {
            status: JobStatus::Completed,
            image_url: output_url(body),
            error: None,
        },
        "failed" => TaskState {
            status: JobStatus::Failed,
            image_url: None,
            error: error().or_else(|| Some("prediction failed".to_string())),
        },
        "canceled" => TaskState {
            status: JobStatus::Canceled,
            image_url: None,
            error: error().or_else(|| Some("prediction canceled".to_string())),
        },
        "starting" => TaskState {
            status: JobStatus::Pending,
            image_url: None,
            error: None,
        },
        _ => TaskState::processing(),
    }
}

/// `output` is a URL for some models and a list of URLs for others.
fn output_url(body: &Value) -> Option<String> {
    match body.get("output")? {
        Value::String(url) => Some(url.clone()),
        Value::Array(urls) => urls.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[async_trait]
impl ImageVendor for Replicate {
    fn name(&self) -> &str {
        VENDOR_NAME
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn submit(&self, prompt: &str) -> Result<TaskHandle> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let body = json_or_vendor_error(VENDOR_NAME, response).await?;
        let task_id = parse_task_id(&body)?;
        tracing::debug!(model = self.model.version(), %task_id, "Replicate prediction created");

        Ok(TaskHandle { task_id, raw: body })
    }

    async fn check(&self, task_id: &str) -> Result<TaskState> {
        let response = self
            .client
            .get(format!("{}/{}", self.endpoint, task_id))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let body = json_or_vendor_error(VENDOR_NAME, response).await?;
        Ok(parse_state(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flux_request_body() {
        let flux = Replicate::new(Client::new(), "https://api.replicate.com", "flux", "t".into()).unwrap();
        let body = flux.request_body("a tower");

        assert_eq!(flux.endpoint(), "https://api.replicate.com/v1/predictions");
        assert_eq!(body["version"], "black-forest-labs/flux-1.1-pro");
        assert_eq!(body["input"]["prompt"], "a tower");
        assert_eq!(body["input"]["safety_tolerance"], 2);
        assert_eq!(body["input"]["prompt_upsampling"], true);
    }

    #[test]
    fn test_nano_banana_request_body() {
        let banana =
            Replicate::new(Client::new(), "https://api.replicate.com", "nano-banana", "t".into()).unwrap();
        let body = banana.request_body("a tower");
        assert_eq!(body["version"], "google/nano-banana-pro");
        assert_eq!(body["input"]["resolution"], "2K");
        assert_eq!(body["input"]["safety_filter_level"], "block_only_high");
    }

    #[test]
    fn test_output_string_or_array() {
        let single = parse_state(&json!({ "status": "succeeded", "output": "https://r/a.png" }));
        assert_eq!(single.image_url.as_deref(), Some("https://r/a.png"));

        let many = parse_state(&json!({ "status": "succeeded", "output": ["https://r/b.png", "https://r/c.png"] }));
        assert_eq!(many.image_url.as_deref(), Some("https://r/b.png"));
    }

    #[test]
    fn test_terminal_states() {
        let failed = parse_state(&json!({ "status": "failed", "error": "NSFW content detected" }));
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("NSFW content detected"));

        let canceled = parse_state(&json!({ "status": "canceled" }));
        assert_eq!(canceled.status, JobStatus::Canceled);

        assert_eq!(parse_state(&json!({ "status": "starting" })).status, JobStatus::Pending);
        assert_eq!(parse_state(&json!({ "status": "processing" })).status, JobStatus::Processing);
    }

    #[test]
    fn test_missing_id_is_an_error() {
        let err = parse_task_id(&json!({ "detail": "Invalid version" })).unwrap_err();
        assert!(matches!(err, DeckError::VendorResponseError { .. }));
    }
}
