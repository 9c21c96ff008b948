use crate::adapters::http::json_or_vendor_error;
use crate::core::{ImageVendor, JobStatus, TaskHandle, TaskState};
use crate::utils::error::{DeckError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

pub const VENDOR_NAME: &str = "mulerouter";

/// 各模型的提交路徑
fn route(model: &str) -> Option<&'static str> {
    match model {
        "midjourney" => Some("/vendors/midjourney/v1/tob/diffusion"),
        "nano-banana" => Some("/vendors/google/v1/nano-banana-pro/generation"),
        "wan" => Some("/vendors/alibaba/v1/wan2/image/generation"),
        _ => None,
    }
}

/// MuleRouter model router (Midjourney, Nano Banana Pro, Wan 2.5).
#[derive(Debug, Clone)]
pub struct MuleRouter {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl MuleRouter {
    pub fn new(client: Client, base_url: &str, model: &str, api_key: String) -> Result<Self> {
        let path = route(model).ok_or_else(|| DeckError::InvalidConfigValueError {
            field: "vendor.model".to_string(),
            value: model.to_string(),
            reason: "MuleRouter supports midjourney, nano-banana and wan".to_string(),
        })?;

        Ok(Self {
            client,
            api_key,
            model: model.to_string(),
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), path),
        })
    }

    fn request_body(&self, prompt: &str) -> Value {
        match self.model.as_str() {
            "nano-banana" => json!({ "prompt": prompt, "aspect_ratio": "2:3" }),
            "wan" => json!({ "prompt": prompt, "model": "wan2.5-t2i-preview" }),
            _ => json!({ "prompt": prompt }),
        }
    }
}

pub fn parse_task_id(body: &Value) -> Result<String> {
    body.pointer("/task_info/id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DeckError::VendorResponseError {
            vendor: VENDOR_NAME.to_string(),
            field: "task_info.id".to_string(),
        })
}

pub fn parse_state(body: &Value) -> TaskState {
    let status = body
        .pointer("/task_info/status")
        .or_else(|| body.get("status"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    match status {
        "completed" => TaskState {
            status: JobStatus::Completed,
            image_url: image_url(body),
            error: None,
        },
        "failed" => TaskState {
            status: JobStatus::Failed,
            image_url: None,
            error: Some(
                body.pointer("/task_info/error")
                    .or_else(|| body.get("error"))
                    .and_then(Value::as_str)
                    .unwrap_or("task failed")
                    .to_string(),
            ),
        },
        _ => TaskState::processing(),
    }
}

fn image_url(body: &Value) -> Option<String> {
    ["/images/0", "/result/image_url", "/output/image_url", "/image_url"]
        .iter()
        .find_map(|pointer| body.pointer(pointer).and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait]
impl ImageVendor for MuleRouter {
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
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let body = json_or_vendor_error(VENDOR_NAME, response).await?;
        let task_id = parse_task_id(&body)?;
        tracing::debug!(model = %self.model, %task_id, "MuleRouter accepted task");

        Ok(TaskHandle { task_id, raw: body })
    }

    async fn check(&self, task_id: &str) -> Result<TaskState> {
        let response = self
            .client
            .get(format!("{}/{}", self.endpoint, task_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let body = json_or_vendor_error(VENDOR_NAME, response).await?;
        Ok(parse_state(&body))
    }
}
