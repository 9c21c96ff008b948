use crate::adapters::http::preview;
use crate::config::toml_config::ProbeConfig;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;

const PREVIEW_CHARS: usize = 200;

pub const SAMPLE_PROMPT: &str =
    "playing card illustration of a golden tree whose branches form an infinity symbol";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeAttempt {
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body_preview: String,
}

impl ProbeAttempt {
    pub fn is_success(&self) -> bool {
        self.status.is_some_and(|s| (200..300).contains(&s))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeReport {
    pub attempts: Vec<ProbeAttempt>,
    /// 第一個回應 2xx 的端點
    pub found: Option<String>,
    pub models: Vec<ProbeAttempt>,
}

/// Tries candidate endpoints for an image vendor until one answers 2xx.
pub struct EndpointProbe {
    client: Client,
    api_key: Option<String>,
}

impl EndpointProbe {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    pub async fn run(&self, config: &ProbeConfig, prompt: &str) -> ProbeReport {
        let mut report = ProbeReport::default();
        let body = json!({ "model": "midjourney", "prompt": prompt, "n": 1, "size": "1024x1024" });

        'bases: for base in &config.bases {
            for suffix in &config.suffixes {
                let url = format!("{}{}", base.trim_end_matches('/'), suffix);
                tracing::info!(%url, "🔍 Probing");

                let mut request = self.authorized(self.client.post(&url)).json(&body);
                if let Some(key) = &self.api_key {
                    request = request.header("x-api-key", key);
                }
                let attempt = self.attempt("POST", url, request).await;
                let success = attempt.is_success();
                report.attempts.push(attempt);

                if success {
                    report.found = report.attempts.last().map(|a| a.url.clone());
                    break 'bases;
                }
            }
        }

        // 只有全部失敗時才查 OpenAI 風格的 /v1/models
        let model_bases: &[String] = if report.found.is_none() {
            &config.model_bases
        } else {
            &[]
        };
        for base in model_bases {
            let url = format!("{}/v1/models", base.trim_end_matches('/'));
            let request = self.authorized(self.client.get(&url));
            report.models.push(self.attempt("GET", url, request).await);
        }

        match &report.found {
            Some(url) => tracing::info!(%url, "✅ Working endpoint found"),
            None => tracing::warn!(tried = report.attempts.len(), "No endpoint answered 2xx"),
        }
        report
    }

    async fn attempt(&self, method: &str, url: String, request: RequestBuilder) -> ProbeAttempt {
        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let text = response.text().await.unwrap_or_default();
                tracing::debug!(%url, status, "Probe response");
                ProbeAttempt {
                    method: method.to_string(),
                    url,
                    status: Some(status),
                    error: None,
                    body_preview: preview(&text, PREVIEW_CHARS),
                }
            }
            Err(e) => ProbeAttempt {
                method: method.to_string(),
                url,
                status: None,
                error: Some(e.to_string()),
                body_preview: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let server = MockServer::start_async().await;
        let missing = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/images/generations");
                then.status(404).body("not found");
            })
            .await;
        let found = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/generate")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(json!({ "task_info": { "id": "t1" } }));
            })
            .await;
        let never = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/midjourney/imagine");
                then.status(200);
            })
            .await;
        let models = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/models");
                then.status(200);
            })
            .await;

        let config = ProbeConfig {
            bases: vec![server.url("/v1")],
            suffixes: vec![
                "/images/generations".to_string(),
                "/generate".to_string(),
                "/midjourney/imagine".to_string(),
            ],
            model_bases: vec![server.base_url()],
        };

        let probe = EndpointProbe::new(Client::new(), Some("sk-test".to_string()));
        let report = probe.run(&config, SAMPLE_PROMPT).await;

        missing.assert_async().await;
        found.assert_async().await;
        never.assert_hits_async(0).await;
        models.assert_hits_async(0).await;

        assert_eq!(report.attempts.len(), 2);
        assert_eq!(report.attempts[0].status, Some(404));
        assert_eq!(report.found, Some(server.url("/v1/generate")));
        assert!(report.models.is_empty());
    }

    #[tokio::test]
    async fn test_lists_models_when_nothing_answers() {
        let server = MockServer::start_async().await;
        let generate = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/generate")
                    .header("x-api-key", "sk-test")
                    .json_body_partial(r#"{ "model": "midjourney", "n": 1, "size": "1024x1024" }"#);
                then.status(403).body("forbidden");
            })
            .await;
        let models = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/models")
                    .header("authorization", "Bearer sk-test");
                then.status(401).body("x".repeat(500));
            })
            .await;

        let config = ProbeConfig {
            bases: vec![server.url("/v1")],
            suffixes: vec!["/generate".to_string()],
            model_bases: vec![server.base_url()],
        };

        let report = EndpointProbe::new(Client::new(), Some("sk-test".to_string()))
            .run(&config, SAMPLE_PROMPT)
            .await;

        generate.assert_async().await;
        models.assert_async().await;
        assert!(report.found.is_none());
        assert_eq!(report.attempts[0].status, Some(403));
        assert_eq!(report.models[0].status, Some(401));
        assert_eq!(report.models[0].body_preview.chars().count(), PREVIEW_CHARS + 3);
    }

    #[tokio::test]
    async fn test_connection_errors_are_recorded() {
        let config = ProbeConfig {
            bases: vec!["http://127.0.0.1:9".to_string()],
            suffixes: vec!["/generate".to_string()],
            model_bases: vec![],
        };

        let report = EndpointProbe::new(Client::new(), None).run(&config, "p").await;

        assert_eq!(report.attempts.len(), 1);
        assert!(report.attempts[0].error.is_some());
        assert!(report.found.is_none());
    }
}
