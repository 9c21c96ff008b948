use crate::core::runner::JobRunner;
use crate::core::{Card, JobStatus, Storage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const RESULTS_FILE: &str = "results.json";

/// One model's answer to the shared prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOutcome {
    pub model: String,
    pub endpoint: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    pub generated_at: DateTime<Utc>,
    pub vendor: String,
    pub prompt: String,
    pub results: Vec<ModelOutcome>,
}

impl ModelComparison {
    pub fn downloaded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == JobStatus::Downloaded)
            .count()
    }
}

/// Card whose id is the model name, so the image lands at `<model>.png`.
fn comparison_card(model: &str, prompt: &str) -> Card {
    Card {
        id: model.to_string(),
        name: model.to_string(),
        category: "Comparison".to_string(),
        color: None,
        prompt: Some(prompt.to_string()),
    }
}

/// Sends `prompt` to every model, then polls each job until it settles.
/// All jobs are submitted before any polling starts.
pub async fn compare_models<S: Storage>(
    vendor: &str,
    runs: &[(String, JobRunner<S>)],
    prompt: &str,
) -> ModelComparison {
    let mut records = Vec::with_capacity(runs.len());
    for (model, runner) in runs {
        let card = comparison_card(model, prompt);
        let mut submitted = runner.submit_all(&[&card]).await;
        records.extend(submitted.pop());
    }

    for ((model, runner), record) in runs.iter().zip(records.iter_mut()) {
        let rounds = runner
            .poll_until_terminal(std::slice::from_mut(record))
            .await;
        tracing::info!(%model, status = %record.status, rounds, "Model settled");
    }

    let results = runs
        .iter()
        .zip(records)
        .map(|((model, runner), record)| ModelOutcome {
            model: model.clone(),
            endpoint: runner.vendor().endpoint().to_string(),
            status: record.status,
            task_id: record.task_id,
            path: record.path,
            error: record.error,
        })
        .collect();

    ModelComparison {
        generated_at: Utc::now(),
        vendor: vendor.to_string(),
        prompt: prompt.to_string(),
        results,
    }
}
