use crate::adapters::http::fetch_image;
use crate::core::prompts::PromptBuilder;
use crate::core::{Card, ImageVendor, JobRecord, JobStatus, RunLog, Storage, TaskState};
use crate::utils::error::Result;
use reqwest::Client;
use std::time::Duration;

/// Timing knobs for one vendor run.
#[derive(Debug, Clone, PartialEq)]
pub struct Pacing {
    pub submit_delay: Duration,
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub download_retries: u32,
    pub retry_delay: Duration,
}

impl Pacing {
    /// No waiting anywhere; used by tests and mocks.
    pub fn immediate(max_polls: u32) -> Self {
        Self {
            submit_delay: Duration::ZERO,
            poll_interval: Duration::ZERO,
            max_polls,
            download_retries: 0,
            retry_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// 已有圖檔的卡片不再送出
    pub skip_existing: bool,
    pub dry_run: bool,
}

/// Submits card prompts, polls the vendor and downloads finished artwork.
pub struct JobRunner<S: Storage> {
    vendor: Box<dyn ImageVendor>,
    storage: S,
    client: Client,
    prompts: PromptBuilder,
    pacing: Pacing,
    options: RunOptions,
}

impl<S: Storage> JobRunner<S> {
    pub fn new(
        vendor: Box<dyn ImageVendor>,
        storage: S,
        client: Client,
        prompts: PromptBuilder,
        pacing: Pacing,
        options: RunOptions,
    ) -> Self {
        Self {
            vendor,
            storage,
            client,
            prompts,
            pacing,
            options,
        }
    }

    pub fn vendor(&self) -> &dyn ImageVendor {
        self.vendor.as_ref()
    }

    pub async fn run(&self, cards: &[Card]) -> Result<RunLog> {
        tracing::info!(
            vendor = self.vendor.name(),
            cards = cards.len(),
            dry_run = self.options.dry_run,
            "Starting artwork run"
        );

        let mut records = Vec::with_capacity(cards.len());
        let mut to_submit = Vec::new();

        for card in cards {
            if self.options.skip_existing && self.storage.exists(&card.artwork_file()).await {
                tracing::info!(card = %card.id, "⏭️  Artwork exists, skipping");
                let mut record = JobRecord::for_card(card, JobStatus::Skipped);
                record.path = Some(self.artwork_path(card));
                records.push(record);
            } else if self.options.dry_run {
                tracing::info!(card = %card.id, prompt = %self.prompts.full_prompt(card), "Dry run");
                records.push(JobRecord::for_card(card, JobStatus::DryRun));
            } else {
                to_submit.push(records.len());
                records.push(JobRecord::for_card(card, JobStatus::Submitted));
            }
        }

        let pending: Vec<&Card> = to_submit.iter().map(|&i| &cards[i]).collect();
        let submitted = self.submit_all(&pending).await;
        for (slot, record) in to_submit.into_iter().zip(submitted) {
            records[slot] = record;
        }

        self.poll_until_terminal(&mut records).await;

        let log = RunLog::new(self.vendor.name(), self.vendor.endpoint(), records);
        let summary = log.summary();
        tracing::info!(
            total = summary.total,
            downloaded = summary.downloaded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Artwork run finished"
        );
        Ok(log)
    }

    /// Submits one card at a time, waiting `submit_delay` between requests.
    pub async fn submit_all(&self, cards: &[&Card]) -> Vec<JobRecord> {
        let mut records = Vec::with_capacity(cards.len());

        for (i, card) in cards.iter().enumerate() {
            if i > 0 && !self.pacing.submit_delay.is_zero() {
                tokio::time::sleep(self.pacing.submit_delay).await;
            }

            let mut record = JobRecord::for_card(card, JobStatus::Submitted);
            match self.vendor.submit(&self.prompts.full_prompt(card)).await {
                Ok(handle) => {
                    tracing::info!(card = %card.id, task_id = %handle.task_id, "📤 Submitted");
                    tracing::debug!(card = %card.id, response = %handle.raw, "Submission response");
                    record.task_id = Some(handle.task_id);
                }
                Err(e) => {
                    tracing::error!(card = %card.id, error = %e, "❌ Submission failed");
                    record.fail(JobStatus::Error, e.to_string());
                }
            }
            records.push(record);
        }

        records
    }

    /// Polls every open job until all are terminal or `max_polls` rounds have run.
    /// Returns the number of rounds used.
    pub async fn poll_until_terminal(&self, records: &mut [JobRecord]) -> u32 {
        let mut rounds = 0;

        while rounds < self.pacing.max_polls && records.iter().any(JobRecord::is_open) {
            if rounds > 0 && !self.pacing.poll_interval.is_zero() {
                tokio::time::sleep(self.pacing.poll_interval).await;
            }
            rounds += 1;

            for record in records.iter_mut().filter(|r| r.is_open()) {
                self.check_and_download(record).await;
            }

            let open = records.iter().filter(|r| r.is_open()).count();
            tracing::info!(round = rounds, open, "⏳ Poll round complete");
        }

        for record in records.iter_mut().filter(|r| r.is_open()) {
            tracing::warn!(card = %record.id, "Gave up after {} polls", self.pacing.max_polls);
            let reason = format!("still {} after {} polls", record.status, self.pacing.max_polls);
            record.fail(JobStatus::TimedOut, reason);
        }

        rounds
    }

    /// Checks every unfinished entry of an earlier run once and downloads what is ready.
    pub async fn recheck(&self, log: RunLog) -> RunLog {
        let mut results = log.results;

        for record in results.iter_mut().filter(|r| needs_recheck(r)) {
            self.check_and_download(record).await;
        }

        RunLog::new(&log.vendor, &log.endpoint, results)
    }

    async fn check_and_download(&self, record: &mut JobRecord) {
        let Some(task_id) = record.task_id.clone() else {
            return;
        };

        let state = match self.vendor.check(&task_id).await {
            Ok(state) => state,
            Err(e) => {
                // 留在 pending，下一輪再查
                tracing::warn!(card = %record.id, %task_id, error = %e, "Status check failed");
                return;
            }
        };

        self.apply_state(record, state).await;
    }

    async fn apply_state(&self, record: &mut JobRecord, state: TaskState) {
        match state.status {
            JobStatus::Completed => match state.image_url {
                Some(url) => match self.download_image(&url, &format!("{}.png", record.id)).await {
                    Ok(path) => {
                        tracing::info!(card = %record.id, %path, "💾 Downloaded");
                        record.status = JobStatus::Downloaded;
                        record.path = Some(path);
                        record.error = None;
                    }
                    Err(e) => {
                        tracing::error!(card = %record.id, %url, error = %e, "Download failed");
                        record.fail(JobStatus::Error, e.to_string());
                    }
                },
                None => record.fail(JobStatus::Failed, "no image in response"),
            },
            JobStatus::Failed | JobStatus::Canceled => {
                let reason = state.error.unwrap_or_else(|| state.status.to_string());
                tracing::warn!(card = %record.id, %reason, "❌ Vendor reported {}", state.status);
                record.fail(state.status, reason);
            }
            other => {
                tracing::debug!(card = %record.id, status = %other, "Still running");
                record.status = other;
                record.error = None;
            }
        }
    }

    /// Fetches, verifies and stores one image, retrying transient failures.
    pub async fn download_image(&self, url: &str, file: &str) -> Result<String> {
        let mut attempt = 0;

        let bytes = loop {
            match fetch_image(&self.client, url).await {
                Ok(bytes) => break bytes,
                Err(e) if e.is_transient() && attempt < self.pacing.download_retries => {
                    attempt += 1;
                    tracing::warn!(%url, attempt, error = %e, "Retrying download");
                    tokio::time::sleep(self.pacing.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        };

        self.storage.write_file(file, &bytes).await?;
        Ok(self.storage.resolve(file).display().to_string())
    }

    fn artwork_path(&self, card: &Card) -> String {
        self.storage
            .resolve(&card.artwork_file())
            .display()
            .to_string()
    }
}

/// Entries worth asking the vendor about again.
pub fn needs_recheck(record: &JobRecord) -> bool {
    record.task_id.is_some()
        && matches!(
            record.status,
            JobStatus::Submitted
                | JobStatus::Pending
                | JobStatus::Processing
                | JobStatus::Completed
                | JobStatus::TimedOut
                | JobStatus::Error
        )
}

/// 從 RunLog 中找出仍未完成的項目
pub fn unfinished(log: &RunLog) -> Vec<&JobRecord> {
    log.results.iter().filter(|r| needs_recheck(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::TINY_PNG;
    use crate::utils::error::DeckError;
    use crate::adapters::LocalStorage;
    use crate::core::TaskHandle;
    use crate::domain::model::CardCatalog;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Scripted vendor: each task id walks through its list of states.
    struct ScriptedVendor {
        submits: AtomicU32,
        checks: AtomicU32,
        scripts: Mutex<HashMap<String, Vec<TaskState>>>,
        reject_prompt_containing: Option<&'static str>,
    }

    impl ScriptedVendor {
        fn new(scripts: Vec<(&str, Vec<TaskState>)>) -> Self {
            Self {
                submits: AtomicU32::new(0),
                checks: AtomicU32::new(0),
                scripts: Mutex::new(
                    scripts
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v))
                        .collect(),
                ),
                reject_prompt_containing: None,
            }
        }
    }

    #[async_trait]
    impl ImageVendor for std::sync::Arc<ScriptedVendor> {
        fn name(&self) -> &str {
            "scripted"
        }

        fn endpoint(&self) -> &str {
            "mock://scripted"
        }

        async fn submit(&self, prompt: &str) -> Result<TaskHandle> {
            let n = self.submits.fetch_add(1, Ordering::SeqCst);
            if let Some(needle) = self.reject_prompt_containing {
                if prompt.contains(needle) {
                    return Err(DeckError::VendorError {
                        vendor: "scripted".to_string(),
                        status: 422,
                        body: "rejected".to_string(),
                    });
                }
            }
            Ok(TaskHandle {
                task_id: format!("task-{}", n),
                raw: serde_json::Value::Null,
            })
        }

        async fn check(&self, task_id: &str) -> Result<TaskState> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts.get_mut(task_id).expect("unknown task");
            if script.len() > 1 {
                Ok(script.remove(0))
            } else {
                Ok(script[0].clone())
            }
        }
    }

    fn state(status: JobStatus, url: Option<&str>) -> TaskState {
        TaskState {
            status,
            image_url: url.map(str::to_string),
            error: None,
        }
    }

    fn cards() -> Vec<Card> {
        CardCatalog::from_json_str(
            r#"{ "cards": [
                { "id": "a", "name": "Alpha", "category": "Arc", "prompt": "alpha prompt" },
                { "id": "b", "name": "Beta", "category": "Arc", "prompt": "beta prompt" }
            ] }"#,
        )
        .unwrap()
        .cards
    }

    fn runner(
        vendor: std::sync::Arc<ScriptedVendor>,
        dir: &TempDir,
        max_polls: u32,
        options: RunOptions,
    ) -> JobRunner<LocalStorage> {
        paced_runner(vendor, dir, Pacing::immediate(max_polls), options)
    }

    fn paced_runner(
        vendor: std::sync::Arc<ScriptedVendor>,
        dir: &TempDir,
        pacing: Pacing,
        options: RunOptions,
    ) -> JobRunner<LocalStorage> {
        let catalog = CardCatalog::from_json_str(r#"{ "cards": [ { "id": "x", "name": "X", "category": "Arc" } ] }"#).unwrap();
        JobRunner::new(
            Box::new(vendor),
            LocalStorage::new(dir.path()),
            Client::new(),
            PromptBuilder::new(&catalog, None),
            pacing,
            options,
        )
    }

    #[tokio::test]
    async fn test_polling_stops_at_bound() {
        let vendor = std::sync::Arc::new(ScriptedVendor::new(vec![
            ("task-0", vec![state(JobStatus::Processing, None)]),
            ("task-1", vec![state(JobStatus::Processing, None)]),
        ]));
        let dir = TempDir::new().unwrap();
        let runner = runner(vendor.clone(), &dir, 3, RunOptions::default());

        let log = runner.run(&cards()).await.unwrap();

        assert_eq!(vendor.checks.load(Ordering::SeqCst), 6);
        assert!(log.results.iter().all(|r| r.status == JobStatus::TimedOut));
        assert!(log.results.iter().all(|r| r.status.is_terminal()));
    }

    #[tokio::test]
    async fn test_polling_stops_when_all_terminal() {
        let vendor = std::sync::Arc::new(ScriptedVendor::new(vec![
            (
                "task-0",
                vec![
                    state(JobStatus::Pending, None),
                    state(JobStatus::Failed, None),
                ],
            ),
            ("task-1", vec![state(JobStatus::Completed, None)]),
        ]));
        let dir = TempDir::new().unwrap();
        let runner = runner(vendor.clone(), &dir, 60, RunOptions::default());

        let log = runner.run(&cards()).await.unwrap();

        // round 1: both checked, round 2: only task-0 still open
        assert_eq!(vendor.checks.load(Ordering::SeqCst), 3);
        assert_eq!(log.results[0].status, JobStatus::Failed);
        assert_eq!(log.results[1].status, JobStatus::Failed);
        assert_eq!(log.results[1].error.as_deref(), Some("no image in response"));
    }

    #[tokio::test]
    async fn test_dry_run_sends_nothing() {
        let vendor = std::sync::Arc::new(ScriptedVendor::new(vec![]));
        let dir = TempDir::new().unwrap();
        let runner = runner(
            vendor.clone(),
            &dir,
            5,
            RunOptions {
                skip_existing: false,
                dry_run: true,
            },
        );

        let log = runner.run(&cards()).await.unwrap();

        assert_eq!(vendor.submits.load(Ordering::SeqCst), 0);
        assert_eq!(log.summary().dry_run, 2);
    }

    #[tokio::test]
    async fn test_skip_existing_artwork() {
        let vendor = std::sync::Arc::new(ScriptedVendor::new(vec![(
            "task-0",
            vec![state(JobStatus::Failed, None)],
        )]));
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.png"), TINY_PNG).unwrap();
        let runner = runner(
            vendor.clone(),
            &dir,
            5,
            RunOptions {
                skip_existing: true,
                dry_run: false,
            },
        );

        let log = runner.run(&cards()).await.unwrap();

        assert_eq!(vendor.submits.load(Ordering::SeqCst), 1);
        assert_eq!(log.results[0].status, JobStatus::Skipped);
        assert_eq!(log.results[1].task_id.as_deref(), Some("task-0"));
    }

    #[tokio::test]
    async fn test_submission_error_marks_card_and_continues() {
        let mut vendor = ScriptedVendor::new(vec![("task-1", vec![state(JobStatus::Canceled, None)])]);
        vendor.reject_prompt_containing = Some("alpha");
        let vendor = std::sync::Arc::new(vendor);
        let dir = TempDir::new().unwrap();
        let runner = runner(vendor.clone(), &dir, 5, RunOptions::default());

        let log = runner.run(&cards()).await.unwrap();

        assert_eq!(log.results[0].status, JobStatus::Error);
        assert!(log.results[0].task_id.is_none());
        assert_eq!(log.results[1].status, JobStatus::Canceled);
    }

    #[tokio::test]
    async fn test_recheck_downloads_finished_images() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET).path("/a.png");
                then.status(200).body(TINY_PNG);
            })
            .await;
        let image_url = server.url("/a.png");

        let vendor = std::sync::Arc::new(ScriptedVendor::new(vec![(
            "old-task",
            vec![state(JobStatus::Completed, Some(&image_url))],
        )]));
        let dir = TempDir::new().unwrap();
        let runner = runner(vendor.clone(), &dir, 5, RunOptions::default());

        let mut timed_out = JobRecord::for_card(&cards()[0], JobStatus::TimedOut);
        timed_out.task_id = Some("old-task".to_string());
        let done = JobRecord::for_card(&cards()[1], JobStatus::Downloaded);
        let log = RunLog::new("scripted", "mock://scripted", vec![timed_out, done]);

        assert_eq!(unfinished(&log).len(), 1);
        let updated = runner.recheck(log).await;

        assert_eq!(vendor.checks.load(Ordering::SeqCst), 1);
        assert_eq!(updated.results[0].status, JobStatus::Downloaded);
        assert!(updated.results[0].error.is_none());
        assert!(dir.path().join("a.png").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submissions_are_spaced_by_submit_delay() {
        let vendor = std::sync::Arc::new(ScriptedVendor::new(vec![
            ("task-0", vec![state(JobStatus::Failed, None)]),
            ("task-1", vec![state(JobStatus::Failed, None)]),
            ("task-2", vec![state(JobStatus::Failed, None)]),
        ]));
        let dir = TempDir::new().unwrap();
        let pacing = Pacing {
            submit_delay: Duration::from_secs(5),
            ..Pacing::immediate(5)
        };
        let runner = paced_runner(vendor.clone(), &dir, pacing, RunOptions::default());
        let mut three = cards();
        let third = Card {
            id: "c".to_string(),
            ..three[0].clone()
        };
        three.push(third);

        let start = tokio::time::Instant::now();
        let log = runner.run(&three).await.unwrap();

        // no wait before the first submission
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(vendor.submits.load(Ordering::SeqCst), 3);
        assert_eq!(log.summary().failed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_rounds_are_spaced_by_poll_interval() {
        let vendor = std::sync::Arc::new(ScriptedVendor::new(vec![(
            "task-0",
            vec![
                state(JobStatus::Processing, None),
                state(JobStatus::Processing, None),
                state(JobStatus::Failed, None),
            ],
        )]));
        let dir = TempDir::new().unwrap();
        let pacing = Pacing {
            poll_interval: Duration::from_secs(7),
            ..Pacing::immediate(10)
        };
        let runner = paced_runner(vendor.clone(), &dir, pacing, RunOptions::default());
        let mut record = JobRecord::for_card(&cards()[0], JobStatus::Submitted);
        record.task_id = Some("task-0".to_string());

        let start = tokio::time::Instant::now();
        let rounds = runner
            .poll_until_terminal(std::slice::from_mut(&mut record))
            .await;

        assert_eq!(rounds, 3);
        assert_eq!(start.elapsed(), Duration::from_secs(14));
        assert_eq!(record.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_recheck_still_running_clears_timeout_reason() {
        let vendor = std::sync::Arc::new(ScriptedVendor::new(vec![(
            "slow-task",
            vec![state(JobStatus::Processing, None)],
        )]));
        let dir = TempDir::new().unwrap();
        let runner = runner(vendor.clone(), &dir, 5, RunOptions::default());

        let mut timed_out = JobRecord::for_card(&cards()[0], JobStatus::Submitted);
        timed_out.task_id = Some("slow-task".to_string());
        timed_out.fail(JobStatus::TimedOut, "still processing after 60 polls");
        let log = RunLog::new("scripted", "mock://scripted", vec![timed_out]);

        let updated = runner.recheck(log).await;

        assert_eq!(updated.results[0].status, JobStatus::Processing);
        assert!(updated.results[0].error.is_none());
    }

    #[tokio::test]
    async fn test_recheck_retries_errored_tasks_with_an_id() {
        let vendor = std::sync::Arc::new(ScriptedVendor::new(vec![(
            "flaky-task",
            vec![state(JobStatus::Failed, None)],
        )]));
        let dir = TempDir::new().unwrap();
        let runner = runner(vendor.clone(), &dir, 5, RunOptions::default());

        let mut download_error = JobRecord::for_card(&cards()[0], JobStatus::Submitted);
        download_error.task_id = Some("flaky-task".to_string());
        download_error.fail(JobStatus::Error, "connection reset");
        let mut never_submitted = JobRecord::for_card(&cards()[1], JobStatus::Submitted);
        never_submitted.fail(JobStatus::Error, "422 rejected");
        let log = RunLog::new("scripted", "mock://scripted", vec![download_error, never_submitted]);

        assert_eq!(unfinished(&log).len(), 1);
        let updated = runner.recheck(log).await;

        assert_eq!(vendor.checks.load(Ordering::SeqCst), 1);
        assert_eq!(updated.results[0].status, JobStatus::Failed);
        assert_eq!(updated.results[1].status, JobStatus::Error);
    }
}
