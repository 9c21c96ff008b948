use crate::utils::error::{DeckError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_unique_ids, Validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 各類別的預設顏色
pub fn category_color(category: &str) -> &'static str {
    match category.to_ascii_lowercase().as_str() {
        "wellbeing" => "#FFD93D",
        "arc" => "#a855f7",
        "terrain" => "#4ECDC4",
        "object" => "#FF8C42",
        "timeframe" => "#60a5fa",
        "modifier" => "#f87171",
        _ => "#c9a227",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl Card {
    pub fn color(&self) -> &str {
        self.color
            .as_deref()
            .unwrap_or_else(|| category_color(&self.category))
    }

    /// Artwork file name inside the artwork directory.
    pub fn artwork_file(&self) -> String {
        format!("{}.png", self.id)
    }

    pub fn front_file(&self) -> String {
        format!("{}-front.png", self.id)
    }
}

/// Text-only instruction card printed next to the vision cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptCard {
    pub id: String,
    pub title: String,
    pub text: String,
}

impl PromptCard {
    pub fn front_file(&self) -> String {
        format!("{}-front.png", self.id)
    }
}

fn default_title() -> String {
    "Futures Deck".to_string()
}

fn default_subtitle() -> String {
    "Speculative Oracle".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardCatalog {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_subtitle")]
    pub subtitle: String,
    /// 共用風格前綴，會接在每張卡的 prompt 前面
    #[serde(default)]
    pub style: String,
    pub cards: Vec<Card>,
    #[serde(default)]
    pub prompt_cards: Vec<PromptCard>,
}

impl CardCatalog {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DeckError::catalog(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let catalog: CardCatalog = serde_json::from_str(content)
            .map_err(|e| DeckError::catalog(format!("invalid catalog JSON: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn find(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    /// 只保留指定 id 的卡片；空清單代表全部
    pub fn select(&self, ids: &[String]) -> Result<Vec<Card>> {
        if ids.is_empty() {
            return Ok(self.cards.clone());
        }

        ids.iter()
            .map(|id| {
                self.find(id)
                    .cloned()
                    .ok_or_else(|| DeckError::catalog(format!("unknown card id '{}'", id)))
            })
            .collect()
    }

    /// Vision cards followed by prompt cards, in catalog order.
    pub fn sheet_items(&self) -> Vec<SheetItem> {
        self.cards
            .iter()
            .cloned()
            .map(SheetItem::Vision)
            .chain(self.prompt_cards.iter().cloned().map(SheetItem::Prompt))
            .collect()
    }

    /// 最後一頁不足時用來補位的卡片
    pub fn filler(&self) -> Option<SheetItem> {
        self.prompt_cards
            .first()
            .cloned()
            .map(SheetItem::Prompt)
            .or_else(|| self.cards.first().cloned().map(SheetItem::Vision))
    }
}

impl Validate for CardCatalog {
    fn validate(&self) -> Result<()> {
        if self.cards.is_empty() {
            return Err(DeckError::catalog("catalog contains no cards"));
        }

        for card in &self.cards {
            validate_non_empty_string("cards.id", &card.id)?;
            validate_non_empty_string("cards.name", &card.name)?;
            validate_non_empty_string("cards.category", &card.category)?;
        }
        for card in &self.prompt_cards {
            validate_non_empty_string("prompt_cards.id", &card.id)?;
        }

        let ids = self
            .cards
            .iter()
            .map(|c| c.id.as_str())
            .chain(self.prompt_cards.iter().map(|p| p.id.as_str()));
        validate_unique_ids("cards.id", ids)
            .map_err(|e| DeckError::catalog(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SheetItem {
    Vision(Card),
    Prompt(PromptCard),
}

impl SheetItem {
    pub fn id(&self) -> &str {
        match self {
            SheetItem::Vision(card) => &card.id,
            SheetItem::Prompt(card) => &card.id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Pending,
    Processing,
    Completed,
    Downloaded,
    Failed,
    Canceled,
    TimedOut,
    Error,
    DryRun,
    Skipped,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            JobStatus::Submitted | JobStatus::Pending | JobStatus::Processing
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Downloaded => "downloaded",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
            JobStatus::TimedOut => "timed_out",
            JobStatus::Error => "error",
            JobStatus::DryRun => "dry_run",
            JobStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vendor acknowledgement of a submitted prompt.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    pub task_id: String,
    pub raw: serde_json::Value,
}

/// Vendor status mapped into a common shape.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskState {
    pub status: JobStatus,
    pub image_url: Option<String>,
    pub error: Option<String>,
}

impl TaskState {
    pub fn processing() -> Self {
        Self {
            status: JobStatus::Processing,
            image_url: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub name: String,
    pub category: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRecord {
    pub fn for_card(card: &Card, status: JobStatus) -> Self {
        Self {
            id: card.id.clone(),
            name: card.name.clone(),
            category: card.category.clone(),
            status,
            task_id: None,
            path: None,
            error: None,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_terminal() && self.task_id.is_some()
    }

    pub fn fail(&mut self, status: JobStatus, reason: impl Into<String>) {
        self.status = status;
        self.error = Some(reason.into());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLog {
    pub generated_at: DateTime<Utc>,
    pub vendor: String,
    pub endpoint: String,
    pub results: Vec<JobRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub pending: usize,
    pub skipped: usize,
    pub dry_run: usize,
}

impl RunLog {
    pub fn new(vendor: &str, endpoint: &str, results: Vec<JobRecord>) -> Self {
        Self {
            generated_at: Utc::now(),
            vendor: vendor.to_string(),
            endpoint: endpoint.to_string(),
            results,
        }
    }

    pub fn from_json_slice(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn to_json_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.results.len(),
            ..RunSummary::default()
        };

        for record in &self.results {
            match record.status {
                JobStatus::Downloaded | JobStatus::Completed => summary.downloaded += 1,
                JobStatus::Failed | JobStatus::Canceled | JobStatus::TimedOut | JobStatus::Error => {
                    summary.failed += 1
                }
                JobStatus::Submitted | JobStatus::Pending | JobStatus::Processing => {
                    summary.pending += 1
                }
                JobStatus::Skipped => summary.skipped += 1,
                JobStatus::DryRun => summary.dry_run += 1,
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r##"{
        "title": "Futures Deck",
        "style": "engraving",
        "cards": [
            { "id": "well-01", "name": "Autonomy", "category": "Wellbeing", "prompt": "figure breaking chains" },
            { "id": "arc-01", "name": "Growth", "category": "Arc", "color": "#00ff00" }
        ],
        "prompt_cards": [
            { "id": "prompt-01", "title": "Describe This Future", "text": "Weave the cards together." }
        ]
    }"##;

    #[test]
    fn test_parse_catalog_with_defaults() {
        let catalog = CardCatalog::from_json_str(CATALOG).unwrap();

        assert_eq!(catalog.cards.len(), 2);
        assert_eq!(catalog.subtitle, "Speculative Oracle");
        assert_eq!(catalog.cards[0].color(), "#FFD93D");
        assert_eq!(catalog.cards[1].color(), "#00ff00");
        assert_eq!(catalog.cards[0].artwork_file(), "well-01.png");
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let json = r#"{
            "cards": [
                { "id": "well-01", "name": "Autonomy", "category": "Wellbeing" },
                { "id": "well-01", "name": "Impact", "category": "Wellbeing" }
            ]
        }"#;

        let err = CardCatalog::from_json_str(json).unwrap_err();
        assert!(matches!(err, DeckError::CatalogError { .. }));
        assert!(err.to_string().contains("well-01"));
    }

    #[test]
    fn test_prompt_card_id_collision_is_rejected() {
        let json = r#"{
            "cards": [ { "id": "x", "name": "X", "category": "Arc" } ],
            "prompt_cards": [ { "id": "x", "title": "T", "text": "..." } ]
        }"#;
        assert!(CardCatalog::from_json_str(json).is_err());
    }

    #[test]
    fn test_select_unknown_id() {
        let catalog = CardCatalog::from_json_str(CATALOG).unwrap();

        assert_eq!(catalog.select(&[]).unwrap().len(), 2);
        assert_eq!(catalog.select(&["arc-01".to_string()]).unwrap()[0].name, "Growth");
        assert!(catalog.select(&["nope".to_string()]).is_err());
    }

    #[test]
    fn test_filler_prefers_prompt_card() {
        let catalog = CardCatalog::from_json_str(CATALOG).unwrap();
        assert_eq!(catalog.filler().unwrap().id(), "prompt-01");
        assert_eq!(catalog.sheet_items().len(), 3);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Submitted.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Downloaded.is_terminal());
        assert!(JobStatus::TimedOut.is_terminal());
    }

    #[test]
    fn test_run_log_roundtrip_and_summary() {
        let catalog = CardCatalog::from_json_str(CATALOG).unwrap();
        let mut done = JobRecord::for_card(&catalog.cards[0], JobStatus::Downloaded);
        done.path = Some("assets/deck-artwork/well-01.png".to_string());
        let mut failed = JobRecord::for_card(&catalog.cards[1], JobStatus::Submitted);
        failed.fail(JobStatus::Failed, "nsfw filter");

        let log = RunLog::new("replicate", "https://api.replicate.com/v1/predictions", vec![done, failed]);
        let json = log.to_json_vec().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();

        assert_eq!(value["results"][0]["status"], "downloaded");
        assert!(value["results"][0].get("error").is_none());
        assert_eq!(value["results"][1]["error"], "nsfw filter");

        let parsed = RunLog::from_json_slice(&json).unwrap();
        let summary = parsed.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.failed, 1);
    }
}
