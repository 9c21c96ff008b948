use crate::domain::model::{Card, CardCatalog};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const HARING_STYLE: &str = "Keith Haring style illustration, bold black outlines, flat bright colors, \
simple iconic figures, radiant energy lines, figures in dynamic poses, pop art aesthetic, solid color fills, \
playful and energetic, multiple figures interacting, thick black stroke weight, 1980s street art style";

const TAROT_STYLE: &str = "intricate tarot card illustration, ornate decorative border, rich layered composition, \
sacred geometry patterns, celestial elements, gold leaf accents, deep jewel tones, art nouveau style, \
detailed linework, high detail, symmetrical composition";

const ENGRAVING_STYLE: &str = "Detailed engraving illustration with hand-tinted color, art deco geometric border frame \
containing small symbolic vignettes in corners and sides, central main image, fine crosshatching technique, \
modern subjects rendered in classical engraving style. COMPOSITION: Center the main subject with generous margins \
on all sides, extend decorative border pattern to fill entire frame edge-to-edge for print bleed, keep all important \
details away from edges. No text no letters no words.";

const DUTCH_STYLE: &str = "Dutch design aesthetic, De Stijl influence, Piet Mondrian style geometric blocks, \
bold primary colors (red #D32F2F, blue #1565C0, yellow #FFC107), clean grid-based composition, \
grotesque sans-serif typography, asymmetric balance, functional minimalism, strong black borders, high contrast, \
print-ready card design, no gradients except geometric fills, sharp edges and corners";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum StylePreset {
    Haring,
    Tarot,
    Engraving,
    Dutch,
}

impl StylePreset {
    pub fn style(self) -> &'static str {
        match self {
            StylePreset::Haring => HARING_STYLE,
            StylePreset::Tarot => TAROT_STYLE,
            StylePreset::Engraving => ENGRAVING_STYLE,
            StylePreset::Dutch => DUTCH_STYLE,
        }
    }

    pub fn negative_prompt(self) -> &'static str {
        match self {
            StylePreset::Dutch => {
                "photorealistic, 3D render, gradient backgrounds, rounded organic shapes, photography, realistic textures"
            }
            StylePreset::Haring => "photorealistic, shading, gradients, muted colors",
            StylePreset::Tarot | StylePreset::Engraving => {
                "photorealistic, blurry, low detail, watermark, text artifacts"
            }
        }
    }

    pub fn aspect_ratio(self) -> &'static str {
        match self {
            StylePreset::Haring | StylePreset::Dutch => "5:7",
            StylePreset::Tarot => "2:3",
            StylePreset::Engraving => "4:5",
        }
    }
}

/// Builds the full vendor prompt for each card from the shared style.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    style: String,
    negative_prompt: String,
    aspect_ratio: String,
}

impl PromptBuilder {
    /// 目錄裡的 style 優先，其次是指定的預設風格
    pub fn new(catalog: &CardCatalog, preset: Option<StylePreset>) -> Self {
        let style = if !catalog.style.trim().is_empty() {
            catalog.style.trim().to_string()
        } else {
            preset.map(|p| p.style().to_string()).unwrap_or_default()
        };

        Self {
            style,
            negative_prompt: preset.map(|p| p.negative_prompt()).unwrap_or("").to_string(),
            aspect_ratio: preset.map(|p| p.aspect_ratio()).unwrap_or("2:3").to_string(),
        }
    }

    /// Sends card prompts as they are.
    pub fn unstyled() -> Self {
        Self {
            style: String::new(),
            negative_prompt: String::new(),
            aspect_ratio: "2:3".to_string(),
        }
    }

    pub fn aspect_ratio(&self) -> &str {
        &self.aspect_ratio
    }

    /// Cards without a prompt fall back to their name and category.
    pub fn full_prompt(&self, card: &Card) -> String {
        let subject = card
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} ({} card)", card.name, card.category.to_lowercase()));

        if self.style.is_empty() {
            subject
        } else {
            format!("{}, {}", self.style, subject)
        }
    }

    pub fn export(&self, cards: &[Card]) -> PromptExport {
        PromptExport {
            meta: PromptMeta {
                style: self.style.clone(),
                aspect_ratio: self.aspect_ratio.clone(),
                generated_at: Utc::now(),
            },
            cards: cards
                .iter()
                .map(|card| PromptEntry {
                    id: card.id.clone(),
                    name: card.name.clone(),
                    category: card.category.clone(),
                    prompt: self.full_prompt(card),
                    negative_prompt: self.negative_prompt.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMeta {
    pub style: String,
    pub aspect_ratio: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptEntry {
    pub id: String,
    pub name: String,
    pub category: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub negative_prompt: String,
}

/// Prompts written out for manual use (e.g. pasting into Discord `/imagine`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptExport {
    pub meta: PromptMeta,
    pub cards: Vec<PromptEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(style: &str) -> CardCatalog {
        CardCatalog::from_json_str(&format!(
            r#"{{
                "style": "{}",
                "cards": [
                    {{ "id": "arc-01", "name": "Growth", "category": "Arc", "prompt": "golden tree with infinite branches" }},
                    {{ "id": "mod-01", "name": "Breakthrough", "category": "Modifier" }}
                ]
            }}"#,
            style
        ))
        .unwrap()
    }

    #[test]
    fn test_catalog_style_wins_over_preset() {
        let catalog = catalog("woodcut");
        let builder = PromptBuilder::new(&catalog, Some(StylePreset::Tarot));

        assert_eq!(
            builder.full_prompt(&catalog.cards[0]),
            "woodcut, golden tree with infinite branches"
        );
        assert_eq!(builder.aspect_ratio(), "2:3");
    }

    #[test]
    fn test_preset_style_and_fallback_subject() {
        let catalog = catalog("");
        let builder = PromptBuilder::new(&catalog, Some(StylePreset::Engraving));
        let prompt = builder.full_prompt(&catalog.cards[1]);

        assert!(prompt.starts_with("Detailed engraving illustration"));
        assert!(prompt.ends_with("Breakthrough (modifier card)"));
    }

    #[test]
    fn test_no_style_uses_subject_only() {
        let catalog = catalog("");
        let builder = PromptBuilder::new(&catalog, None);
        assert_eq!(
            builder.full_prompt(&catalog.cards[0]),
            "golden tree with infinite branches"
        );
    }

    #[test]
    fn test_unstyled_passes_prompt_through() {
        let catalog = catalog("woodcut");
        let builder = PromptBuilder::unstyled();
        assert_eq!(
            builder.full_prompt(&catalog.cards[0]),
            "golden tree with infinite branches"
        );
    }

    #[test]
    fn test_export_contains_every_card() {
        let catalog = catalog("");
        let export = PromptBuilder::new(&catalog, Some(StylePreset::Dutch)).export(&catalog.cards);

        assert_eq!(export.cards.len(), 2);
        assert_eq!(export.meta.aspect_ratio, "5:7");
        assert!(export.cards[0].negative_prompt.contains("photorealistic"));

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["cards"][1]["id"], "mod-01");
    }
}
