//! Print geometry: card sizes with bleed, sheet grids and cut marks.
//!
//! All lengths are inches unless the name ends in `_px`.

use crate::utils::error::{DeckError, Result};
use serde::{Deserialize, Serialize};

pub const LETTER_WIDTH_IN: f64 = 8.5;
pub const LETTER_HEIGHT_IN: f64 = 11.0;
pub const CUT_MARK_LENGTH_IN: f64 = 0.15;
pub const CUT_MARK_INSET_IN: f64 = 0.05;
/// 短於這個長度的裁切線不畫
const MIN_CUT_MARK_IN: f64 = 0.05;
const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum PrintPreset {
    /// 2.5" x 3.5" poker card with 1/8" bleed
    #[default]
    Poker,
    /// 63mm x 88mm (2.48" x 3.46") as print shops size poker cards
    MpcPoker,
    /// 2.5" x 3.5" without bleed, for home printing
    Bleedless,
}

impl PrintPreset {
    pub fn spec(self) -> PrintSpec {
        match self {
            PrintPreset::Poker => PrintSpec::poker(),
            PrintPreset::MpcPoker => PrintSpec::mpc_poker(),
            PrintPreset::Bleedless => PrintSpec::bleedless(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrintSpec {
    pub card_width_in: f64,
    pub card_height_in: f64,
    pub bleed_in: f64,
    pub safe_margin_in: f64,
    pub dpi: u32,
}

impl PrintSpec {
    pub fn poker() -> Self {
        Self {
            card_width_in: 2.5,
            card_height_in: 3.5,
            bleed_in: 0.125,
            safe_margin_in: 0.125,
            dpi: 300,
        }
    }

    pub fn mpc_poker() -> Self {
        Self {
            card_width_in: 2.48,
            card_height_in: 3.46,
            ..Self::poker()
        }
    }

    pub fn bleedless() -> Self {
        Self {
            bleed_in: 0.0,
            ..Self::poker()
        }
    }

    pub fn with_bleed(self, bleed_in: f64) -> Self {
        Self { bleed_in, ..self }
    }

    pub fn has_bleed(&self) -> bool {
        self.bleed_in > EPSILON
    }

    pub fn total_width_in(&self) -> f64 {
        self.card_width_in + self.bleed_in * 2.0
    }

    pub fn total_height_in(&self) -> f64 {
        self.card_height_in + self.bleed_in * 2.0
    }

    pub fn to_px(&self, inches: f64) -> u32 {
        (inches * self.dpi as f64).round() as u32
    }

    pub fn total_width_px(&self) -> u32 {
        self.to_px(self.total_width_in())
    }

    pub fn total_height_px(&self) -> u32 {
        self.to_px(self.total_height_in())
    }

    pub fn bleed_px(&self) -> u32 {
        self.to_px(self.bleed_in)
    }

    pub fn safe_px(&self) -> u32 {
        self.to_px(self.safe_margin_in)
    }

    /// Human-readable summary, printed by `card-forge specs`.
    pub fn describe(&self) -> Vec<String> {
        vec![
            format!("Card size:  {}\" x {}\"", self.card_width_in, self.card_height_in),
            format!(
                "With bleed: {:.3}\" x {:.3}\"",
                self.total_width_in(),
                self.total_height_in()
            ),
            format!("Resolution: {} DPI", self.dpi),
            format!("Pixels:     {} x {}", self.total_width_px(), self.total_height_px()),
            format!("Bleed:      {}\" ({}px) each side", self.bleed_in, self.bleed_px()),
            format!("Safe zone:  {}\" ({}px) inside cut", self.safe_margin_in, self.safe_px()),
            "Corners:    SQUARE (printer rounds them)".to_string(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOrientation {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutMark {
    pub orientation: MarkOrientation,
    pub x_in: f64,
    pub y_in: f64,
    pub length_in: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub spec: PrintSpec,
    pub page_width_in: f64,
    pub page_height_in: f64,
    pub columns: usize,
    pub rows: usize,
    pub gap_in: f64,
}

impl SheetLayout {
    /// 3 x 3 grid centred on a US Letter page.
    pub fn letter(spec: PrintSpec, gap_in: f64) -> Result<Self> {
        let layout = Self {
            spec,
            page_width_in: LETTER_WIDTH_IN,
            page_height_in: LETTER_HEIGHT_IN,
            columns: 3,
            rows: 3,
            gap_in,
        };

        if layout.offset_x_in() < -EPSILON || layout.offset_y_in() < -EPSILON {
            return Err(DeckError::InvalidConfigValueError {
                field: "print".to_string(),
                value: format!(
                    "{:.3}\" x {:.3}\" grid",
                    layout.grid_width_in(),
                    layout.grid_height_in()
                ),
                reason: format!(
                    "does not fit a {}\" x {}\" page; reduce print.sheet_bleed_in or print.gap_in",
                    layout.page_width_in, layout.page_height_in
                ),
            });
        }

        Ok(layout)
    }

    pub fn cards_per_page(&self) -> usize {
        self.columns * self.rows
    }

    pub fn grid_width_in(&self) -> f64 {
        self.spec.total_width_in() * self.columns as f64 + self.gap_in * (self.columns - 1) as f64
    }

    pub fn grid_height_in(&self) -> f64 {
        self.spec.total_height_in() * self.rows as f64 + self.gap_in * (self.rows - 1) as f64
    }

    pub fn offset_x_in(&self) -> f64 {
        (self.page_width_in - self.grid_width_in()) / 2.0
    }

    pub fn offset_y_in(&self) -> f64 {
        (self.page_height_in - self.grid_height_in()) / 2.0
    }

    /// Top-left corner (including bleed) of the card in `slot`, row-major.
    pub fn card_origin(&self, slot: usize) -> (f64, f64) {
        let col = slot % self.columns;
        let row = slot / self.columns;
        (
            self.offset_x_in() + col as f64 * (self.spec.total_width_in() + self.gap_in),
            self.offset_y_in() + row as f64 * (self.spec.total_height_in() + self.gap_in),
        )
    }

    pub fn trim_lines_x(&self) -> Vec<f64> {
        let lines = (0..self.columns).flat_map(|col| {
            let (x, _) = self.card_origin(col);
            let left = x + self.spec.bleed_in;
            [left, left + self.spec.card_width_in]
        });
        dedup_lines(lines)
    }

    pub fn trim_lines_y(&self) -> Vec<f64> {
        let lines = (0..self.rows).flat_map(|row| {
            let (_, y) = self.card_origin(row * self.columns);
            let top = y + self.spec.bleed_in;
            [top, top + self.spec.card_height_in]
        });
        dedup_lines(lines)
    }

    /// Marks in the page margins at every trim line: vertical ones above and
    /// below the grid, horizontal ones left and right of it.
    pub fn cut_marks(&self) -> Vec<CutMark> {
        let mut marks = Vec::new();

        let vertical_len = (self.offset_y_in() - CUT_MARK_INSET_IN).min(CUT_MARK_LENGTH_IN);
        if vertical_len >= MIN_CUT_MARK_IN {
            for x in self.trim_lines_x() {
                marks.push(CutMark {
                    orientation: MarkOrientation::Vertical,
                    x_in: x,
                    y_in: CUT_MARK_INSET_IN,
                    length_in: vertical_len,
                });
                marks.push(CutMark {
                    orientation: MarkOrientation::Vertical,
                    x_in: x,
                    y_in: self.page_height_in - CUT_MARK_INSET_IN - vertical_len,
                    length_in: vertical_len,
                });
            }
        }

        let horizontal_len = (self.offset_x_in() - CUT_MARK_INSET_IN).min(CUT_MARK_LENGTH_IN);
        if horizontal_len >= MIN_CUT_MARK_IN {
            for y in self.trim_lines_y() {
                marks.push(CutMark {
                    orientation: MarkOrientation::Horizontal,
                    x_in: CUT_MARK_INSET_IN,
                    y_in: y,
                    length_in: horizontal_len,
                });
                marks.push(CutMark {
                    orientation: MarkOrientation::Horizontal,
                    x_in: self.page_width_in - CUT_MARK_INSET_IN - horizontal_len,
                    y_in: y,
                    length_in: horizontal_len,
                });
            }
        }

        marks
    }
}

fn dedup_lines(lines: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::new();
    for line in lines {
        if out.last().map_or(true, |last| (line - last).abs() > EPSILON) {
            out.push(line);
        }
    }
    out
}

/// Splits `items` into pages of `per_page`, padding the last page with
/// `filler`. Empty input yields no pages.
pub fn paginate<T: Clone>(items: &[T], per_page: usize, filler: Option<&T>) -> Vec<Vec<T>> {
    if per_page == 0 {
        return Vec::new();
    }

    let mut pages: Vec<Vec<T>> = items.chunks(per_page).map(|c| c.to_vec()).collect();

    if let (Some(last), Some(filler)) = (pages.last_mut(), filler) {
        while last.len() < per_page {
            last.push(filler.clone());
        }
    }

    pages
}
