//! HTML templates for single cards and Letter print sheets.
//!
//! Card fragments are sized from a [`PrintSpec`] and written in either pixel
//! units (standalone PNG renders at the card DPI) or inches (print sheets).

use crate::core::layout::{CutMark, MarkOrientation, PrintSpec, SheetLayout};
use crate::core::{Card, PromptCard, SheetItem};
use std::fmt::Write as _;

const FONTS_URL: &str = "https://fonts.googleapis.com/css2?family=Playfair+Display:ital,wght@0,400;0,500;0,600;1,400&family=Source+Sans+Pro:wght@400;600&family=Bebas+Neue&display=swap";
const GOLD: &str = "#c9a227";
const SUNBURST_RAYS: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Units {
    Px { dpi: u32 },
    Inches,
}

impl Units {
    fn len(self, inches: f64) -> String {
        match self {
            Units::Px { dpi } => format!("{:.1}px", inches * dpi as f64),
            Units::Inches => format!("{:.4}in", inches),
        }
    }

    /// Type size in points at print scale.
    fn pt(self, points: f64) -> String {
        self.len(points / 72.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum SheetSides {
    Fronts,
    Backs,
    #[default]
    Both,
}

impl SheetSides {
    pub fn includes_fronts(self) -> bool {
        matches!(self, SheetSides::Fronts | SheetSides::Both)
    }

    pub fn includes_backs(self) -> bool {
        matches!(self, SheetSides::Backs | SheetSides::Both)
    }

    pub fn suffix(self) -> &'static str {
        match self {
            SheetSides::Fronts => "-fronts",
            SheetSides::Backs => "-backs",
            SheetSides::Both => "",
        }
    }
}

/// Deck title and subtitle printed on every back.
#[derive(Debug, Clone)]
pub struct DeckBranding {
    pub title: String,
    pub subtitle: String,
}

/// Catalog totals shown in the sheet's info bar; filler copies are not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetCounts {
    pub vision: usize,
    pub prompts: usize,
}

impl SheetCounts {
    pub fn from_items(items: &[SheetItem]) -> Self {
        let vision = items
            .iter()
            .filter(|item| matches!(item, SheetItem::Vision(_)))
            .count();
        Self {
            vision,
            prompts: items.len() - vision,
        }
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn card_box(spec: &PrintSpec, units: Units, background: &str) -> String {
    format!(
        r#"<div class="card" style="position: relative; overflow: hidden; width: {}; height: {}; background: {};">"#,
        units.len(spec.total_width_in()),
        units.len(spec.total_height_in()),
        background
    )
}

/// Full-bleed front: artwork on top, category and name in a dark panel.
/// Corners stay square; the print shop rounds them.
pub fn card_front(card: &Card, artwork_src: &str, spec: &PrintSpec, units: Units) -> String {
    let side_pad = spec.bleed_in + 0.12;
    let bottom_pad = spec.bleed_in + 0.14;

    format!(
        r#"{open}
  <div style="position: absolute; inset: 0; display: flex; flex-direction: column;">
    <div class="artwork" style="flex: 1; overflow: hidden;">
      <img src="{src}" alt="{name}" style="width: 100%; height: 100%; object-fit: cover; display: block;">
    </div>
    <div class="text-panel" style="background: linear-gradient(to bottom, #1a1a1a, #0f0f0f); border-top: 1px solid #333; padding: {pad_top} {side} {bottom} {side};">
      <div class="category" style="font-family: 'Source Sans Pro', sans-serif; font-weight: 600; font-size: {cat_size}; letter-spacing: 0.15em; text-transform: uppercase; color: {color}; margin-bottom: {cat_gap};">{category}</div>
      <div class="title" style="font-family: 'Playfair Display', serif; font-weight: 500; font-size: {title_size}; color: #fff;">{name}</div>
    </div>
  </div>
</div>"#,
        open = card_box(spec, units, "#1a1a1a"),
        src = escape(artwork_src),
        name = escape(&card.name),
        category = escape(&card.category),
        color = escape(card.color()),
        pad_top = units.len(0.1),
        side = units.len(side_pad),
        bottom = units.len(bottom_pad),
        cat_size = units.pt(6.0),
        cat_gap = units.len(0.02),
        title_size = units.pt(13.0),
    )
}

/// Procedural art-deco back, positioned relative to the trim line.
pub fn card_back(spec: &PrintSpec, units: Units, branding: &DeckBranding) -> String {
    let b = spec.bleed_in;
    let inset = |extra: f64| units.len(b + extra);

    let mut rays = String::new();
    for i in 0..SUNBURST_RAYS {
        let _ = write!(
            rays,
            r#"<div class="ray" style="position: absolute; top: 50%; left: 50%; width: {}; height: 1px; transform-origin: left center; transform: rotate({}deg); background: linear-gradient(90deg, rgba(201, 162, 39, 0.4), transparent);"></div>"#,
            units.len(0.8),
            i * 360 / SUNBURST_RAYS
        );
    }

    let diamonds: String = [0.65, 0.9, 1.15]
        .iter()
        .map(|size| {
            format!(
                r#"<div class="diamond" style="position: absolute; top: 50%; left: 50%; width: {s}; height: {s}; transform: translate(-50%, -50%) rotate(45deg); border: 1px solid rgba(201, 162, 39, 0.3);"></div>"#,
                s = units.len(*size)
            )
        })
        .collect();

    let corner = |vertical: &str, horizontal: &str, hidden: &str| {
        format!(
            r#"<div class="corner" style="position: absolute; {v}: {o}; {h}: {o}; width: {s}; height: {s}; border: 2px solid {GOLD}; {hidden}"></div>"#,
            v = vertical,
            h = horizontal,
            o = inset(0.3),
            s = units.len(0.25),
            hidden = hidden,
        )
    };

    format!(
        r#"{open}
  <div class="pattern" style="position: absolute; inset: 0; background-image: repeating-linear-gradient(45deg, transparent, transparent {step}, rgba(201, 162, 39, 0.05) {step}, rgba(201, 162, 39, 0.05) {step1}), repeating-linear-gradient(-45deg, transparent, transparent {step}, rgba(201, 162, 39, 0.05) {step}, rgba(201, 162, 39, 0.05) {step1});"></div>
  {diamonds}
  <div class="sunburst" style="position: absolute; inset: 0;">{rays}</div>
  <div class="border-outer" style="position: absolute; top: {o1}; left: {o1}; right: {o1}; bottom: {o1}; border: 2px solid {GOLD}; border-radius: {r1};"></div>
  <div class="border-inner" style="position: absolute; top: {o2}; left: {o2}; right: {o2}; bottom: {o2}; border: 1px solid rgba(201, 162, 39, 0.4); border-radius: {r2};"></div>
  {tl}{tr}{bl}{br}
  <div class="deco-diamond" style="position: absolute; left: 50%; top: {d}; width: {dw}; height: {dw}; background: {GOLD}; transform: translateX(-50%) rotate(45deg);"></div>
  <div class="deco-diamond" style="position: absolute; left: 50%; bottom: {d}; width: {dw}; height: {dw}; background: {GOLD}; transform: translateX(-50%) rotate(45deg);"></div>
  <div class="center" style="position: absolute; top: 50%; left: 50%; transform: translate(-50%, -50%); text-align: center;">
    <div class="eye" style="position: relative; width: {eye_w}; height: {eye_h}; border: 2px solid {GOLD}; border-radius: 50%; margin: 0 auto {eye_gap};">
      <div style="position: absolute; top: 50%; left: 50%; transform: translate(-50%, -50%); width: {pupil}; height: {pupil}; background: {GOLD}; border-radius: 50%;"></div>
    </div>
    <div class="back-title" style="font-family: 'Bebas Neue', sans-serif; font-size: {title_size}; letter-spacing: 0.25em; color: {GOLD}; text-transform: uppercase; white-space: nowrap;">{title}</div>
    <div class="back-subtitle" style="font-family: 'Playfair Display', serif; font-style: italic; font-size: {sub_size}; letter-spacing: 0.1em; color: rgba(201, 162, 39, 0.6);">{subtitle}</div>
  </div>
</div>"#,
        open = card_box(spec, units, "linear-gradient(135deg, #0d1117 0%, #080810 50%, #0d1117 100%)"),
        step = units.len(0.1),
        step1 = units.len(0.11),
        diamonds = diamonds,
        rays = rays,
        o1 = inset(0.12),
        o2 = inset(0.2),
        r1 = units.len(0.08),
        r2 = units.len(0.05),
        tl = corner("top", "left", "border-right: none; border-bottom: none;"),
        tr = corner("top", "right", "border-left: none; border-bottom: none;"),
        bl = corner("bottom", "left", "border-right: none; border-top: none;"),
        br = corner("bottom", "right", "border-left: none; border-top: none;"),
        d = inset(0.4),
        dw = units.len(0.06),
        eye_w = units.len(0.5),
        eye_h = units.len(0.25),
        eye_gap = units.len(0.12),
        pupil = units.len(0.12),
        title_size = units.pt(18.0),
        sub_size = units.pt(8.0),
        title = escape(&branding.title),
        subtitle = escape(&branding.subtitle),
    )
}

/// Text-only instruction card on cream stock.
pub fn prompt_card(card: &PromptCard, spec: &PrintSpec, units: Units, branding: &DeckBranding) -> String {
    let b = spec.bleed_in;

    format!(
        r#"{open}
  <div style="position: absolute; top: {b}; left: {b}; width: {w}; height: {h}; padding: {pad}; display: flex; flex-direction: column;">
    <div style="position: absolute; top: {frame}; left: {frame}; right: {frame}; bottom: {frame}; border: 2px solid {GOLD}; border-radius: {radius}; pointer-events: none;"></div>
    <div class="prompt-title" style="font-family: 'Bebas Neue', sans-serif; font-size: {title_size}; letter-spacing: 0.15em; color: {GOLD}; text-align: center; text-transform: uppercase; margin-bottom: {gap};">{title}</div>
    <div style="width: {rule}; height: 2px; background: {GOLD}; margin: 0 auto {gap};"></div>
    <div class="prompt-text" style="font-family: 'Source Sans Pro', sans-serif; font-size: {text_size}; line-height: 1.5; color: #333; flex: 1; white-space: pre-wrap;">{text}</div>
    <div style="font-family: 'Playfair Display', serif; font-style: italic; font-size: {foot_size}; color: #999; text-align: center;">{deck} &middot; Prompt Card</div>
  </div>
</div>"#,
        open = card_box(spec, units, "#f8f6f0"),
        b = units.len(b),
        w = units.len(spec.card_width_in),
        h = units.len(spec.card_height_in),
        pad = units.len(0.2),
        frame = units.len(0.1),
        radius = units.len(0.08),
        title_size = units.pt(13.0),
        gap = units.len(0.1),
        rule = units.len(0.5),
        text_size = units.pt(7.0),
        foot_size = units.pt(6.0),
        title = escape(&card.title),
        text = escape(&card.text),
        deck = escape(&branding.title),
    )
}

fn head(title: &str, extra_css: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>{title}</title>
  <link href="{FONTS_URL}" rel="stylesheet">
  <style>
    * {{ margin: 0; padding: 0; box-sizing: border-box; }}
    .card {{ -webkit-print-color-adjust: exact; print-color-adjust: exact; }}
{extra_css}
  </style>
</head>"#,
        title = escape(title),
        FONTS_URL = FONTS_URL,
        extra_css = extra_css
    )
}

/// Wraps one card fragment in a page exactly the size of the card with bleed.
pub fn standalone_page(body: &str, spec: &PrintSpec, title: &str) -> String {
    let css = format!(
        "    html, body {{ width: {w}px; height: {h}px; overflow: hidden; background: #1a1a1a; }}",
        w = spec.total_width_px(),
        h = spec.total_height_px()
    );
    format!("{}\n<body>\n{}\n</body>\n</html>\n", head(title, &css), body)
}

const SHEET_CSS: &str = r#"    @page { size: letter; margin: 0; }
    body { background: white; font-family: 'Source Sans Pro', sans-serif; }
    .page { position: relative; width: 8.5in; height: 11in; background: white; overflow: hidden; page-break-after: always; }
    .page:last-child { page-break-after: auto; }
    .slot { position: absolute; }
    .cut-mark { position: absolute; background: #000; -webkit-print-color-adjust: exact; print-color-adjust: exact; }
    @media screen {
      body { background: #333; padding: 20px; }
      .page { margin: 0 auto 20px; box-shadow: 0 4px 20px rgba(0, 0, 0, 0.4); }
      .info { max-width: 8.5in; margin: 0 auto 20px; padding: 16px 20px; background: #222; color: #fff; border-radius: 8px; display: flex; justify-content: space-between; align-items: center; }
      .info h1 { font-size: 16px; color: #c9a227; }
      .info p { font-size: 13px; color: #888; margin-top: 4px; }
      .info button { background: #c9a227; color: #000; border: none; padding: 10px 20px; font-weight: 600; cursor: pointer; border-radius: 4px; }
    }
    @media print {
      body { padding: 0; }
      .info { display: none; }
    }"#;

fn cut_mark_html(mark: &CutMark) -> String {
    let (width, height) = match mark.orientation {
        MarkOrientation::Vertical => ("0.5pt".to_string(), format!("{:.4}in", mark.length_in)),
        MarkOrientation::Horizontal => (format!("{:.4}in", mark.length_in), "0.5pt".to_string()),
    };
    format!(
        r#"<div class="cut-mark" style="left: {:.4}in; top: {:.4}in; width: {}; height: {};"></div>"#,
        mark.x_in, mark.y_in, width, height
    )
}

/// Builds the Letter print sheet: for every page of nine, a fronts page
/// followed by a backs page (as selected by `sides`).
pub fn print_sheet(
    pages: &[Vec<SheetItem>],
    counts: SheetCounts,
    layout: &SheetLayout,
    branding: &DeckBranding,
    sides: SheetSides,
    artwork_src: impl Fn(&Card) -> String,
) -> String {
    let spec = &layout.spec;
    let units = Units::Inches;
    let marks: String = if spec.has_bleed() {
        layout.cut_marks().iter().map(cut_mark_html).collect()
    } else {
        String::new()
    };

    let slot = |index: usize, fragment: String| {
        let (x, y) = layout.card_origin(index);
        format!(
            "<div class=\"slot\" style=\"left: {:.4}in; top: {:.4}in;\">{}</div>",
            x, y, fragment
        )
    };

    let mut body = String::new();
    for (i, page) in pages.iter().enumerate() {
        if sides.includes_fronts() {
            let _ = writeln!(body, "<!-- sheet {} fronts -->", i + 1);
            body.push_str("<section class=\"page fronts\">\n");
            for (index, item) in page.iter().enumerate() {
                let fragment = match item {
                    SheetItem::Vision(card) => card_front(card, &artwork_src(card), spec, units),
                    SheetItem::Prompt(card) => prompt_card(card, spec, units, branding),
                };
                body.push_str(&slot(index, fragment));
                body.push('\n');
            }
            body.push_str(&marks);
            body.push_str("\n</section>\n");
        }

        if sides.includes_backs() {
            let _ = writeln!(body, "<!-- sheet {} backs -->", i + 1);
            body.push_str("<section class=\"page backs\">\n");
            for index in 0..page.len() {
                body.push_str(&slot(index, card_back(spec, units, branding)));
                body.push('\n');
            }
            body.push_str(&marks);
            body.push_str("\n</section>\n");
        }
    }

    format!(
        r#"{head}
<body>
  <div class="info">
    <div>
      <h1>{title} &middot; {total} cards</h1>
      <p>{vision} vision cards + {prompts} prompt cards | {size} | Print double-sided, flip on long edge.</p>
    </div>
    <button onclick="window.print()">Print</button>
  </div>
{body}</body>
</html>
"#,
        head = head(&format!("{} - Print Sheet", branding.title), SHEET_CSS),
        title = escape(&branding.title),
        total = counts.vision + counts.prompts,
        vision = counts.vision,
        prompts = counts.prompts,
        size = format!(
            "{:.2}\" x {:.2}\" per card",
            spec.total_width_in(),
            spec.total_height_in()
        ),
        body = body,
    )
}
