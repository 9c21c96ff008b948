//! Vector card faces in the De Stijl layout, sized for print with bleed.
//!
//! Geometry is laid out at 300 dpi and scaled to the [`PrintSpec`] DPI.

use crate::core::html::escape;
use crate::core::layout::PrintSpec;
use crate::core::Card;

const BASE_DPI: f64 = 300.0;
const INK: &str = "#1A1A1A";
const PAPER: &str = "#FAFAFA";

/// `svg/<category>/<id>.svg`, one folder per category.
pub fn svg_file(card: &Card) -> String {
    format!(
        "svg/{}/{}.svg",
        card.category.trim().to_lowercase().replace(' ', "-"),
        card.id
    )
}

/// Number printed in the header: the part of the id after the first `-`.
fn card_number(card: &Card) -> &str {
    card.id
        .split_once('-')
        .map(|(_, n)| n)
        .filter(|n| !n.is_empty())
        .unwrap_or("00")
}

fn rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim().strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Dark ink on light accents, paper on dark ones.
fn text_on(accent: &str) -> &'static str {
    match rgb(accent) {
        Some((r, g, b)) => {
            let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
            if luma > 150.0 {
                INK
            } else {
                PAPER
            }
        }
        None => PAPER,
    }
}

pub fn svg_card(card: &Card, spec: &PrintSpec, deck_title: &str) -> String {
    let k = spec.dpi as f64 / BASE_DPI;
    let s = |v: f64| format!("{:.1}", v * k);

    let dpi = spec.dpi as f64;
    let width = spec.card_width_in * dpi;
    let height = spec.card_height_in * dpi;
    let bleed = spec.bleed_in * dpi;
    let total_w = spec.total_width_px();
    let total_h = spec.total_height_px();

    let accent = escape(card.color());
    let text = text_on(card.color());
    let px = |v: f64| format!("{:.1}", v);

    format!(
        r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {total_w} {total_h}" width="{total_w}" height="{total_h}">
  <defs>
    <style>
      .display {{ font-family: 'Space Grotesk', sans-serif; }}
      .mono {{ font-family: 'JetBrains Mono', monospace; }}
    </style>
  </defs>
  <rect x="0" y="0" width="{total_w}" height="{total_h}" fill="{paper}"/>
  <rect class="card" x="{bx}" y="{by}" width="{cw}" height="{ch}" fill="{paper}" stroke="{ink}" stroke-width="{stroke}" rx="{radius}"/>
  <rect class="header" x="{hx}" y="{hy}" width="{hw}" height="{hh}" fill="{accent}"/>
  <text x="{lx}" y="{ly}" class="display" fill="{text}" font-size="{label_size}" font-weight="700" letter-spacing="{spacing}">{category}</text>
  <text x="{nx}" y="{ly}" class="mono" fill="{text}" font-size="{number_size}" text-anchor="end" opacity="0.8">{number}</text>
  <rect x="{ax}" y="{hy}" width="{aw}" height="{ah}" fill="{accent}" opacity="0.15"/>
  <rect x="{hx}" y="{fy}" width="{fw}" height="{fh}" fill="{accent}" opacity="0.1"/>
  <text x="{cx}" y="{ty}" class="display" fill="{ink}" font-size="{title_size}" font-weight="700" text-anchor="middle">{title}</text>
  <line x1="{lx}" y1="{rule_y}" x2="{nx}" y2="{rule_y}" stroke="{ink}" stroke-width="{rule}"/>
  <text x="{lx}" y="{foot_y}" class="display" fill="#999" font-size="{foot_size}" font-weight="700" letter-spacing="{foot_spacing}">{footer}</text>
</svg>
"##,
        total_w = total_w,
        total_h = total_h,
        paper = PAPER,
        ink = INK,
        accent = accent,
        text = text,
        bx = px(bleed),
        by = px(bleed),
        cw = px(width),
        ch = px(height),
        stroke = s(9.0),
        radius = s(24.0),
        hx = px(bleed + 4.5 * k),
        hy = px(bleed + 4.5 * k),
        hw = px(width - 9.0 * k),
        hh = s(120.0),
        lx = px(bleed + 48.0 * k),
        ly = px(bleed + 72.0 * k),
        nx = px(bleed + width - 48.0 * k),
        label_size = s(30.0),
        spacing = s(4.0),
        number_size = s(27.0),
        category = escape(&card.category.to_uppercase()),
        number = escape(card_number(card)),
        ax = px(bleed + width - 180.0 * k),
        aw = s(175.5),
        ah = s(180.0),
        fy = px(bleed + height - 240.0 * k),
        fw = s(120.0),
        fh = s(235.5),
        cx = px(bleed + width / 2.0),
        ty = px(bleed + height * 0.43),
        title_size = s(60.0),
        title = escape(&card.name),
        rule_y = px(bleed + height - 144.0 * k),
        rule = s(3.0),
        foot_y = px(bleed + height - 84.0 * k),
        foot_size = s(24.0),
        foot_spacing = s(3.0),
        footer = escape(&deck_title.to_uppercase()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, name: &str, category: &str) -> Card {
        Card {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            color: None,
            prompt: None,
        }
    }

    #[test]
    fn test_canvas_includes_bleed() {
        let svg = svg_card(&card("arc-07", "Growth", "Arc"), &PrintSpec::poker(), "Futures Deck");

        assert!(svg.contains(r#"width="825" height="1125""#));
        assert!(svg.contains(r#"viewBox="0 0 825 1125""#));
        // card body starts inside the 1/8" bleed
        assert!(svg.contains(r#"<rect class="card" x="37.5" y="37.5""#));
        assert!(svg.contains(">ARC</text>"));
        assert!(svg.contains(">07</text>"));
        assert!(svg.contains(">FUTURES DECK</text>"));
    }

    #[test]
    fn test_bleedless_card_starts_at_origin() {
        let svg = svg_card(&card("solo", "Solo", "Arc"), &PrintSpec::bleedless(), "Deck");

        assert!(svg.contains(r#"<rect class="card" x="0.0" y="0.0""#));
        assert!(svg.contains(">00</text>"));
    }

    #[test]
    fn test_text_is_escaped() {
        let svg = svg_card(
            &card("x-1", "Salt & <Pepper>", "Wellbeing"),
            &PrintSpec::poker(),
            "R&D",
        );

        assert!(svg.contains("Salt &amp; &lt;Pepper&gt;"));
        assert!(svg.contains(">R&amp;D</text>"));
        assert!(!svg.contains("<Pepper>"));
    }

    #[test]
    fn test_text_contrast_follows_accent() {
        assert_eq!(text_on("#FFC107"), INK);
        assert_eq!(text_on("#1565C0"), PAPER);
        assert_eq!(text_on("not a colour"), PAPER);
    }

    #[test]
    fn test_file_grouped_by_category() {
        assert_eq!(svg_file(&card("tech-01", "AI", "Tech Shift")), "svg/tech-shift/tech-01.svg");
    }
}
