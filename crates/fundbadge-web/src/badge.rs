//! Shields-style SVG badges.

use std::fmt::Write as _;
use std::str::FromStr;

use sha2::{Digest, Sha256};

/// Narrowest message segment of a funding badge, in pixels.
pub const MIN_MESSAGE_WIDTH: u32 = 200;

const LABEL_BACKGROUND: &str = "#555";
const ERROR_BADGE_LABEL: &str = "Maintenance Fund";
const ERROR_BADGE_COLOR: &str = "9f9f9f";
const FONT_FAMILY: &str = "Verdana,Geneva,DejaVu Sans,sans-serif";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BadgeStyle {
    #[default]
    Flat,
    FlatSquare,
    ForTheBadge,
}

impl FromStr for BadgeStyle {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "flat" => Ok(Self::Flat),
            "flat-square" => Ok(Self::FlatSquare),
            "for-the-badge" => Ok(Self::ForTheBadge),
            other => Err(format!(
                "unknown badge style '{other}', expected flat, flat-square or for-the-badge"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BadgeOptions {
    pub current: f64,
    pub goal: f64,
    pub label: String,
    pub style: BadgeStyle,
    /// Six-digit hex colour without `#`; overrides the progress colour.
    pub color: Option<String>,
}

/// Progress badge reading `$<current> / $<goal> (<pct>%)`.
pub fn render_funding_badge(options: &BadgeOptions) -> String {
    let percentage = options.current / options.goal * 100.0;
    let color = options
        .color
        .as_deref()
        .unwrap_or_else(|| progress_color(percentage));

    render(
        &options.label,
        &format_message(options.current, options.goal),
        color,
        options.style,
        MIN_MESSAGE_WIDTH,
    )
}

/// Grey badge shown in place of a funding badge when the lookup failed.
pub fn render_error_badge(message: &str) -> String {
    render(
        ERROR_BADGE_LABEL,
        message,
        ERROR_BADGE_COLOR,
        BadgeStyle::FlatSquare,
        0,
    )
}

pub fn progress_color(percentage: f64) -> &'static str {
    match percentage {
        p if p < 20.0 => "e74c3c",
        p if p < 40.0 => "e67e22",
        p if p < 60.0 => "f39c12",
        p if p < 80.0 => "f1c40f",
        p if p < 100.0 => "2ecc71",
        p if p < 150.0 => "27ae60",
        _ => "9b59b6",
    }
}

pub fn format_message(current: f64, goal: f64) -> String {
    let percentage = (current / goal * 100.0).round();
    format!(
        "${} / ${} ({percentage}%)",
        format_amount(current),
        format_amount(goal)
    )
}

/// `1500` -> `1.5k`, `2300000` -> `2.3M`, `42.4` -> `42`.
pub fn format_amount(amount: f64) -> String {
    if amount >= 1_000_000.0 {
        format!("{:.1}M", amount / 1_000_000.0)
    } else if amount >= 1_000.0 {
        format!("{:.1}k", amount / 1_000.0)
    } else {
        format!("{amount:.0}")
    }
}

/// Quoted entity tag: the first 27 hex characters of the SVG's SHA-256.
pub fn etag(svg: &str) -> String {
    let digest = hex::encode(Sha256::digest(svg.as_bytes()));
    format!("\"{}\"", &digest[..27])
}

struct Metrics {
    height: u32,
    font_size: u32,
    padding: u32,
    text_y: u32,
    shadow_y: u32,
}

impl BadgeStyle {
    const fn metrics(self) -> Metrics {
        match self {
            Self::Flat | Self::FlatSquare => Metrics {
                height: 20,
                font_size: 110,
                padding: 5,
                text_y: 140,
                shadow_y: 150,
            },
            Self::ForTheBadge => Metrics {
                height: 28,
                font_size: 100,
                padding: 12,
                text_y: 175,
                shadow_y: 175,
            },
        }
    }
}

fn render(label: &str, message: &str, color: &str, style: BadgeStyle, min_message_width: u32) -> String {
    let (label, message) = match style {
        BadgeStyle::ForTheBadge => (label.to_uppercase(), message.to_uppercase()),
        _ => (label.to_owned(), message.to_owned()),
    };
    let metrics = style.metrics();

    let label_text = text_width(&label, style);
    let message_text = text_width(&message, style);
    let label_width = label_text + metrics.padding * 2;
    let message_width = (message_text + metrics.padding * 2).max(min_message_width);
    let total_width = label_width + message_width;

    let fill = css_color(color);
    let text_fill = if is_light(&fill) { "#333" } else { "#fff" };
    let label_x = label_width * 5;
    let message_x = (label_width * 2 + message_width) * 5;

    let label = escape_xml(&label);
    let message = escape_xml(&message);
    let height = metrics.height;

    let mut svg = String::with_capacity(1024);
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{total_width}" height="{height}" role="img" aria-label="{label}: {message}"><title>{label}: {message}</title>"#
    );

    match style {
        BadgeStyle::Flat => {
            let _ = write!(
                svg,
                r##"<linearGradient id="s" x2="0" y2="100%"><stop offset="0" stop-color="#bbb" stop-opacity=".1"/><stop offset="1" stop-opacity=".1"/></linearGradient><clipPath id="r"><rect width="{total_width}" height="{height}" rx="3" fill="#fff"/></clipPath><g clip-path="url(#r)"><rect width="{label_width}" height="{height}" fill="{LABEL_BACKGROUND}"/><rect x="{label_width}" width="{message_width}" height="{height}" fill="{fill}"/><rect width="{total_width}" height="{height}" fill="url(#s)"/></g>"##
            );
        }
        BadgeStyle::FlatSquare | BadgeStyle::ForTheBadge => {
            let _ = write!(
                svg,
                r#"<g shape-rendering="crispEdges"><rect width="{label_width}" height="{height}" fill="{LABEL_BACKGROUND}"/><rect x="{label_width}" width="{message_width}" height="{height}" fill="{fill}"/></g>"#
            );
        }
    }

    let weight = if style == BadgeStyle::ForTheBadge {
        r#" font-weight="bold""#
    } else {
        ""
    };
    let _ = write!(
        svg,
        r##"<g fill="#fff" text-anchor="middle" font-family="{FONT_FAMILY}" text-rendering="geometricPrecision" font-size="{}"{weight}>"##,
        metrics.font_size
    );

    let label_length = label_text * 10;
    let message_length = message_text * 10;
    if style == BadgeStyle::Flat {
        let _ = write!(
            svg,
            r##"<text aria-hidden="true" x="{label_x}" y="{}" fill="#010101" fill-opacity=".3" transform="scale(.1)" textLength="{label_length}">{label}</text>"##,
            metrics.shadow_y
        );
    }
    let _ = write!(
        svg,
        r##"<text x="{label_x}" y="{}" transform="scale(.1)" fill="#fff" textLength="{label_length}">{label}</text>"##,
        metrics.text_y
    );
    if style == BadgeStyle::Flat {
        let _ = write!(
            svg,
            r##"<text aria-hidden="true" x="{message_x}" y="{}" fill="#010101" fill-opacity=".3" transform="scale(.1)" textLength="{message_length}">{message}</text>"##,
            metrics.shadow_y
        );
    }
    let _ = write!(
        svg,
        r#"<text x="{message_x}" y="{}" transform="scale(.1)" fill="{text_fill}" textLength="{message_length}">{message}</text></g></svg>"#,
        metrics.text_y
    );

    svg
}

/// Approximate rendered width of `text` in Verdana, in whole pixels.
fn text_width(text: &str, style: BadgeStyle) -> u32 {
    let base: f64 = text
        .chars()
        .map(|ch| match ch {
            'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '!' | '\'' | '|' => 3.5,
            'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | ' ' | '/' => 4.5,
            'm' | 'w' | 'M' | 'W' | '%' => 10.5,
            'A'..='Z' | '$' | '#' | '&' => 7.5,
            _ => 6.8,
        })
        .sum();

    let width = match style {
        BadgeStyle::ForTheBadge => base * 1.1 + text.chars().count() as f64 * 1.25,
        _ => base,
    };
    width.ceil() as u32
}

fn css_color(color: &str) -> String {
    if color.len() == 6 && color.chars().all(|ch| ch.is_ascii_hexdigit()) {
        format!("#{}", color.to_ascii_lowercase())
    } else {
        escape_xml(color)
    }
}

/// Light fills get dark text, matching shields.io contrast rules.
fn is_light(fill: &str) -> bool {
    let Some(hex) = fill.strip_prefix('#').filter(|hex| hex.len() == 6) else {
        return false;
    };
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map(f64::from).unwrap_or(0.0)
    };
    let brightness = (channel(0..2) * 299.0 + channel(2..4) * 587.0 + channel(4..6) * 114.0) / 1000.0;
    brightness > 190.0
}

pub(crate) fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(current: f64, goal: f64) -> BadgeOptions {
        BadgeOptions {
            current,
            goal,
            label: String::from("Funding"),
            style: BadgeStyle::Flat,
            color: None,
        }
    }

    fn message_rect_width(svg: &str) -> u32 {
        let marker = "<rect x=\"";
        let start = svg.find(marker).expect("message rect") + marker.len();
        let rest = &svg[start..];
        let width_start = rest.find("width=\"").expect("width") + "width=\"".len();
        let width = &rest[width_start..];
        width[..width.find('"').expect("quote")]
            .parse()
            .expect("numeric width")
    }

    #[test]
    fn formats_amounts_with_suffixes() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(42.4), "42");
        assert_eq!(format_amount(999.0), "999");
        assert_eq!(format_amount(1_000.0), "1.0k");
        assert_eq!(format_amount(1_500.0), "1.5k");
        assert_eq!(format_amount(2_300_000.0), "2.3M");
    }

    #[test]
    fn message_carries_amounts_and_percentage() {
        assert_eq!(format_message(680.0, 1000.0), "$680 / $1.0k (68%)");
        assert_eq!(format_message(0.0, 5000.0), "$0 / $5.0k (0%)");
        assert_eq!(format_message(3000.0, 2000.0), "$3.0k / $2.0k (150%)");
    }

    #[test]
    fn colour_follows_progress_bands() {
        assert_eq!(progress_color(0.0), "e74c3c");
        assert_eq!(progress_color(19.9), "e74c3c");
        assert_eq!(progress_color(20.0), "e67e22");
        assert_eq!(progress_color(45.0), "f39c12");
        assert_eq!(progress_color(70.0), "f1c40f");
        assert_eq!(progress_color(99.0), "2ecc71");
        assert_eq!(progress_color(100.0), "27ae60");
        assert_eq!(progress_color(150.0), "9b59b6");
    }

    #[test]
    fn funding_badge_uses_progress_colour_unless_overridden() {
        let svg = render_funding_badge(&options(100.0, 1000.0));
        assert!(svg.contains(r##"fill="#e74c3c""##));
        assert!(svg.contains("$100 / $1.0k (10%)"));

        let mut custom = options(100.0, 1000.0);
        custom.color = Some(String::from("FF5733"));
        let svg = render_funding_badge(&custom);
        assert!(svg.contains(r##"fill="#ff5733""##));
        assert!(!svg.contains("e74c3c"));
    }

    #[test]
    fn message_segment_is_widened_to_minimum() {
        let svg = render_funding_badge(&options(1.0, 2.0));
        assert_eq!(message_rect_width(&svg), MIN_MESSAGE_WIDTH);
    }

    #[test]
    fn label_is_escaped() {
        let mut unsafe_label = options(1.0, 2.0);
        unsafe_label.label = String::from("<script>&\"");
        let svg = render_funding_badge(&unsafe_label);
        assert!(svg.contains("&lt;script&gt;&amp;&quot;"));
        assert!(!svg.contains("<script>"));
    }

    #[test]
    fn styles_change_shape() {
        let mut badge = options(500.0, 1000.0);
        let flat = render_funding_badge(&badge);
        assert!(flat.contains("rx=\"3\""));
        assert!(flat.contains("height=\"20\""));

        badge.style = BadgeStyle::FlatSquare;
        let square = render_funding_badge(&badge);
        assert!(square.contains("crispEdges"));
        assert!(!square.contains("rx=\"3\""));

        badge.style = BadgeStyle::ForTheBadge;
        let big = render_funding_badge(&badge);
        assert!(big.contains("height=\"28\""));
        assert!(big.contains("FUNDING"));
    }

    #[test]
    fn error_badge_is_grey_flat_square() {
        let svg = render_error_badge("User Not Found");
        assert!(svg.contains("Maintenance Fund"));
        assert!(svg.contains("User Not Found"));
        assert!(svg.contains(r##"fill="#9f9f9f""##));
        assert!(svg.contains("crispEdges"));
    }

    #[test]
    fn parses_styles() {
        assert_eq!("flat".parse(), Ok(BadgeStyle::Flat));
        assert_eq!("flat-square".parse(), Ok(BadgeStyle::FlatSquare));
        assert_eq!("for-the-badge".parse(), Ok(BadgeStyle::ForTheBadge));
        assert!("plastic".parse::<BadgeStyle>().is_err());
    }

    #[test]
    fn etag_is_quoted_truncated_digest() {
        let tag = etag("<svg/>");
        assert_eq!(tag.len(), 29);
        assert!(tag.starts_with('"') && tag.ends_with('"'));
        assert_eq!(tag, etag("<svg/>"));
        assert_ne!(tag, etag("<svg></svg>"));
    }
}
