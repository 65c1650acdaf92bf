//! Minimal static SVG charts.

use crate::summary::ChatSummary;

/// Chats shown in the average-sentiment chart.
pub const TOP_CHATS: usize = 15;

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 400.0;
const MARGIN: f64 = 56.0;

/// Bar chart of message counts per sentiment score.
pub fn histogram_svg(bins: &[(i32, usize)]) -> String {
    let mut svg = open("Distribución de sentimiento por mensaje");
    if bins.is_empty() {
        svg.push_str(&no_data());
        return close(svg);
    }

    let peak = bins.iter().map(|(_, count)| *count).max().unwrap_or(0).max(1) as f64;
    let slot = plot_width() / bins.len() as f64;
    let baseline = HEIGHT - MARGIN;

    for (i, (score, count)) in bins.iter().enumerate() {
        let height = plot_height() * *count as f64 / peak;
        let x = MARGIN + slot * i as f64;
        svg.push_str(&format!(
            r##"<rect class="bar" x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="#4682b4"><title>{}: {}</title></rect>"##,
            x + slot * 0.1,
            baseline - height,
            slot * 0.8,
            height,
            score,
            count
        ));
        svg.push_str(&label(x + slot / 2.0, baseline + 18.0, &score.to_string()));
    }

    svg.push_str(&axis(baseline));
    close(svg)
}

/// Average sentiment of the highest-volume chats, bars above or below zero.
///
/// `summaries` must already be ordered by volume.
pub fn top_chats_svg(summaries: &[ChatSummary]) -> String {
    let mut svg = open(&format!(
        "Sentimiento promedio, top {} chats por volumen",
        TOP_CHATS
    ));
    let top = &summaries[..summaries.len().min(TOP_CHATS)];
    if top.is_empty() {
        svg.push_str(&no_data());
        return close(svg);
    }

    let extent = top
        .iter()
        .map(|s| s.avg_sentiment.abs())
        .fold(0.0_f64, f64::max)
        .max(1.0);
    let slot = plot_width() / top.len() as f64;
    let zero = MARGIN + plot_height() / 2.0;
    let half = plot_height() / 2.0;

    for (i, summary) in top.iter().enumerate() {
        let height = half * summary.avg_sentiment.abs() / extent;
        let x = MARGIN + slot * i as f64;
        let (y, fill) = if summary.avg_sentiment >= 0.0 {
            (zero - height, "#2e8b57")
        } else {
            (zero, "#c0392b")
        };
        svg.push_str(&format!(
            r#"<rect class="bar" x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"><title>{} ({} msgs): {:.2}</title></rect>"#,
            x + slot * 0.1,
            y,
            slot * 0.8,
            height,
            fill,
            escape(&summary.chat_id),
            summary.msgs,
            summary.avg_sentiment
        ));
        svg.push_str(&format!(
            r#"<text x="{x:.1}" y="{y:.1}" font-size="10" text-anchor="end" transform="rotate(-45 {x:.1} {y:.1})">{}</text>"#,
            escape(&short_id(&summary.chat_id)),
            x = x + slot / 2.0,
            y = HEIGHT - MARGIN + 14.0,
        ));
    }

    svg.push_str(&axis(zero));
    close(svg)
}

fn plot_width() -> f64 {
    WIDTH - 2.0 * MARGIN
}

fn plot_height() -> f64 {
    HEIGHT - 2.0 * MARGIN
}

fn open(title: &str) -> String {
    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
            r#"<rect width="{w}" height="{h}" fill="white"/>"#,
            r#"<text x="{cx}" y="28" font-size="16" text-anchor="middle">{title}</text>"#,
        ),
        w = WIDTH,
        h = HEIGHT,
        cx = WIDTH / 2.0,
        title = escape(title),
    )
}

fn close(mut svg: String) -> String {
    svg.push_str("</svg>\n");
    svg
}

fn axis(y: f64) -> String {
    format!(
        r##"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="#333" stroke-width="1"/>"##,
        MARGIN,
        y,
        WIDTH - MARGIN,
        y
    )
}

fn label(x: f64, y: f64, text: &str) -> String {
    format!(
        r#"<text x="{:.1}" y="{:.1}" font-size="11" text-anchor="middle">{}</text>"#,
        x,
        y,
        escape(text)
    )
}

fn no_data() -> String {
    label(WIDTH / 2.0, HEIGHT / 2.0, "sin datos")
}

fn short_id(id: &str) -> String {
    if id.chars().count() > 12 {
        let head: String = id.chars().take(11).collect();
        format!("{}…", head)
    } else {
        id.to_string()
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
