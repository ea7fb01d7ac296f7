use crate::chart::{AnalyticsView, ImageChart, RenderMode, VideoChart};
use crate::counter::{CountSummary, FrameItemCounts};
use colored::Colorize;

fn heading(text: &str, color: bool) -> String {
    if color {
        text.bold().cyan().to_string()
    } else {
        text.to_string()
    }
}

fn count_value(count: u32, color: bool) -> String {
    if color && count == 0 {
        count.to_string().dimmed().to_string()
    } else {
        count.to_string()
    }
}

fn percent(share: f64) -> String {
    format!("{:.1}%", share * 100.0)
}

/// Per-frame counts, one `tag = count` line per tag under a frame heading.
///
/// Raw output prints one `frame tag=count ...` line per frame instead.
pub fn render_counts(counts: &[FrameItemCounts], color: bool, raw: bool) -> String {
    let mut lines = Vec::new();
    if raw {
        for record in counts {
            let mut line = record.frame_key.to_string();
            for (tag, count) in record.item_counts.iter() {
                line.push_str(&format!(" {}={}", tag, count));
            }
            lines.push(line);
        }
        return lines.join("\n");
    }

    for record in counts {
        lines.push(heading(&format!("Frame {}:", record.frame_key), color));
        let width = record
            .item_counts
            .tag_names()
            .map(|t| t.as_str().chars().count())
            .max()
            .unwrap_or(0);
        for (tag, count) in record.item_counts.iter() {
            lines.push(format!(
                "  {:<width$} = {}",
                tag.as_str(),
                count_value(count, color),
                width = width
            ));
        }
    }
    lines.join("\n")
}

pub fn render_summary(summary: &CountSummary, color: bool) -> String {
    let mut lines = vec![heading("Summary:", color)];
    lines.push(format!("  frames = {}", summary.frame_count));
    lines.push(format!("  total = {}", summary.total()));
    for (tag, total) in &summary.totals {
        let peak = summary
            .peaks
            .get(tag)
            .map(|p| format!(" (peak {} in frame {})", p.count, p.frame_key))
            .unwrap_or_default();
        lines.push(format!("  {} = {}{}", tag, total, peak));
    }
    lines.join("\n")
}

fn bar(length: usize) -> String {
    "#".repeat(length)
}

fn scaled(value: f64, max: f64, width: usize) -> usize {
    if max <= 0.0 {
        return 0;
    }
    ((value / max) * width as f64).round() as usize
}

fn render_image(chart: &ImageChart, bar_width: usize, color: bool) -> String {
    let mut lines = vec![heading(
        &format!("Frame {} ({}):", chart.frame_key, chart.mode),
        color,
    )];
    let label_width = chart
        .bars
        .iter()
        .map(|b| b.tag.as_str().chars().count())
        .max()
        .unwrap_or(0);
    let max = chart.bars.iter().map(|b| b.count).max().unwrap_or(0);

    for b in &chart.bars {
        let (length, value) = match chart.mode {
            RenderMode::Bar => (
                scaled(f64::from(b.count), f64::from(max), bar_width),
                b.count.to_string(),
            ),
            RenderMode::Proportion => (scaled(b.share, 1.0, bar_width), percent(b.share)),
        };
        let line = format!(
            "  {:<label_width$} {} {}",
            b.tag.as_str(),
            bar(length),
            value,
            label_width = label_width
        );
        lines.push(line.trim_end().to_string());
    }
    lines.join("\n")
}

fn render_video(chart: &VideoChart, color: bool) -> String {
    let mut lines = vec![heading(
        &format!("Video ({} frames, {}):", chart.frame_keys.len(), chart.mode),
        color,
    )];

    let header: Vec<String> = chart
        .frame_keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            if chart.marker == Some(i) {
                format!("{}*", key)
            } else {
                key.to_string()
            }
        })
        .collect();
    let rows: Vec<(String, Vec<String>)> = chart
        .series
        .iter()
        .map(|series| {
            let cells = series
                .points
                .iter()
                .map(|p| match (chart.mode, p.share) {
                    (RenderMode::Proportion, Some(share)) => percent(share),
                    _ => p.count.to_string(),
                })
                .collect();
            (series.tag.to_string(), cells)
        })
        .collect();

    let label_width = rows
        .iter()
        .map(|(tag, _)| tag.chars().count())
        .chain(std::iter::once("frame".len()))
        .max()
        .unwrap_or(0);
    let cell_width = header
        .iter()
        .chain(rows.iter().flat_map(|(_, cells)| cells.iter()))
        .map(String::len)
        .max()
        .unwrap_or(0);

    let format_row = |label: &str, cells: &[String]| {
        let mut line = format!("  {:<label_width$}", label, label_width = label_width);
        for cell in cells {
            line.push_str(&format!(" {:>cell_width$}", cell, cell_width = cell_width));
        }
        line
    };

    lines.push(format_row("frame", &header));
    for (tag, cells) in &rows {
        lines.push(format_row(tag, cells));
    }
    lines.join("\n")
}

/// Text rendition of an analytics view.
pub fn render_view(view: &AnalyticsView, bar_width: usize, color: bool) -> String {
    match view {
        AnalyticsView::Image(chart) => render_image(chart, bar_width, color),
        AnalyticsView::Video(chart) => render_video(chart, color),
        other => other.fallback_message().unwrap_or_default(),
    }
}
