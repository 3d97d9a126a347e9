//! CLI output formatting for scan, check and build.
//!
//! # Information-First Display
//!
//! Output is **figure-centric, not file-centric**. Each page is a header
//! with its figure count; each figure leads with its positional index and
//! normalized caption, with the image source and probed size shown as
//! indented context lines. This makes the output readable as a list of
//! figures while still letting users trace each one back to its file.
//!
//! # Output Format
//!
//! ## Scan / Check
//!
//! ```text
//! chapters/ch02.html (2 figures)
//!     001 Figure 2.1: Steered main lobe
//!         Image: img/steer.png
//!         Size: 300x100 (ultra-wide)
//!     002 Figure 2: Element grid
//!         Image: img/grid.png
//!         Size: unknown
//!     Widgets: sidebar, reading progress, 4 reveal targets
//! ```
//!
//! ## Build
//!
//! ```text
//! 001 chapters/ch02.html (2 figures)
//! 002 index.html (0 figures)
//! Enhanced 2 pages, 2 figures, copied 3 assets
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::site::{BuildReport, FigureSummary, PageReport};

/// Captions longer than this are cut in listings.
const CAPTION_WIDTH: usize = 72;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Page header: path and figure count.
///
/// ```text
/// chapters/ch02.html (2 figures)
/// ```
fn page_header(page: &PageReport) -> String {
    format!(
        "{} ({})",
        page.path,
        plural(page.figure_count(), "figure", "figures")
    )
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_caption(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut.trim_end())
    }
}

/// Figure line: index plus caption id and text.
///
/// ```text
/// 001 Figure 2.1: Steered main lobe
/// 002 Figure 2:
/// ```
fn figure_line(figure: &FigureSummary) -> String {
    let caption = format!("{} {}", figure.id, figure.text);
    format!(
        "{} {}",
        format_index(figure.number),
        truncate_caption(caption.trim(), CAPTION_WIDTH)
    )
}

fn size_line(figure: &FigureSummary) -> String {
    match (figure.size, figure.orientation) {
        (Some(size), Some(orientation)) => format!(
            "Size: {}x{} ({})",
            size.width,
            size.height,
            orientation.label()
        ),
        (Some(size), None) => format!("Size: {}x{}", size.width, size.height),
        _ => "Size: unknown".to_string(),
    }
}

fn widgets_line(page: &PageReport) -> String {
    let mut widgets = Vec::new();
    if page.sidebar {
        widgets.push("sidebar".to_string());
    }
    if page.progress {
        widgets.push("reading progress".to_string());
    }
    if page.reveal_targets > 0 {
        widgets.push(plural(page.reveal_targets, "reveal target", "reveal targets"));
    }
    if widgets.is_empty() {
        "Widgets: none".to_string()
    } else {
        format!("Widgets: {}", widgets.join(", "))
    }
}

// ============================================================================
// Scan / check output
// ============================================================================

/// Format the figure index of each page.
pub fn format_scan_output(pages: &[PageReport]) -> Vec<String> {
    let mut lines = Vec::new();
    for page in pages {
        lines.push(page_header(page));
        for figure in &page.figures {
            lines.push(format!("{}{}", indent(1), figure_line(figure)));
            if let Some(src) = &figure.src {
                lines.push(format!("{}Image: {}", indent(2), src));
            }
            lines.push(format!("{}{}", indent(2), size_line(figure)));
        }
        lines.push(format!("{}{}", indent(1), widgets_line(page)));
    }
    lines
}

/// Print scan output to stdout.
pub fn print_scan_output(pages: &[PageReport]) {
    for line in format_scan_output(pages) {
        println!("{}", line);
    }
}

// ============================================================================
// Build output
// ============================================================================

/// Format build output: one line per enhanced page and a summary.
pub fn format_build_output(report: &BuildReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .pages
        .iter()
        .enumerate()
        .map(|(i, page)| format!("{} {}", format_index(i + 1), page_header(page)))
        .collect();
    lines.push(format!(
        "Enhanced {}, {}, copied {}",
        plural(report.pages.len(), "page", "pages"),
        plural(report.figure_count(), "figure", "figures"),
        plural(report.assets_copied, "asset", "assets"),
    ));
    lines
}

/// Print build output to stdout.
pub fn print_build_output(report: &BuildReport) {
    for line in format_build_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
