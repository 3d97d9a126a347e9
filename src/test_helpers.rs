//! Shared test utilities for the figlight test suite.
//!
//! Provides page fixtures covering each widget, a parse helper, lookup
//! helpers that panic with a clear message on miss, and a temp-dir book
//! builder that writes real PNG files.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let doc = parse_page(THREE_FIGURES);
//! let figure = find_node(&doc, "figure.figure");
//! assert_eq!(doc.attr(figure, "data-figure-index"), None);
//! ```

use crate::dom::{Document, NodeId};
use crate::html;
use crate::selector::Selector;
use std::path::Path;
use tempfile::TempDir;

// =========================================================================
// Page fixtures
// =========================================================================

/// Three figures: a generic `figcaption` label, an uncaptioned figure, and a
/// structured `.caption` with id and content spans.
pub const THREE_FIGURES: &str = r#"<!DOCTYPE html>
<html>
<body>
<figure class="figure"><img src="figures/a.png" alt="Array geometry"><figcaption>Figure 1.1: Uniform linear array</figcaption></figure>
<figure class="figure"><img src="figures/b.png"></figure>
<figure class="figure"><img src="figures/c.png" alt="Lobes"><div class="caption"><span class="id">Figure 1.3</span><span class="content">Grating lobes</span></div></figure>
</body>
</html>"#;

/// Sidebar with chapter links; chapter 2 is current and has two links.
pub const SIDEBAR_PAGE: &str = r#"<html><body data-chapter="2">
<button class="hamburger" type="button">Menu</button>
<nav id="sidebar">
  <a href="ch01.html" data-ch="1">One</a>
  <a href="ch02.html" data-ch="2">Two</a>
  <a href="ch02.html#s1" data-ch="2">Two, section 1</a>
  <a href="colophon.html">Colophon</a>
</nav>
</body></html>"#;

/// Two fast targets and two slow ones, one of which matches two slow
/// selectors.
pub const REVEAL_PAGE: &str = r#"<html><body>
<section class="hero"><h1>Phased Arrays</h1><p class="subtitle">A field guide</p></section>
<figure class="figure"><img src="a.png"></figure>
<div class="key-findings chapter-nav">Findings</div>
</body></html>"#;

pub const PROGRESS_PAGE: &str = r#"<html><body>
<div class="reading-progress" data-progress="chapter" aria-hidden="true"><div class="reading-progress__bar"></div></div>
<main><p>Text</p></main>
</body></html>"#;

/// A full chapter page exercising every widget.
pub const BOOK_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Chapter 2</title>
<style>.figure > img { max-width: 100%; }</style>
</head>
<body data-chapter="2">
<div class="reading-progress" data-progress="chapter" aria-hidden="true"><div class="reading-progress__bar"></div></div>
<button class="hamburger" type="button">Menu</button>
<nav id="sidebar">
  <a href="ch01.html" data-ch="1">1. Basics</a>
  <a href="ch02.html" data-ch="2">2. Steering</a>
</nav>
<main>
<section class="hero"><h1>Beam Steering</h1></section>
<p>Phase &amp; amplitude control.</p>
<figure class="figure"><img src="img/steer.png" alt="Steered beam"><figcaption>Figure 2.1: Steered main lobe</figcaption></figure>
<figure class="figure"><img src="img/grid.png"><figcaption>Element grid</figcaption></figure>
<nav class="chapter-nav"><a href="ch01.html">Previous</a></nav>
</main>
<script>if (window.innerWidth < 860 && 1 > 0) { document.body.dataset.js = "on"; }</script>
</body>
</html>"#;

// =========================================================================
// Parsing and lookups
// =========================================================================

/// Parse a fixture. Panics on malformed markup.
pub fn parse_page(source: &str) -> Document {
    html::parse(source).unwrap_or_else(|e| panic!("fixture does not parse: {e}"))
}

/// The default figure selector.
pub fn figure_selector() -> Selector {
    Selector::parse("figure.figure").unwrap()
}

/// First element matching `selector`. Panics if there is none.
pub fn find_node(doc: &Document, selector: &str) -> NodeId {
    let parsed = Selector::parse(selector).unwrap();
    doc.query(doc.root(), &parsed)
        .unwrap_or_else(|| panic!("no element matches '{selector}'"))
}

// =========================================================================
// Book fixture on disk
// =========================================================================

/// Write a solid-color PNG of the given size.
pub fn write_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    image::RgbImage::from_pixel(width, height, image::Rgb([40, 90, 160]))
        .save(path)
        .unwrap();
}

/// A small book: one chapter page with two figures whose images exist
/// (wide and tall), a stylesheet, and a hidden file that must not be copied.
pub fn setup_book() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    std::fs::create_dir_all(root.join("chapters")).unwrap();
    std::fs::write(root.join("chapters/ch02.html"), BOOK_PAGE).unwrap();
    std::fs::write(
        root.join("index.html"),
        "<html><body><h1>Contents</h1></body></html>",
    )
    .unwrap();
    write_png(&root.join("chapters/img/steer.png"), 300, 100);
    write_png(&root.join("chapters/img/grid.png"), 100, 200);
    std::fs::create_dir_all(root.join("assets")).unwrap();
    std::fs::write(root.join("assets/book.css"), "body { margin: 0; }").unwrap();
    std::fs::write(root.join(".DS_Store"), "junk").unwrap();
    tmp
}
