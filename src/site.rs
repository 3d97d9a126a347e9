//! Book-level build: enhance every page of a source directory.
//!
//! ```text
//! book/                          dist/
//! ├── figlight.toml   (config)   ├── figures.json
//! ├── index.html        ──────▶  ├── index.html          (enhanced)
//! ├── chapters/                  ├── chapters/
//! │   ├── ch02.html     ──────▶  │   ├── ch02.html      (enhanced)
//! │   └── img/steer.png ──────▶  │   └── img/steer.png  (copied)
//! └── .DS_Store       (skipped)  └── ...
//! ```
//!
//! For each HTML page: parse it, resolve every local `<img>` against the
//! page's directory and probe the file for its natural size, install the
//! widgets, and serialize the result. Images that cannot be probed are
//! logged and left without a size, exactly as a broken image behaves in a
//! browser. Pages are independent and processed in parallel.
//!
//! Everything else is copied verbatim, except hidden files and the config
//! file. `figures.json` records the figure index of every page.

use crate::config::{CONFIG_FILE, Config};
use crate::dom::{Dimensions, Document};
use crate::figure::Orientation;
use crate::html;
use crate::page::{InstallError, Page};
use crate::probe::DimensionProbe;
use crate::selector::Selector;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").expect("img selector"));

/// Name of the figure index written at the output root.
pub const FIGURES_JSON: &str = "figures.json";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Source directory not found: {0}")]
    SourceMissing(PathBuf),
    #[error("{}: {source}", path.display())]
    Page {
        path: PathBuf,
        #[source]
        source: InstallError,
    },
}

/// One indexed figure, as reported and written to `figures.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FigureSummary {
    /// 1-based position on the page.
    pub number: usize,
    pub id: String,
    pub text: String,
    pub src: Option<String>,
    pub alt: Option<String>,
    pub size: Option<Dimensions>,
    pub orientation: Option<Orientation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageReport {
    /// Path relative to the source directory, `/`-separated.
    pub path: String,
    pub figures: Vec<FigureSummary>,
    pub sidebar: bool,
    pub reveal_targets: usize,
    pub progress: bool,
}

impl PageReport {
    pub fn figure_count(&self) -> usize {
        self.figures.len()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub pages: Vec<PageReport>,
    pub assets_copied: usize,
}

impl BuildReport {
    pub fn figure_count(&self) -> usize {
        self.pages.iter().map(PageReport::figure_count).sum()
    }
}

/// A page after enhancement.
#[derive(Debug)]
pub struct EnhancedPage {
    pub html: String,
    pub report: PageReport,
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolve an `<img src>` to a file under `root`.
///
/// Remote, protocol-relative and `data:` URLs resolve to nothing. Absolute
/// paths are taken relative to the book root, others relative to the page's
/// directory. Query strings and fragments are dropped.
pub fn resolve_image_path(src: &str, page_dir: &Path, root: &Path) -> Option<PathBuf> {
    let src = src.trim();
    if src.is_empty() || src.starts_with("//") || src.starts_with("data:") || src.contains("://")
    {
        return None;
    }
    let path = src.split(['?', '#']).next().unwrap_or_default();
    if path.is_empty() {
        return None;
    }
    Some(match path.strip_prefix('/') {
        Some(absolute) => root.join(absolute),
        None => page_dir.join(path),
    })
}

/// Record natural sizes for every local image the probe can read.
fn probe_images(doc: &mut Document, page_dir: &Path, root: &Path, probe: &dyn DimensionProbe) {
    for image in doc.query_all(doc.root(), &IMG) {
        let Some(path) = doc
            .attr(image, "src")
            .and_then(|src| resolve_image_path(src, page_dir, root))
        else {
            continue;
        };
        match probe.dimensions(&path) {
            Ok(size) => doc.set_natural_size(image, size),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read image size");
                doc.mark_complete(image);
            }
        }
    }
}

fn report_for(page: &Page, path: String) -> PageReport {
    let doc = page.document();
    let figures = page
        .viewer()
        .map(|viewer| {
            viewer
                .index()
                .iter()
                .map(|entry| FigureSummary {
                    number: entry.number(),
                    id: entry.caption.id.clone(),
                    text: entry.caption.text.clone(),
                    src: doc.attr(entry.image, "src").map(str::to_string),
                    alt: doc.attr(entry.image, "alt").map(str::to_string),
                    size: doc.image_state(entry.image).and_then(|s| s.natural_size),
                    orientation: entry.orientation,
                })
                .collect()
        })
        .unwrap_or_default();
    PageReport {
        path,
        figures,
        sidebar: page.sidebar().is_some(),
        reveal_targets: page.reveal().map_or(0, |r| r.targets().len()),
        progress: page.progress().is_some(),
    }
}

/// Enhance one page's markup. `page_dir` and `root` locate its images.
pub fn enhance_page(
    source: &str,
    name: String,
    page_dir: &Path,
    root: &Path,
    config: &Config,
    probe: &dyn DimensionProbe,
) -> Result<EnhancedPage, InstallError> {
    let mut doc = html::parse(source)?;
    probe_images(&mut doc, page_dir, root, probe);
    let page = Page::install(doc, config)?;
    let report = report_for(&page, name);
    Ok(EnhancedPage {
        html: html::serialize(page.document()),
        report,
    })
}

/// Enhance a single page file in memory and report its figures.
pub fn scan_page(
    path: &Path,
    config: &Config,
    probe: &dyn DimensionProbe,
) -> Result<PageReport, BuildError> {
    let source = fs::read_to_string(path)?;
    let dir = path.parent().unwrap_or(Path::new("."));
    let name = path.display().to_string();
    enhance_page(&source, name, dir, dir, config, probe)
        .map(|page| page.report)
        .map_err(|source| BuildError::Page {
            path: path.to_path_buf(),
            source,
        })
}

/// Source files of a book, split into pages and assets, in path order.
struct SourceFiles {
    pages: Vec<PathBuf>,
    assets: Vec<PathBuf>,
}

fn collect_sources(root: &Path, exclude: Option<&Path>) -> Result<SourceFiles, BuildError> {
    if !root.is_dir() {
        return Err(BuildError::SourceMissing(root.to_path_buf()));
    }
    let mut files = SourceFiles {
        pages: Vec::new(),
        assets: Vec::new(),
    };
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let hidden = entry.depth() > 0 && is_hidden(&entry.file_name().to_string_lossy());
            let excluded = exclude.is_some_and(|dir| entry.path() == dir);
            !hidden && !excluded
        });
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if path.parent() == Some(root) && path.file_name().is_some_and(|n| n == CONFIG_FILE) {
            continue;
        }
        if is_html(&path) {
            files.pages.push(path);
        } else {
            files.assets.push(path);
        }
    }
    Ok(files)
}

fn enhance_file(
    path: &Path,
    root: &Path,
    config: &Config,
    probe: &dyn DimensionProbe,
) -> Result<EnhancedPage, BuildError> {
    let source = fs::read_to_string(path)?;
    let dir = path.parent().unwrap_or(root);
    enhance_page(&source, relative_name(root, path), dir, root, config, probe).map_err(|source| {
        BuildError::Page {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Enhance every page without writing anything.
pub fn check(
    source: &Path,
    config: &Config,
    probe: &dyn DimensionProbe,
) -> Result<Vec<PageReport>, BuildError> {
    let files = collect_sources(source, None)?;
    files
        .pages
        .par_iter()
        .map(|path| enhance_file(path, source, config, probe).map(|page| page.report))
        .collect()
}

/// Enhance every page into `output`, copy assets and write `figures.json`.
pub fn build(
    source: &Path,
    output: &Path,
    config: &Config,
    probe: &dyn DimensionProbe,
) -> Result<BuildReport, BuildError> {
    let files = collect_sources(source, Some(output))?;
    fs::create_dir_all(output)?;

    let pages = files
        .pages
        .par_iter()
        .map(|path| {
            let page = enhance_file(path, source, config, probe)?;
            let dest = output.join(&page.report.path);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&dest, &page.html)?;
            info!(
                page = %page.report.path,
                figures = page.report.figure_count(),
                "enhanced page"
            );
            Ok(page.report)
        })
        .collect::<Result<Vec<_>, BuildError>>()?;

    for path in &files.assets {
        let dest = output.join(relative_name(source, path));
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(path, &dest)?;
        debug!(asset = %dest.display(), "copied");
    }

    let json = serde_json::to_string_pretty(&pages)?;
    fs::write(output.join(FIGURES_JSON), json)?;

    Ok(BuildReport {
        pages,
        assets_copied: files.assets.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ImageCrateProbe;
    use crate::probe::tests::MockProbe;
    use crate::test_helpers::{BOOK_PAGE, THREE_FIGURES, setup_book};
    use tempfile::TempDir;

    #[test]
    fn resolves_local_image_paths() {
        let root = Path::new("/book");
        let dir = Path::new("/book/chapters");
        assert_eq!(
            resolve_image_path("img/a.png?v=2#top", dir, root),
            Some(PathBuf::from("/book/chapters/img/a.png"))
        );
        assert_eq!(
            resolve_image_path("/shared/b.png", dir, root),
            Some(PathBuf::from("/book/shared/b.png"))
        );
        for remote in [
            "https://x.org/a.png",
            "//cdn/a.png",
            "data:image/png;base64,AA",
            "",
            "#x",
        ] {
            assert_eq!(resolve_image_path(remote, dir, root), None, "{remote}");
        }
    }

    #[test]
    fn probed_sizes_become_orientation_classes() {
        let probe = MockProbe::with_sizes(&[
            ("a.png", 1000, 400),
            ("b.png", 1000, 900),
            ("c.png", 400, 1000),
        ]);
        let page = enhance_page(
            THREE_FIGURES,
            "p.html".into(),
            Path::new("/book"),
            Path::new("/book"),
            &Config::default(),
            &probe,
        )
        .unwrap();
        let orientations: Vec<_> = page.report.figures.iter().map(|f| f.orientation).collect();
        assert_eq!(
            orientations,
            vec![
                Some(Orientation::UltraWide),
                Some(Orientation::Landscape),
                Some(Orientation::Portrait)
            ]
        );
        assert!(page.html.contains(r#"class="figure is-ultra-wide is-landscape reveal""#));
        assert_eq!(probe.probed()[0], PathBuf::from("/book/figures/a.png"));
    }

    #[test]
    fn caption_entities_are_decoded_once() {
        let source = r#"<html><body><figure class="figure"><img src="a.png"><figcaption>Figure 4: Scan to &theta; &mdash; R&D</figcaption></figure></body></html>"#;
        let page = enhance_page(
            source,
            "p.html".into(),
            Path::new("/book"),
            Path::new("/book"),
            &Config::default(),
            &MockProbe::default(),
        )
        .unwrap();
        let figure = &page.report.figures[0];
        assert_eq!(figure.id, "Figure 4:");
        assert_eq!(figure.text, "Scan to \u{3b8} \u{2014} R&D");
        let caption = "<figcaption>Figure 4: Scan to &theta; &mdash; R&D</figcaption>";
        assert!(page.html.contains(caption));
        assert!(!page.html.contains("&amp;theta;"));
        assert!(!page.html.contains("&amp;mdash;"));
    }

    #[test]
    fn unreadable_images_leave_figures_unclassified() {
        let probe = MockProbe::default();
        let page = enhance_page(
            THREE_FIGURES,
            "p.html".into(),
            Path::new("/book"),
            Path::new("/book"),
            &Config::default(),
            &probe,
        )
        .unwrap();
        assert_eq!(page.report.figure_count(), 3);
        assert!(page.report.figures.iter().all(|f| f.orientation.is_none()));
        assert_eq!(page.report.figures[1].id, "Figure 2:");
    }

    #[test]
    fn enhanced_markup_survives_a_reparse() {
        let page = enhance_page(
            BOOK_PAGE,
            "ch.html".into(),
            Path::new("/book"),
            Path::new("/book"),
            &Config::default(),
            &MockProbe::default(),
        )
        .unwrap();
        assert!(page.html.starts_with("<!DOCTYPE html>"));
        assert!(page.html.contains("window.innerWidth < 860 && 1 > 0"));
        assert!(page.html.contains(r#"<span class="figure-meta">Figure 1 of 2</span>"#));
        let reparsed = html::parse(&page.html).unwrap();
        let lightbox = Selector::parse(".figure-lightbox").unwrap();
        let lightboxes = reparsed.query_all(reparsed.root(), &lightbox);
        assert_eq!(lightboxes.len(), 1);
    }

    #[test]
    fn build_writes_pages_assets_and_index() {
        let book = setup_book();
        let out = TempDir::new().unwrap();
        let report = build(book.path(), out.path(), &Config::default(), &ImageCrateProbe).unwrap();

        let paths: Vec<_> = report.pages.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["chapters/ch02.html", "index.html"]);
        assert_eq!(report.figure_count(), 2);
        assert_eq!(report.assets_copied, 3);

        assert!(out.path().join("assets/book.css").exists());
        assert!(out.path().join("chapters/img/steer.png").exists());
        assert!(!out.path().join(".DS_Store").exists());

        let json = fs::read_to_string(out.path().join(FIGURES_JSON)).unwrap();
        let index: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(index[0]["figures"][0]["orientation"], "ultra-wide");
        assert_eq!(index[0]["figures"][1]["orientation"], "portrait");
        assert_eq!(index[1]["figures"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn config_file_is_not_copied() {
        let book = setup_book();
        fs::write(book.path().join(CONFIG_FILE), "[sidebar]\nbreakpoint = 900.0\n").unwrap();
        let out = TempDir::new().unwrap();
        build(book.path(), out.path(), &Config::default(), &ImageCrateProbe).unwrap();
        assert!(!out.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn output_inside_source_is_not_walked() {
        let book = setup_book();
        let out = book.path().join("dist");
        build(book.path(), &out, &Config::default(), &ImageCrateProbe).unwrap();
        let second = build(book.path(), &out, &Config::default(), &ImageCrateProbe).unwrap();
        assert_eq!(second.pages.len(), 2);
    }

    #[test]
    fn check_reports_without_writing() {
        let book = setup_book();
        let reports = check(book.path(), &Config::default(), &ImageCrateProbe).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].sidebar);
        assert!(reports[0].progress);
        assert!(!book.path().join(FIGURES_JSON).exists());
    }

    #[test]
    fn missing_source_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err =
            check(&tmp.path().join("nope"), &Config::default(), &ImageCrateProbe).unwrap_err();
        assert!(matches!(err, BuildError::SourceMissing(_)));
    }
}
