//! Figure discovery, indexing and in-page augmentation.
//!
//! [`discover`] is a pure read pass: it decides what counts as a figure and
//! pairs each one with its image and normalized caption. [`scan`] then
//! indexes the discovered figures and writes the affordances the viewer
//! needs into the page: a toolbar with a meta label and an expand button,
//! keyboard/ARIA attributes on the image, and `data-figure-*` attributes.

use super::caption::{self, Caption, CaptionMarkup};
use super::orientation::{self, Orientation};
use crate::config::OrientationConfig;
use crate::dom::{Document, NodeId};
use crate::selector::Selector;
use once_cell::sync::Lazy;
use tracing::debug;

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("img selector"));
static CAPTION_ID: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".caption .id").expect("caption id selector"));
static CAPTION_CONTENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".caption .content").expect("caption content selector"));
static FIGCAPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse("figcaption").expect("figcaption selector"));

pub const INDEX_ATTR: &str = "data-figure-index";
pub const TOTAL_ATTR: &str = "data-figure-total";

/// A figure element paired with its image, before augmentation.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredFigure {
    pub figure: NodeId,
    pub image: NodeId,
    pub caption: Caption,
}

/// One indexed figure.
#[derive(Debug, Clone, PartialEq)]
pub struct FigureEntry {
    pub figure: NodeId,
    pub image: NodeId,
    /// Normalized caption; `id` always set after indexing.
    pub caption: Caption,
    /// 0-based position among all figures on the page.
    pub index: usize,
    pub toolbar_meta: NodeId,
    pub expand_button: NodeId,
    /// Known once the image has loaded with usable dimensions.
    pub orientation: Option<Orientation>,
}

impl FigureEntry {
    /// 1-based figure number as shown to readers.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// All figures of a page, in document order. The count is fixed once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FigureIndex {
    entries: Vec<FigureEntry>,
}

impl FigureIndex {
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FigureEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FigureEntry> {
        self.entries.iter()
    }

    /// Re-run orientation classification for one entry, e.g. after its image
    /// finished loading.
    pub fn classify(
        &mut self,
        doc: &mut Document,
        index: usize,
        thresholds: &OrientationConfig,
    ) -> Option<Orientation> {
        let entry = self.entries.get_mut(index)?;
        let orientation = orientation::apply(doc, entry.figure, entry.image, thresholds)?;
        entry.orientation = Some(orientation);
        Some(orientation)
    }
}

/// Extract raw caption text from a figure's markup.
pub fn caption_markup(doc: &Document, figure: NodeId) -> CaptionMarkup {
    let text = |selector: &Selector| doc.query(figure, selector).map(|n| doc.text_content(n));
    CaptionMarkup {
        id: text(&CAPTION_ID),
        content: text(&CAPTION_CONTENT),
        figcaption: text(&FIGCAPTION),
    }
}

/// Find every element matching `figure_selector` that contains an image.
///
/// Figures without an image are skipped.
pub fn discover(doc: &Document, figure_selector: &Selector) -> Vec<DiscoveredFigure> {
    doc.query_all(doc.root(), figure_selector)
        .into_iter()
        .filter_map(|figure| {
            let image = doc.query(figure, &IMG)?;
            Some(DiscoveredFigure {
                figure,
                image,
                caption: caption::normalize(&caption_markup(doc, figure)),
            })
        })
        .collect()
}

/// Discover, augment and index all figures of the page.
///
/// Images that already finished loading are classified right away; the rest
/// are classified by [`FigureIndex::classify`] when their load event fires.
pub fn scan(
    doc: &mut Document,
    figure_selector: &Selector,
    thresholds: &OrientationConfig,
) -> FigureIndex {
    let discovered = discover(doc, figure_selector);
    let total = discovered.len();

    let entries: Vec<FigureEntry> = discovered
        .into_iter()
        .enumerate()
        .map(|(index, found)| {
            let orientation = match doc.image_state(found.image) {
                Some(state) if state.complete => {
                    orientation::apply(doc, found.figure, found.image, thresholds)
                }
                _ => None,
            };
            let (toolbar_meta, expand_button) = add_toolbar(doc, found.figure);
            make_image_interactive(doc, found.image);

            let mut entry = FigureEntry {
                figure: found.figure,
                image: found.image,
                caption: found.caption,
                index,
                toolbar_meta,
                expand_button,
                orientation,
            };
            write_index(doc, &mut entry, total);
            entry
        })
        .collect();

    debug!(figures = total, "indexed figures");
    FigureIndex { entries }
}

fn add_toolbar(doc: &mut Document, figure: NodeId) -> (NodeId, NodeId) {
    let toolbar = doc.create_element("div");
    doc.add_class(toolbar, "figure-toolbar");

    let meta = doc.create_element("span");
    doc.add_class(meta, "figure-meta");
    doc.append_child(toolbar, meta);

    let expand = doc.create_element("button");
    doc.add_class(expand, "figure-expand-btn");
    doc.set_attr(expand, "type", "button");
    doc.set_text_content(expand, "Expand");
    doc.append_child(toolbar, expand);

    match doc.query(figure, &FIGCAPTION) {
        Some(figcaption) if doc.parent(figcaption) == Some(figure) => {
            doc.insert_before(figure, toolbar, figcaption)
        }
        _ => doc.append_child(figure, toolbar),
    }
    (meta, expand)
}

fn make_image_interactive(doc: &mut Document, image: NodeId) {
    let alt = doc
        .attr(image, "alt")
        .filter(|alt| !alt.is_empty())
        .unwrap_or("Figure image")
        .to_string();
    doc.set_attr(image, "tabindex", "0");
    doc.set_attr(image, "role", "button");
    doc.set_attr(image, "aria-label", format!("Open full-size figure: {alt}"));
}

fn write_index(doc: &mut Document, entry: &mut FigureEntry, total: usize) {
    let number = entry.number();
    if entry.caption.id.is_empty() {
        entry.caption.id = caption::fallback_id(number);
    }
    for node in [entry.figure, entry.image] {
        doc.set_attr(node, INDEX_ATTR, number.to_string());
        doc.set_attr(node, TOTAL_ATTR, total.to_string());
    }
    doc.set_text_content(entry.toolbar_meta, &format!("Figure {number} of {total}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Dimensions;
    use crate::html;
    use crate::test_helpers::{THREE_FIGURES, figure_selector};

    fn scan_page(source: &str) -> (Document, FigureIndex) {
        let mut doc = html::parse(source).unwrap();
        let index = scan(&mut doc, &figure_selector(), &OrientationConfig::default());
        (doc, index)
    }

    #[test]
    fn indexes_figures_in_document_order() {
        let (doc, index) = scan_page(THREE_FIGURES);
        assert_eq!(index.total(), 3);
        let numbers: Vec<_> = index
            .iter()
            .map(|e| doc.attr(e.figure, INDEX_ATTR).unwrap().to_string())
            .collect();
        assert_eq!(numbers, vec!["1", "2", "3"]);
        for entry in index.iter() {
            assert_eq!(doc.attr(entry.figure, TOTAL_ATTR), Some("3"));
            assert_eq!(doc.attr(entry.image, INDEX_ATTR), doc.attr(entry.figure, INDEX_ATTR));
        }
    }

    #[test]
    fn uncaptioned_figure_gets_fallback_id() {
        let (_, index) = scan_page(THREE_FIGURES);
        let first = index.get(0).unwrap();
        assert_eq!(first.caption.id, "Figure 1.1:");
        assert_eq!(first.caption.text, "Uniform linear array");

        let second = index.get(1).unwrap();
        assert_eq!(second.caption.id, "Figure 2:");
        assert_eq!(second.caption.text, "");
    }

    #[test]
    fn figure_without_image_is_skipped() {
        let (doc, index) = scan_page(
            r#"<body>
            <figure class="figure"><figcaption>Figure 1: text only</figcaption></figure>
            <figure class="figure"><img src="b.png"><figcaption>Figure 9: real</figcaption></figure>
            </body>"#,
        );
        assert_eq!(index.total(), 1);
        let entry = index.get(0).unwrap();
        assert_eq!(entry.index, 0);
        assert_eq!(doc.attr(entry.figure, INDEX_ATTR), Some("1"));
        assert_eq!(entry.caption.id, "Figure 9:");
    }

    #[test]
    fn toolbar_goes_before_figcaption() {
        let (doc, index) = scan_page(THREE_FIGURES);
        let entry = index.get(0).unwrap();
        let tags: Vec<_> = doc
            .children(entry.figure)
            .iter()
            .filter_map(|&c| doc.tag(c).map(|t| (t, doc.has_class(c, "figure-toolbar"))))
            .collect();
        assert_eq!(
            tags,
            vec![("img", false), ("div", true), ("figcaption", false)]
        );
        assert_eq!(doc.text_content(entry.toolbar_meta), "Figure 1 of 3");
        assert_eq!(doc.text_content(entry.expand_button), "Expand");
    }

    #[test]
    fn toolbar_appended_without_direct_figcaption() {
        let (doc, index) = scan_page(THREE_FIGURES);
        let entry = index.get(1).unwrap();
        let last = *doc.children(entry.figure).last().unwrap();
        assert!(doc.has_class(last, "figure-toolbar"));
    }

    #[test]
    fn images_become_keyboard_buttons() {
        let (doc, index) = scan_page(THREE_FIGURES);
        let with_alt = index.get(0).unwrap().image;
        assert_eq!(doc.attr(with_alt, "tabindex"), Some("0"));
        assert_eq!(doc.attr(with_alt, "role"), Some("button"));
        assert_eq!(
            doc.attr(with_alt, "aria-label"),
            Some("Open full-size figure: Array geometry")
        );
        let without_alt = index.get(1).unwrap().image;
        assert_eq!(
            doc.attr(without_alt, "aria-label"),
            Some("Open full-size figure: Figure image")
        );
    }

    #[test]
    fn complete_images_are_classified_during_scan() {
        let mut doc = html::parse(THREE_FIGURES).unwrap();
        let images = doc.query_all(doc.root(), &IMG);
        doc.set_natural_size(images[0], Dimensions { width: 1000, height: 400 });
        let index = scan(&mut doc, &figure_selector(), &OrientationConfig::default());
        let first = index.get(0).unwrap();
        assert_eq!(first.orientation, Some(Orientation::UltraWide));
        assert!(doc.has_class(first.figure, "is-ultra-wide"));
        assert_eq!(index.get(1).unwrap().orientation, None);
    }

    #[test]
    fn classify_after_load_updates_entry() {
        let (mut doc, mut index) = scan_page(THREE_FIGURES);
        let image = index.get(2).unwrap().image;
        doc.set_natural_size(image, Dimensions { width: 400, height: 1000 });
        let got = index.classify(&mut doc, 2, &OrientationConfig::default());
        assert_eq!(got, Some(Orientation::Portrait));
        assert_eq!(index.get(2).unwrap().orientation, Some(Orientation::Portrait));
        assert!(index.classify(&mut doc, 7, &OrientationConfig::default()).is_none());
    }

    #[test]
    fn caption_depends_only_on_own_markup() {
        let (_, index) = scan_page(THREE_FIGURES);
        let (_, reversed) = scan_page(
            r#"<body>
            <figure class="figure"><img src="c.png"><div class="caption"><span class="id">Figure 1.3</span><span class="content">Grating lobes</span></div></figure>
            </body>"#,
        );
        assert_eq!(index.get(2).unwrap().caption, reversed.get(0).unwrap().caption);
    }
}
