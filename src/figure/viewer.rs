//! The figure viewer: one shared overlay showing a single figure at a time.
//!
//! [`FigureViewer::install`] scans the page, appends the overlay to `body`
//! and returns the subscriptions the page runtime must register. After that,
//! every input reaches the viewer as a [`ViewerAction`] through
//! [`FigureViewer::handle`]; the transitions themselves ([`open`], [`navigate`],
//! [`close`]) are plain methods and can be driven directly.
//!
//! ```text
//!            open(i), 0 <= i < total
//!   Closed ─────────────────────────▶ Open(i)
//!      ▲                                │ navigate(±1) within bounds
//!      └──────────── close() ───────────┘
//! ```
//!
//! [`open`]: FigureViewer::open
//! [`navigate`]: FigureViewer::navigate
//! [`close`]: FigureViewer::close

use super::markup::{self, BODY_OPEN_CLASS, OPEN_CLASS, ROOT_CLASS};
use super::scanner::{self, FigureIndex, INDEX_ATTR, TOTAL_ATTR};
use crate::config::{FiguresConfig, OrientationConfig};
use crate::dom::{Document, NodeId};
use crate::events::{Dispatch, EventKind, EventTarget, Key, KeyEvent, Subscription, UiEvent};
use crate::html;
use crate::page::InstallError;
use crate::selector::Selector;
use once_cell::sync::Lazy;
use tracing::debug;

static FOCUSABLE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"button:not([disabled]), [href], [tabindex]:not([tabindex="-1"])"#)
        .expect("focusable selector")
});

/// What a viewer listener was registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerAction {
    /// Document-level keyboard handling while open.
    KeyDown,
    /// Backdrop or close button.
    Close,
    Previous,
    Next,
    /// Touch on the stage.
    TouchStart,
    TouchEnd,
    /// Click on a figure's image or expand button.
    OpenFigure(usize),
    /// Key pressed while a figure's image has focus.
    FigureKey(usize),
    /// A figure's image finished loading.
    ImageLoaded(usize),
}

/// Overlay elements the viewer writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerElements {
    pub root: NodeId,
    pub backdrop: NodeId,
    pub surface: NodeId,
    pub counter: NodeId,
    pub prev: NodeId,
    pub next: NodeId,
    pub close: NodeId,
    pub stage: NodeId,
    pub image: NodeId,
    pub caption_id: NodeId,
    pub caption_text: NodeId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewerState {
    pub is_open: bool,
    /// Meaningful only while open.
    pub active_index: usize,
    /// Element focused before opening; restored on close.
    pub last_focused: Option<NodeId>,
    /// Set between a stage `touchstart` and the next `touchend`.
    pub touch_start_x: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct FigureViewer {
    index: FigureIndex,
    elements: ViewerElements,
    state: ViewerState,
    swipe_threshold: f64,
    orientation: OrientationConfig,
}

impl FigureViewer {
    /// Index the page's figures and append the overlay.
    ///
    /// Returns `Ok(None)` when the page has no figure with an image: such a
    /// page gets no overlay and no listeners.
    pub fn install(
        doc: &mut Document,
        config: &FiguresConfig,
    ) -> Result<Option<(Self, Vec<Subscription<ViewerAction>>)>, InstallError> {
        let selector = config.selector()?;
        if scanner::discover(doc, &selector).is_empty() {
            debug!(selector = %selector, "no figures, viewer not installed");
            return Ok(None);
        }
        let body = doc.body().ok_or(InstallError::MissingBody)?;

        let index = scanner::scan(doc, &selector, &config.orientation);
        let elements = append_overlay(doc, body)?;
        let viewer = FigureViewer {
            index,
            elements,
            state: ViewerState::default(),
            swipe_threshold: config.swipe_threshold,
            orientation: config.orientation,
        };
        let subscriptions = viewer.subscriptions(doc);
        debug!(
            figures = viewer.index.total(),
            listeners = subscriptions.len(),
            "viewer installed"
        );
        Ok(Some((viewer, subscriptions)))
    }

    fn subscriptions(&self, doc: &Document) -> Vec<Subscription<ViewerAction>> {
        use EventKind::*;
        let node = EventTarget::Node;
        let el = &self.elements;

        let mut subs = vec![
            Subscription::new(EventTarget::Document, KeyDown, ViewerAction::KeyDown),
            Subscription::new(node(el.backdrop), Click, ViewerAction::Close),
            Subscription::new(node(el.close), Click, ViewerAction::Close),
            Subscription::new(node(el.prev), Click, ViewerAction::Previous),
            Subscription::new(node(el.next), Click, ViewerAction::Next),
            Subscription::new(node(el.stage), TouchStart, ViewerAction::TouchStart),
            Subscription::new(node(el.stage), TouchEnd, ViewerAction::TouchEnd),
        ];
        for entry in self.index.iter() {
            let i = entry.index;
            let pending = doc.image_state(entry.image).is_some_and(|s| !s.complete);
            if pending {
                subs.push(Subscription::once(
                    node(entry.image),
                    Load,
                    ViewerAction::ImageLoaded(i),
                ));
            }
            subs.push(Subscription::new(node(entry.image), Click, ViewerAction::OpenFigure(i)));
            subs.push(Subscription::new(node(entry.image), KeyDown, ViewerAction::FigureKey(i)));
            subs.push(Subscription::new(
                node(entry.expand_button),
                Click,
                ViewerAction::OpenFigure(i),
            ));
        }
        subs
    }

    pub fn index(&self) -> &FigureIndex {
        &self.index
    }

    pub fn elements(&self) -> &ViewerElements {
        &self.elements
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open
    }

    /// Active figure, `None` while closed.
    pub fn active_index(&self) -> Option<usize> {
        self.state.is_open.then_some(self.state.active_index)
    }

    /// Show figure `index`. Out-of-range indices are ignored.
    pub fn open(&mut self, doc: &mut Document, index: usize) -> bool {
        if index >= self.index.total() {
            debug!(index, total = self.index.total(), "open ignored, out of range");
            return false;
        }
        self.state.active_index = index;
        self.render(doc, index);

        if !self.state.is_open {
            self.state.last_focused = doc.active_element();
        }
        self.state.is_open = true;

        doc.add_class(self.elements.root, OPEN_CLASS);
        doc.set_attr(self.elements.root, "aria-hidden", "false");
        if let Some(body) = doc.body() {
            doc.add_class(body, BODY_OPEN_CLASS);
        }
        doc.focus(self.elements.surface);
        debug!(figure = index + 1, "viewer opened");
        true
    }

    /// Move by `delta` figures. No-op while closed or when the target is out
    /// of range.
    pub fn navigate(&mut self, doc: &mut Document, delta: isize) -> bool {
        if !self.state.is_open {
            return false;
        }
        let Some(target) = self.state.active_index.checked_add_signed(delta) else {
            return false;
        };
        if target >= self.index.total() {
            return false;
        }
        self.state.active_index = target;
        self.render(doc, target);
        debug!(figure = target + 1, "viewer navigated");
        true
    }

    pub fn close(&mut self, doc: &mut Document) -> bool {
        if !self.state.is_open {
            return false;
        }
        self.state.is_open = false;

        doc.remove_class(self.elements.root, OPEN_CLASS);
        doc.set_attr(self.elements.root, "aria-hidden", "true");
        if let Some(body) = doc.body() {
            doc.remove_class(body, BODY_OPEN_CLASS);
        }
        doc.remove_attr(self.elements.image, "src");

        if let Some(previous) = self.state.last_focused.take() {
            doc.focus(previous);
        }
        debug!("viewer closed");
        true
    }

    fn render(&self, doc: &mut Document, index: usize) {
        let Some(entry) = self.index.get(index) else {
            return;
        };
        let number = index + 1;
        let total = self.index.total();
        let el = self.elements;

        match doc.attr(entry.image, "src").map(str::to_string) {
            Some(src) => doc.set_attr(el.image, "src", src),
            None => doc.remove_attr(el.image, "src"),
        }
        let alt = doc
            .attr(entry.image, "alt")
            .filter(|alt| !alt.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Figure {number}"));
        doc.set_attr(el.image, "alt", alt);

        let caption_id = if entry.caption.id.is_empty() {
            super::caption::fallback_id(number)
        } else {
            entry.caption.id.clone()
        };
        doc.set_text_content(el.caption_id, &caption_id);
        doc.set_text_content(el.caption_text, &entry.caption.text);
        doc.set_text_content(el.counter, &format!("{number} / {total}"));

        doc.set_disabled(el.prev, index == 0);
        doc.set_disabled(el.next, number >= total);

        doc.set_attr(el.root, INDEX_ATTR, number.to_string());
        doc.set_attr(el.root, TOTAL_ATTR, total.to_string());
    }

    /// Controls inside the surface that take part in the focus trap.
    pub fn focusable_controls(&self, doc: &Document) -> Vec<NodeId> {
        doc.query_all(self.elements.surface, &FOCUSABLE)
    }

    /// Keep `Tab` focus cycling inside the surface.
    fn trap_focus(&self, doc: &mut Document, key: &KeyEvent, dispatch: &mut Dispatch) {
        if key.key != Key::Tab || !self.state.is_open {
            return;
        }
        let controls = self.focusable_controls(doc);
        let (Some(&first), Some(&last)) = (controls.first(), controls.last()) else {
            dispatch.prevent_default();
            return;
        };
        let active = doc.active_element();
        if key.shift && active == Some(first) {
            dispatch.prevent_default();
            doc.focus(last);
        } else if !key.shift && active == Some(last) {
            dispatch.prevent_default();
            doc.focus(first);
        }
    }

    fn on_key_down(&mut self, doc: &mut Document, key: &KeyEvent, dispatch: &mut Dispatch) {
        if !self.state.is_open {
            return;
        }
        match key.key {
            Key::Escape => {
                dispatch.prevent_default();
                self.close(doc);
            }
            Key::ArrowLeft => {
                dispatch.prevent_default();
                self.navigate(doc, -1);
            }
            Key::ArrowRight => {
                dispatch.prevent_default();
                self.navigate(doc, 1);
            }
            _ => self.trap_focus(doc, key, dispatch),
        }
    }

    fn on_touch_end(&mut self, doc: &mut Document, end_x: f64) {
        let Some(start_x) = self.state.touch_start_x.take() else {
            return;
        };
        let delta = end_x - start_x;
        if delta.abs() < self.swipe_threshold {
            return;
        }
        if delta > 0.0 {
            self.navigate(doc, -1);
        } else {
            self.navigate(doc, 1);
        }
    }

    /// React to one dispatched event.
    pub fn handle(
        &mut self,
        doc: &mut Document,
        action: ViewerAction,
        event: &UiEvent,
        dispatch: &mut Dispatch,
    ) {
        match (action, event) {
            (ViewerAction::KeyDown, UiEvent::KeyDown(key)) => self.on_key_down(doc, key, dispatch),
            (ViewerAction::Close, _) => {
                self.close(doc);
            }
            (ViewerAction::Previous, _) => {
                self.navigate(doc, -1);
            }
            (ViewerAction::Next, _) => {
                self.navigate(doc, 1);
            }
            (ViewerAction::TouchStart, UiEvent::TouchStart { client_x: Some(x) }) => {
                self.state.touch_start_x = Some(*x);
            }
            (ViewerAction::TouchEnd, UiEvent::TouchEnd { client_x: Some(x) }) => {
                self.on_touch_end(doc, *x);
            }
            (ViewerAction::OpenFigure(i), _) => {
                dispatch.prevent_default();
                self.open(doc, i);
            }
            (ViewerAction::FigureKey(i), UiEvent::KeyDown(key))
                if matches!(key.key, Key::Enter | Key::Space) =>
            {
                dispatch.prevent_default();
                self.open(doc, i);
            }
            (ViewerAction::ImageLoaded(i), _) => {
                if let Some(orientation) = self.index.classify(doc, i, &self.orientation) {
                    debug!(figure = i + 1, orientation = orientation.label(), "classified on load");
                }
            }
            _ => {}
        }
    }
}

fn append_overlay(doc: &mut Document, body: NodeId) -> Result<ViewerElements, InstallError> {
    let root = doc.create_element("div");
    doc.add_class(root, ROOT_CLASS);
    doc.set_attr(root, "aria-hidden", "true");
    html::parse_into(doc, root, &markup::viewer_markup().into_string())?;
    doc.append_child(body, root);

    Ok(ViewerElements {
        root,
        backdrop: find(doc, root, ".figure-lightbox__backdrop")?,
        surface: find(doc, root, ".figure-lightbox__surface")?,
        counter: find(doc, root, ".figure-lightbox__counter")?,
        prev: find(doc, root, r#"[data-action="prev"]"#)?,
        next: find(doc, root, r#"[data-action="next"]"#)?,
        close: find(doc, root, r#".figure-lightbox__btn[data-action="close"]"#)?,
        stage: find(doc, root, ".figure-lightbox__stage")?,
        image: find(doc, root, ".figure-lightbox__image")?,
        caption_id: find(doc, root, ".figure-lightbox__caption-id")?,
        caption_text: find(doc, root, ".figure-lightbox__caption-text")?,
    })
}

fn find(doc: &Document, root: NodeId, source: &'static str) -> Result<NodeId, InstallError> {
    let selector = Selector::parse(source).map_err(|_| InstallError::MissingElement(source))?;
    doc.query(root, &selector)
        .ok_or(InstallError::MissingElement(source))
}
