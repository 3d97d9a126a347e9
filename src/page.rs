//! Page runtime: one document plus the widgets installed on it.
//!
//! [`Page::install`] constructs every widget explicitly, in a fixed order
//! (viewer, sidebar, scroll reveal, reading progress), and registers their
//! subscriptions in a single listener table. Input then enters through the
//! methods below, which update the document's state where a browser would
//! (focus target, viewport, image load state) and dispatch the event:
//!
//! ```text
//! click / key_down / touch_*     ─┐
//! image_loaded / scroll_to / resize ─┼─▶ dispatch ─▶ listeners ─▶ widget.handle
//!                                 │                               │
//! run_animation_frame ◀── frame queue ◀───── frame requests ─────┘
//! ```
//!
//! Dispatch is run-to-completion and single-threaded. Frame callbacks only
//! run from [`Page::run_animation_frame`]; anything they request lands in the
//! next frame.

use crate::config::{Config, ConfigError};
use crate::dom::{Dimensions, Document, NodeId};
use crate::events::{Dispatch, EventTarget, KeyEvent, Listeners, UiEvent, propagation_path};
use crate::figure::{FigureViewer, ViewerAction};
use crate::html::{self, HtmlError};
use crate::progress::{ProgressAction, ReadingProgress};
use crate::reveal::{RevealAction, ScrollReveal};
use crate::sidebar::{SidebarAction, SidebarToggle};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("HTML error: {0}")]
    Html(#[from] HtmlError),
    #[error("document has no <body> to attach widgets to")]
    MissingBody,
    #[error("viewer markup has no element matching {0}")]
    MissingElement(&'static str),
}

/// Which widget a listener belongs to, with its action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
    Viewer(ViewerAction),
    Sidebar(SidebarAction),
    Reveal(RevealAction),
    Progress(ProgressAction),
}

/// Work queued for the next animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTask {
    RevealCheck,
    ProgressUpdate,
}

#[derive(Debug)]
pub struct Page {
    doc: Document,
    listeners: Listeners<Handler>,
    viewer: Option<FigureViewer>,
    sidebar: Option<SidebarToggle>,
    reveal: Option<ScrollReveal>,
    progress: Option<ReadingProgress>,
    frames: Vec<FrameTask>,
}

impl Page {
    /// Install every widget the document has markup for.
    pub fn install(mut doc: Document, config: &Config) -> Result<Self, InstallError> {
        let mut listeners = Listeners::new();
        let mut frames = Vec::new();

        let viewer = FigureViewer::install(&mut doc, &config.figures)?.map(|(viewer, subs)| {
            listeners.extend(subs, Handler::Viewer);
            viewer
        });
        let sidebar = SidebarToggle::install(&mut doc, &config.sidebar)?.map(|(sidebar, subs)| {
            listeners.extend(subs, Handler::Sidebar);
            sidebar
        });
        let reveal = ScrollReveal::install(&mut doc, &config.reveal)?.map(|(mut reveal, subs)| {
            listeners.extend(subs, Handler::Reveal);
            if reveal.request_check() {
                frames.push(FrameTask::RevealCheck);
            }
            reveal
        });
        let progress = ReadingProgress::install(&mut doc, &config.progress).map(|(progress, subs)| {
            listeners.extend(subs, Handler::Progress);
            progress
        });

        debug!(
            viewer = viewer.is_some(),
            sidebar = sidebar.is_some(),
            reveal = reveal.is_some(),
            progress = progress.is_some(),
            listeners = listeners.len(),
            "page installed"
        );
        Ok(Page {
            doc,
            listeners,
            viewer,
            sidebar,
            reveal,
            progress,
            frames,
        })
    }

    /// Parse `source` and install the widgets on it.
    pub fn from_html(source: &str, config: &Config) -> Result<Self, InstallError> {
        Self::install(html::parse(source)?, config)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Mutable access for setting up layout or viewport state.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    pub fn viewer(&self) -> Option<&FigureViewer> {
        self.viewer.as_ref()
    }

    pub fn sidebar(&self) -> Option<&SidebarToggle> {
        self.sidebar.as_ref()
    }

    pub fn reveal(&self) -> Option<&ScrollReveal> {
        self.reveal.as_ref()
    }

    pub fn progress(&self) -> Option<&ReadingProgress> {
        self.progress.as_ref()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn pending_frames(&self) -> &[FrameTask] {
        &self.frames
    }

    /// Deliver `event` to `target` and, if it bubbles, its ancestors, the
    /// document and the window.
    pub fn dispatch(&mut self, target: EventTarget, event: UiEvent) -> Dispatch {
        let mut dispatch = Dispatch::default();
        if let (UiEvent::Click, EventTarget::Node(node)) = (&event, target)
            && self.doc.is_disabled(node)
        {
            return dispatch;
        }

        for current in propagation_path(&self.doc, target, event.bubbles()) {
            for handler in self.listeners.take_matching(current, event.kind()) {
                self.run(handler, &event, &mut dispatch);
            }
            if dispatch.propagation_stopped {
                break;
            }
        }
        dispatch
    }

    fn run(&mut self, handler: Handler, event: &UiEvent, dispatch: &mut Dispatch) {
        let frame = match handler {
            Handler::Viewer(action) => {
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.handle(&mut self.doc, action, event, dispatch);
                }
                None
            }
            Handler::Sidebar(action) => {
                if let Some(sidebar) = self.sidebar.as_ref() {
                    sidebar.handle(&mut self.doc, action, event, dispatch);
                }
                None
            }
            Handler::Reveal(action) => self
                .reveal
                .as_mut()
                .is_some_and(|reveal| reveal.handle(action))
                .then_some(FrameTask::RevealCheck),
            Handler::Progress(action) => self
                .progress
                .as_mut()
                .is_some_and(|progress| progress.handle(action))
                .then_some(FrameTask::ProgressUpdate),
        };
        self.frames.extend(frame);
    }

    pub fn click(&mut self, node: NodeId) -> Dispatch {
        self.dispatch(EventTarget::Node(node), UiEvent::Click)
    }

    /// Key press on the focused element, or on `body` when nothing has focus.
    pub fn key_down(&mut self, key: KeyEvent) -> Dispatch {
        let target = self
            .doc
            .active_element()
            .or_else(|| self.doc.body())
            .map(EventTarget::Node)
            .unwrap_or(EventTarget::Document);
        self.dispatch(target, UiEvent::KeyDown(key))
    }

    pub fn touch_start(&mut self, node: NodeId, client_x: Option<f64>) -> Dispatch {
        self.dispatch(EventTarget::Node(node), UiEvent::TouchStart { client_x })
    }

    pub fn touch_end(&mut self, node: NodeId, client_x: Option<f64>) -> Dispatch {
        self.dispatch(EventTarget::Node(node), UiEvent::TouchEnd { client_x })
    }

    /// Finish loading `image`. `None` models a broken image.
    pub fn image_loaded(&mut self, image: NodeId, size: Option<Dimensions>) -> Dispatch {
        match size {
            Some(size) => self.doc.set_natural_size(image, size),
            None => self.doc.mark_complete(image),
        }
        self.dispatch(EventTarget::Node(image), UiEvent::Load)
    }

    pub fn scroll_to(&mut self, scroll_y: f64) -> Dispatch {
        self.doc.viewport.scroll_y = scroll_y;
        self.dispatch(EventTarget::Window, UiEvent::Scroll)
    }

    pub fn resize(&mut self, width: f64, height: f64) -> Dispatch {
        self.doc.viewport.width = width;
        self.doc.viewport.height = height;
        self.dispatch(EventTarget::Window, UiEvent::Resize)
    }

    /// Run the callbacks queued so far. Returns how many ran.
    pub fn run_animation_frame(&mut self) -> usize {
        let tasks = std::mem::take(&mut self.frames);
        for task in &tasks {
            match task {
                FrameTask::RevealCheck => {
                    if let Some(reveal) = self.reveal.as_mut() {
                        reveal.run_check(&mut self.doc);
                    }
                }
                FrameTask::ProgressUpdate => {
                    if let Some(progress) = self.progress.as_mut() {
                        progress.update(&mut self.doc);
                    }
                }
            }
        }
        tasks.len()
    }
}
