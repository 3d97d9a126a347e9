//! Chapter reading progress bar.

use crate::config::ProgressConfig;
use crate::dom::{Document, NodeId};
use crate::events::{EventKind, EventTarget, Subscription};
use crate::selector::Selector;
use once_cell::sync::Lazy;
use tracing::debug;

static PROGRESS_ROOT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[data-progress="chapter"]"#).expect("progress root selector"));
static PROGRESS_BAR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".reading-progress__bar").expect("progress bar selector"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressAction {
    RequestUpdate,
}

#[derive(Debug, Clone)]
pub struct ReadingProgress {
    root: NodeId,
    bar: NodeId,
    min_scroll_distance: f64,
    ticking: bool,
}

impl ReadingProgress {
    /// Find the indicator and draw it once. `None` when the page has no
    /// indicator or it lacks a bar.
    pub fn install(
        doc: &mut Document,
        config: &ProgressConfig,
    ) -> Option<(Self, Vec<Subscription<ProgressAction>>)> {
        let root = doc.query(doc.root(), &PROGRESS_ROOT)?;
        let bar = doc.query(root, &PROGRESS_BAR)?;
        let mut progress = ReadingProgress {
            root,
            bar,
            min_scroll_distance: config.min_scroll_distance,
            ticking: false,
        };
        progress.update(doc);
        debug!("reading progress installed");

        let subs = vec![
            Subscription::new(
                EventTarget::Window,
                EventKind::Scroll,
                ProgressAction::RequestUpdate,
            ),
            Subscription::new(
                EventTarget::Window,
                EventKind::Resize,
                ProgressAction::RequestUpdate,
            ),
        ];
        Some((progress, subs))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn bar(&self) -> NodeId {
        self.bar
    }

    /// Returns `true` when the caller must schedule a frame for [`update`].
    ///
    /// [`update`]: ReadingProgress::update
    pub fn request_update(&mut self) -> bool {
        if self.ticking {
            return false;
        }
        self.ticking = true;
        true
    }

    /// Recompute the bar from the current scroll position.
    pub fn update(&mut self, doc: &mut Document) -> f64 {
        self.ticking = false;

        let viewport = &doc.viewport;
        let scrollable = viewport.scroll_height - viewport.height;
        let ratio = (viewport.scroll_y / scrollable.max(1.0)).clamp(0.0, 1.0);

        doc.set_style_property(self.bar, "transform", &format!("scaleX({ratio:.4})"));
        if scrollable > self.min_scroll_distance {
            doc.add_class(self.root, "is-active");
            doc.set_attr(self.root, "aria-hidden", "false");
        } else {
            doc.remove_class(self.root, "is-active");
            doc.set_attr(self.root, "aria-hidden", "true");
        }
        ratio
    }

    pub fn handle(&mut self, action: ProgressAction) -> bool {
        match action {
            ProgressAction::RequestUpdate => self.request_update(),
        }
    }
}
