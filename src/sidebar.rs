//! Navigation sidebar toggle for narrow viewports.
//!
//! The panel (`#sidebar`) is shown off-canvas on mobile widths and opened by
//! the `.hamburger` trigger. A `.sidebar-overlay` is appended to `body` to
//! catch clicks outside the panel. Wide viewports never open the panel, and
//! crossing the breakpoint upward closes it.

use crate::config::SidebarConfig;
use crate::dom::{Document, NodeId};
use crate::events::{Dispatch, EventKind, EventTarget, Key, Subscription, UiEvent};
use crate::page::InstallError;
use crate::selector::Selector;
use once_cell::sync::Lazy;
use tracing::debug;

static TRIGGER: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".hamburger").expect("trigger selector"));
static LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("link selector"));
static CHAPTER_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[data-ch]").expect("chapter link selector"));

pub const PANEL_ID: &str = "sidebar";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarAction {
    /// Trigger click.
    Toggle,
    /// Overlay click.
    Dismiss,
    /// Click on a link inside the panel.
    FollowLink,
    KeyDown,
    Resize,
}

#[derive(Debug, Clone)]
pub struct SidebarToggle {
    panel: NodeId,
    trigger: Option<NodeId>,
    overlay: NodeId,
    breakpoint: f64,
}

impl SidebarToggle {
    /// Wire up the sidebar. Returns `Ok(None)` when the page has no panel.
    pub fn install(
        doc: &mut Document,
        config: &SidebarConfig,
    ) -> Result<Option<(Self, Vec<Subscription<SidebarAction>>)>, InstallError> {
        let trigger = doc.query(doc.root(), &TRIGGER);
        if let Some(trigger) = trigger {
            doc.set_attr(trigger, "aria-expanded", "false");
            doc.set_attr(trigger, "aria-controls", PANEL_ID);
        }
        let Some(panel) = doc.element_by_id(PANEL_ID) else {
            return Ok(None);
        };
        let body = doc.body().ok_or(InstallError::MissingBody)?;

        let overlay = doc.create_element("div");
        doc.add_class(overlay, "sidebar-overlay");
        doc.append_child(body, overlay);

        if let Some(link) = highlight_chapter(doc, body, panel) {
            debug!(href = doc.attr(link, "href"), "highlighted current chapter");
        }

        let mut subs = vec![
            Subscription::new(EventTarget::Node(overlay), EventKind::Click, SidebarAction::Dismiss),
            Subscription::new(EventTarget::Document, EventKind::KeyDown, SidebarAction::KeyDown),
            Subscription::new(EventTarget::Window, EventKind::Resize, SidebarAction::Resize),
        ];
        if let Some(trigger) = trigger {
            let toggle = Subscription::new(
                EventTarget::Node(trigger),
                EventKind::Click,
                SidebarAction::Toggle,
            );
            subs.insert(0, toggle);
        }
        subs.extend(doc.query_all(panel, &LINKS).into_iter().map(|link| {
            Subscription::new(EventTarget::Node(link), EventKind::Click, SidebarAction::FollowLink)
        }));

        debug!(listeners = subs.len(), breakpoint = config.breakpoint, "sidebar installed");
        Ok(Some((
            SidebarToggle {
                panel,
                trigger,
                overlay,
                breakpoint: config.breakpoint,
            },
            subs,
        )))
    }

    pub fn panel(&self) -> NodeId {
        self.panel
    }

    pub fn overlay(&self) -> NodeId {
        self.overlay
    }

    pub fn is_open(&self, doc: &Document) -> bool {
        doc.has_class(self.panel, "open")
    }

    fn is_mobile(&self, doc: &Document) -> bool {
        doc.viewport.width <= self.breakpoint
    }

    /// Open the panel. Ignored above the breakpoint.
    pub fn open(&self, doc: &mut Document) {
        if !self.is_mobile(doc) {
            return;
        }
        doc.add_class(self.panel, "open");
        doc.add_class(self.overlay, "visible");
        if let Some(body) = doc.body() {
            doc.add_class(body, "no-scroll");
        }
        if let Some(trigger) = self.trigger {
            doc.set_attr(trigger, "aria-expanded", "true");
        }
    }

    pub fn close(&self, doc: &mut Document) {
        doc.remove_class(self.panel, "open");
        doc.remove_class(self.overlay, "visible");
        if let Some(body) = doc.body() {
            doc.remove_class(body, "no-scroll");
        }
        if let Some(trigger) = self.trigger {
            doc.set_attr(trigger, "aria-expanded", "false");
        }
    }

    pub fn toggle(&self, doc: &mut Document) {
        if self.is_open(doc) {
            self.close(doc);
        } else {
            self.open(doc);
        }
    }

    pub fn handle(
        &self,
        doc: &mut Document,
        action: SidebarAction,
        event: &UiEvent,
        dispatch: &mut Dispatch,
    ) {
        match action {
            SidebarAction::Toggle => {
                dispatch.stop_propagation();
                self.toggle(doc);
            }
            SidebarAction::Dismiss => self.close(doc),
            SidebarAction::FollowLink if self.is_mobile(doc) => self.close(doc),
            SidebarAction::KeyDown => {
                if let UiEvent::KeyDown(key) = event
                    && key.key == Key::Escape
                    && self.is_mobile(doc)
                {
                    self.close(doc);
                }
            }
            SidebarAction::Resize if !self.is_mobile(doc) => self.close(doc),
            _ => {}
        }
    }
}

/// Mark the panel link for the body's `data-chapter` as active.
fn highlight_chapter(doc: &mut Document, body: NodeId, panel: NodeId) -> Option<NodeId> {
    let chapter = doc.attr(body, "data-chapter")?.to_string();
    let link = doc
        .query_all(panel, &CHAPTER_LINKS)
        .into_iter()
        .find(|&link| doc.attr(link, "data-ch") == Some(chapter.as_str()))?;
    doc.add_class(link, "active");
    Some(link)
}
