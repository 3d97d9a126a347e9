//! Scroll reveal: content fades in as it enters the viewport.
//!
//! Targets come from two selector lists, "fast" and "slow", and are marked
//! `data-reveal="pending"` at install. Visibility is checked on the animation
//! frame after install and after every scroll or resize, at most one check
//! per frame. A target whose visible fraction reaches the threshold is
//! revealed and stops being observed. With reduced motion preferred,
//! everything is revealed at install and nothing is observed.

use crate::config::RevealConfig;
use crate::dom::{Document, NodeId, Rect};
use crate::events::{EventKind, EventTarget, Subscription};
use crate::page::InstallError;
use std::collections::HashSet;
use tracing::debug;

/// Stagger slots for `--reveal-order`.
const ORDER_SLOTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealSpeed {
    Fast,
    Slow,
}

impl RevealSpeed {
    pub fn as_str(self) -> &'static str {
        match self {
            RevealSpeed::Fast => "fast",
            RevealSpeed::Slow => "slow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTarget {
    pub node: NodeId,
    pub speed: RevealSpeed,
}

/// Scroll and resize both ask for a visibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealAction {
    Recheck,
}

#[derive(Debug, Clone)]
pub struct ScrollReveal {
    targets: Vec<RevealTarget>,
    observing: Vec<NodeId>,
    threshold: f64,
    bottom_margin: f64,
    check_pending: bool,
}

impl ScrollReveal {
    /// Collect and mark the targets. Returns `Ok(None)` when nothing on the
    /// page matches.
    pub fn install(
        doc: &mut Document,
        config: &RevealConfig,
    ) -> Result<Option<(Self, Vec<Subscription<RevealAction>>)>, InstallError> {
        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for (selectors, speed) in [
            (config.fast_selectors()?, RevealSpeed::Fast),
            (config.slow_selectors()?, RevealSpeed::Slow),
        ] {
            for selector in &selectors {
                for node in doc.query_all(doc.root(), selector) {
                    if seen.insert(node) {
                        targets.push(RevealTarget { node, speed });
                    }
                }
            }
        }
        if targets.is_empty() {
            return Ok(None);
        }

        for (i, target) in targets.iter().enumerate() {
            doc.add_class(target.node, "reveal");
            doc.set_attr(target.node, "data-reveal", "pending");
            doc.set_attr(target.node, "data-reveal-speed", target.speed.as_str());
            doc.set_style_property(target.node, "--reveal-order", &(i % ORDER_SLOTS).to_string());
        }

        let mut reveal = ScrollReveal {
            targets,
            observing: Vec::new(),
            threshold: config.threshold,
            bottom_margin: config.bottom_margin,
            check_pending: false,
        };

        if doc.viewport.prefers_reduced_motion {
            for target in &reveal.targets {
                reveal_node(doc, target.node);
            }
            debug!(targets = reveal.targets.len(), "reduced motion, revealed all");
            return Ok(Some((reveal, Vec::new())));
        }

        reveal.observing = reveal.targets.iter().map(|t| t.node).collect();
        let subs = vec![
            Subscription::new(EventTarget::Window, EventKind::Scroll, RevealAction::Recheck),
            Subscription::new(EventTarget::Window, EventKind::Resize, RevealAction::Recheck),
        ];
        debug!(targets = reveal.targets.len(), "observing reveal targets");
        Ok(Some((reveal, subs)))
    }

    pub fn targets(&self) -> &[RevealTarget] {
        &self.targets
    }

    /// Targets not yet revealed.
    pub fn observing(&self) -> &[NodeId] {
        &self.observing
    }

    /// Ask for a visibility check on the next frame. Returns `true` when the
    /// caller must schedule one; `false` when one is already pending or
    /// nothing is left to observe.
    pub fn request_check(&mut self) -> bool {
        if self.check_pending || self.observing.is_empty() {
            return false;
        }
        self.check_pending = true;
        true
    }

    /// Frame callback: reveal every observed target that is visible enough.
    pub fn run_check(&mut self, doc: &mut Document) -> Vec<NodeId> {
        self.check_pending = false;
        let (top, bottom) = observed_band(doc, self.bottom_margin);
        let threshold = self.threshold;

        let (visible, hidden): (Vec<NodeId>, Vec<NodeId>) =
            self.observing.iter().copied().partition(|&node| {
                doc.rect(node)
                    .is_some_and(|rect| visible_fraction(rect, top, bottom) >= threshold)
            });
        for &node in &visible {
            reveal_node(doc, node);
        }
        self.observing = hidden;
        if !visible.is_empty() {
            debug!(revealed = visible.len(), remaining = self.observing.len(), "reveal check");
        }
        visible
    }

    pub fn handle(&mut self, action: RevealAction) -> bool {
        match action {
            RevealAction::Recheck => self.request_check(),
        }
    }
}

fn reveal_node(doc: &mut Document, node: NodeId) {
    doc.add_class(node, "is-visible");
    doc.set_attr(node, "data-reveal", "shown");
}

/// Vertical band of the viewport, in document coordinates, that counts for
/// visibility: the bottom `bottom_margin` fraction is excluded.
fn observed_band(doc: &Document, bottom_margin: f64) -> (f64, f64) {
    let viewport = &doc.viewport;
    let top = viewport.scroll_y;
    (top, top + viewport.height * (1.0 - bottom_margin))
}

fn visible_fraction(rect: Rect, top: f64, bottom: f64) -> f64 {
    if rect.height <= 0.0 {
        return if rect.top >= top && rect.top <= bottom { 1.0 } else { 0.0 };
    }
    let overlap = rect.bottom().min(bottom) - rect.top.max(top);
    (overlap.max(0.0) / rect.height).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Selector;
    use crate::test_helpers::{REVEAL_PAGE, parse_page};

    type Installed = Option<(ScrollReveal, Vec<Subscription<RevealAction>>)>;

    fn installed(reduced_motion: bool) -> (Document, Installed) {
        let mut doc = parse_page(REVEAL_PAGE);
        doc.viewport.prefers_reduced_motion = reduced_motion;
        let installed = ScrollReveal::install(&mut doc, &RevealConfig::default()).unwrap();
        (doc, installed)
    }

    fn node(doc: &Document, selector: &str) -> NodeId {
        doc.query(doc.root(), &Selector::parse(selector).unwrap()).unwrap()
    }

    #[test]
    fn targets_are_marked_in_list_order_without_duplicates() {
        let (doc, installed) = installed(false);
        let (reveal, subs) = installed.unwrap();
        assert_eq!(subs.len(), 2);

        let speeds: Vec<_> = reveal.targets().iter().map(|t| t.speed).collect();
        assert_eq!(
            speeds,
            vec![RevealSpeed::Fast, RevealSpeed::Fast, RevealSpeed::Slow, RevealSpeed::Slow]
        );

        let title = node(&doc, ".hero h1");
        assert!(doc.has_class(title, "reveal"));
        assert_eq!(doc.attr(title, "data-reveal"), Some("pending"));
        assert_eq!(doc.attr(title, "data-reveal-speed"), Some("fast"));
        assert_eq!(doc.style_property(title, "--reveal-order").as_deref(), Some("0"));

        let last = reveal.targets()[3].node;
        assert_eq!(doc.style_property(last, "--reveal-order").as_deref(), Some("3"));
    }

    #[test]
    fn reduced_motion_reveals_everything_at_once() {
        let (doc, installed) = installed(true);
        let (mut reveal, subs) = installed.unwrap();
        assert!(subs.is_empty());
        assert!(reveal.observing().is_empty());
        assert!(!reveal.request_check());
        for target in reveal.targets() {
            assert!(doc.has_class(target.node, "is-visible"));
            assert_eq!(doc.attr(target.node, "data-reveal"), Some("shown"));
        }
    }

    #[test]
    fn page_without_targets_is_skipped() {
        let mut doc = parse_page("<html><body><p>plain</p></body></html>");
        assert!(ScrollReveal::install(&mut doc, &RevealConfig::default()).unwrap().is_none());
    }

    #[test]
    fn check_reveals_visible_targets_and_unobserves_them() {
        let (mut doc, installed) = installed(false);
        let (mut reveal, _) = installed.unwrap();
        let title = node(&doc, ".hero h1");
        let figure = node(&doc, "figure.figure");
        doc.set_rect(title, Rect { top: 100.0, height: 50.0 });
        doc.set_rect(figure, Rect { top: 2000.0, height: 400.0 });

        assert!(reveal.request_check());
        assert!(!reveal.request_check());
        assert_eq!(reveal.run_check(&mut doc), vec![title]);
        assert_eq!(doc.attr(title, "data-reveal"), Some("shown"));
        assert_eq!(doc.attr(figure, "data-reveal"), Some("pending"));
        assert!(!reveal.observing().contains(&title));

        doc.viewport.scroll_y = 1500.0;
        assert!(reveal.request_check());
        assert_eq!(reveal.run_check(&mut doc), vec![figure]);
    }

    #[test]
    fn bottom_margin_shrinks_the_viewport() {
        // 800px viewport minus 8% leaves 736px of trigger band.
        assert_eq!(visible_fraction(Rect { top: 740.0, height: 100.0 }, 0.0, 736.0), 0.0);
        let partial = visible_fraction(Rect { top: 700.0, height: 100.0 }, 0.0, 736.0);
        assert!((partial - 0.36).abs() < 1e-9);
        assert_eq!(visible_fraction(Rect { top: 0.0, height: 100.0 }, 0.0, 736.0), 1.0);
    }

    #[test]
    fn threshold_is_inclusive() {
        let (mut doc, installed) = installed(false);
        let (mut reveal, _) = installed.unwrap();
        let title = node(&doc, ".hero h1");
        // 12 of 100px inside the 736px band.
        doc.set_rect(title, Rect { top: 724.0, height: 100.0 });
        reveal.request_check();
        assert_eq!(reveal.run_check(&mut doc), vec![title]);
    }

    #[test]
    fn targets_without_layout_stay_pending() {
        let (mut doc, installed) = installed(false);
        let (mut reveal, _) = installed.unwrap();
        reveal.request_check();
        assert!(reveal.run_check(&mut doc).is_empty());
        assert_eq!(reveal.observing().len(), 4);
    }
}
