//! UI events and listener registration.
//!
//! Widgets do not hold callbacks. At install time each one hands back a list
//! of [`Subscription`]s naming a target, an event kind and a widget-specific
//! action value; the page runtime stores them in a [`Listeners`] table and, on
//! dispatch, routes every matching action back to the widget that asked for
//! it. Keeping handlers as plain data makes the wiring inspectable in tests and
//! keeps all state inside the widget structs.
//!
//! Dispatch follows the browser's bubbling order: the target node, its
//! ancestors, the document, then the window. `load` does not bubble.

use crate::dom::{Document, NodeId};

/// Where a listener is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Window,
    Document,
    Node(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    KeyDown,
    TouchStart,
    TouchEnd,
    Load,
    Scroll,
    Resize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Escape,
    ArrowLeft,
    ArrowRight,
    Tab,
    Enter,
    Space,
    Other(String),
}

impl Key {
    /// Map a DOM `KeyboardEvent.key` value.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Escape" | "Esc" => Key::Escape,
            "ArrowLeft" => Key::ArrowLeft,
            "ArrowRight" => Key::ArrowRight,
            "Tab" => Key::Tab,
            "Enter" => Key::Enter,
            " " | "Spacebar" => Key::Space,
            other => Key::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub shift: bool,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        Self { key, shift: false }
    }

    pub fn shifted(key: Key) -> Self {
        Self { key, shift: true }
    }
}

/// An input event with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Click,
    KeyDown(KeyEvent),
    /// `client_x` of the first changed touch, `None` if the event carried none.
    TouchStart { client_x: Option<f64> },
    TouchEnd { client_x: Option<f64> },
    Load,
    Scroll,
    Resize,
}

impl UiEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            UiEvent::Click => EventKind::Click,
            UiEvent::KeyDown(_) => EventKind::KeyDown,
            UiEvent::TouchStart { .. } => EventKind::TouchStart,
            UiEvent::TouchEnd { .. } => EventKind::TouchEnd,
            UiEvent::Load => EventKind::Load,
            UiEvent::Scroll => EventKind::Scroll,
            UiEvent::Resize => EventKind::Resize,
        }
    }

    pub fn bubbles(&self) -> bool {
        !matches!(self, UiEvent::Load)
    }
}

/// Outcome flags a handler can set while an event is dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dispatch {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
}

impl Dispatch {
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }
}

/// A widget's request to be told about `kind` events reaching `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription<A> {
    pub target: EventTarget,
    pub kind: EventKind,
    pub action: A,
    /// Remove the listener after it fires once.
    pub once: bool,
}

impl<A> Subscription<A> {
    pub fn new(target: EventTarget, kind: EventKind, action: A) -> Self {
        Self {
            target,
            kind,
            action,
            once: false,
        }
    }

    pub fn once(target: EventTarget, kind: EventKind, action: A) -> Self {
        Self {
            target,
            kind,
            action,
            once: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(usize);

#[derive(Debug, Clone)]
struct Listener<H> {
    id: ListenerId,
    target: EventTarget,
    kind: EventKind,
    handler: H,
    once: bool,
}

/// Registered listeners, kept in registration order.
#[derive(Debug, Clone)]
pub struct Listeners<H> {
    entries: Vec<Listener<H>>,
    next_id: usize,
}

impl<H> Default for Listeners<H> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<H: Clone> Listeners<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        target: EventTarget,
        kind: EventKind,
        handler: H,
        once: bool,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push(Listener {
            id,
            target,
            kind,
            handler,
            once,
        });
        id
    }

    /// Register a widget's subscriptions, wrapping each action into `H`.
    pub fn extend<A>(&mut self, subscriptions: Vec<Subscription<A>>, wrap: impl Fn(A) -> H) {
        for sub in subscriptions {
            self.subscribe(sub.target, sub.kind, wrap(sub.action), sub.once);
        }
    }

    pub fn remove(&mut self, id: ListenerId) {
        self.entries.retain(|l| l.id != id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, target: EventTarget, kind: EventKind) -> usize {
        self.entries
            .iter()
            .filter(|l| l.target == target && l.kind == kind)
            .count()
    }

    /// Listeners on `target` for `kind`, in registration order. Once-listeners
    /// are removed from the table as they are returned.
    pub fn take_matching(&mut self, target: EventTarget, kind: EventKind) -> Vec<H> {
        let matching: Vec<(ListenerId, H, bool)> = self
            .entries
            .iter()
            .filter(|l| l.target == target && l.kind == kind)
            .map(|l| (l.id, l.handler.clone(), l.once))
            .collect();
        for (id, _, once) in &matching {
            if *once {
                self.remove(*id);
            }
        }
        matching.into_iter().map(|(_, handler, _)| handler).collect()
    }
}

/// Targets an event visits, in order.
pub fn propagation_path(doc: &Document, target: EventTarget, bubbles: bool) -> Vec<EventTarget> {
    let mut path = vec![target];
    if !bubbles {
        return path;
    }
    match target {
        EventTarget::Node(node) => {
            path.extend(
                doc.ancestors(node)
                    .filter(|&a| a != doc.root())
                    .map(EventTarget::Node),
            );
            if doc.is_connected(node) {
                path.push(EventTarget::Document);
                path.push(EventTarget::Window);
            }
        }
        EventTarget::Document => path.push(EventTarget::Window),
        EventTarget::Window => {}
    }
    path
}
