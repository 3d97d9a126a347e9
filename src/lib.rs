//! # figlight
//!
//! Progressive enhancement for long-form book pages: a modal figure viewer
//! with keyboard, focus and swipe handling, a collapsible navigation sidebar,
//! scroll-triggered reveal animations and a reading progress bar.
//!
//! The widgets run against an in-memory document model rather than a browser.
//! A [`page::Page`] owns the parsed document, installs each widget once and
//! routes input events (clicks, keys, touches, scroll, resize, image loads)
//! to them. The same model drives the site build, which enhances every page
//! of a book ahead of time and writes the result as static HTML.
//!
//! # Architecture
//!
//! ```text
//!   html::parse ──▶ Document ──▶ Page::install ──▶ Page (event loop)
//!                                     │                 │
//!          FigureViewer, SidebarToggle, ScrollReveal,   │
//!          ReadingProgress  ◀── dispatch ◀── input ─────┘
//!                                     │
//!   html::serialize ◀─────────────────┘   (site::build writes dist/)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`dom`] | Arena document: nodes, attributes, classes, focus, geometry, viewport |
//! | [`selector`] | The CSS selector subset used to find widget elements |
//! | [`html`] | Lenient HTML parsing and serialization |
//! | [`events`] | Event kinds, listener table, bubbling dispatch |
//! | [`figure`] | Caption parsing, figure indexing, orientation and the modal viewer |
//! | [`sidebar`] | Hamburger-driven navigation panel |
//! | [`reveal`] | One-shot scroll reveal of content blocks |
//! | [`progress`] | Reading progress bar |
//! | [`page`] | Widget installation and the event loop |
//! | [`probe`] | Natural image sizes from files on disk |
//! | [`site`] | Parallel book build: enhance pages, copy assets, write `figures.json` |
//! | [`config`] | `figlight.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Explicit Installation
//!
//! Nothing runs at load time by side effect. [`page::Page::install`] builds
//! each widget in a fixed order and each widget returns the subscriptions it
//! wants, so a page's listener table is plain data that tests can inspect.
//!
//! ## One Frame Queue
//!
//! Scroll and resize handlers never touch layout directly. They request a
//! frame, and repeated requests before the frame runs collapse into one.
//! The page runs queued frame work only from
//! [`page::Page::run_animation_frame`].
//!
//! ## Ahead-of-Time Enhancement
//!
//! A static book can ship the enhanced markup: toolbar buttons, figure
//! indices, orientation classes and the viewer overlay are all present in
//! the served HTML. Image sizes come from [`probe`] instead of a network
//! load, and images that cannot be probed stay unclassified the way a broken
//! image does in a browser.

pub mod config;
pub mod dom;
pub mod events;
pub mod figure;
pub mod html;
pub mod output;
pub mod page;
pub mod probe;
pub mod progress;
pub mod reveal;
pub mod selector;
pub mod sidebar;
pub mod site;

#[cfg(test)]
pub(crate) mod test_helpers;
