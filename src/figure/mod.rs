//! Figure viewer.
//!
//! | Module | Role |
//! |--------|------|
//! | [`caption`] | Caption normalization from `.caption` spans or `figcaption` |
//! | [`orientation`] | Portrait / landscape / ultra-wide classes from aspect ratio |
//! | [`scanner`] | Discovery, indexing, toolbar and image affordances |
//! | [`markup`] | Overlay markup rendered with Maud |
//! | [`viewer`] | Open / navigate / close state machine and input handling |

pub mod caption;
pub mod markup;
pub mod orientation;
pub mod scanner;
pub mod viewer;

pub use caption::Caption;
pub use orientation::Orientation;
pub use scanner::{FigureEntry, FigureIndex};
pub use viewer::{FigureViewer, ViewerAction};
