//! Viewer overlay markup.

use maud::{Markup, html};

pub const ROOT_CLASS: &str = "figure-lightbox";
pub const OPEN_CLASS: &str = "is-open";
pub const BODY_OPEN_CLASS: &str = "figure-lightbox-open";

/// Inner markup of the shared viewer overlay.
///
/// The overlay root itself is created by the viewer; this is parsed into it.
pub fn viewer_markup() -> Markup {
    html! {
        div.figure-lightbox__backdrop data-action="close" {}
        div.figure-lightbox__surface role="dialog" aria-modal="true" aria-label="Figure viewer" tabindex="-1" {
            div.figure-lightbox__toolbar {
                div.figure-lightbox__counter aria-live="polite" {}
                div.figure-lightbox__actions {
                    button.figure-lightbox__btn type="button" data-action="prev" aria-label="Previous figure" { "Prev" }
                    button.figure-lightbox__btn type="button" data-action="next" aria-label="Next figure" { "Next" }
                    button.figure-lightbox__btn type="button" data-action="close" aria-label="Close figure viewer" { "Close" }
                }
            }
            figure.figure-lightbox__stage {
                img.figure-lightbox__image alt="";
                figcaption.figure-lightbox__caption {
                    span.figure-lightbox__caption-id {}
                    span.figure-lightbox__caption-text {}
                }
            }
        }
    }
}
