//! Orientation classes from an image's aspect ratio.

use crate::config::OrientationConfig;
use crate::dom::{Dimensions, Document, NodeId};
use serde::Serialize;

pub const PORTRAIT_CLASS: &str = "is-portrait";
pub const LANDSCAPE_CLASS: &str = "is-landscape";
pub const ULTRA_WIDE_CLASS: &str = "is-ultra-wide";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    Portrait,
    Landscape,
    /// Wider than landscape; carries the landscape class too.
    UltraWide,
}

impl Orientation {
    /// Classify by width / height ratio. `None` when either side is zero.
    pub fn classify(size: Dimensions, thresholds: &OrientationConfig) -> Option<Self> {
        if size.width == 0 || size.height == 0 {
            return None;
        }
        let ratio = size.width as f64 / size.height as f64;
        Some(if ratio >= thresholds.ultra_wide_ratio {
            Orientation::UltraWide
        } else if ratio >= thresholds.landscape_ratio {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        })
    }

    /// Classes this orientation puts on a figure.
    pub fn classes(self) -> &'static [&'static str] {
        match self {
            Orientation::Portrait => &[PORTRAIT_CLASS],
            Orientation::Landscape => &[LANDSCAPE_CLASS],
            Orientation::UltraWide => &[ULTRA_WIDE_CLASS, LANDSCAPE_CLASS],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
            Orientation::UltraWide => "ultra-wide",
        }
    }
}

/// Size to classify an image by: the decoded natural size, else the
/// `width`/`height` attributes.
pub fn image_size(doc: &Document, image: NodeId) -> Option<Dimensions> {
    if let Some(size) = doc.image_state(image).and_then(|state| state.natural_size)
        && size.width > 0
        && size.height > 0
    {
        return Some(size);
    }
    let attr = |name: &str| {
        doc.attr(image, name)
            .and_then(|v| v.trim().parse::<u32>().ok())
    };
    Some(Dimensions {
        width: attr("width")?,
        height: attr("height")?,
    })
}

/// Classify `image` and replace the orientation classes on `figure`.
///
/// Leaves the figure untouched when no usable size is known.
pub fn apply(
    doc: &mut Document,
    figure: NodeId,
    image: NodeId,
    thresholds: &OrientationConfig,
) -> Option<Orientation> {
    let orientation = Orientation::classify(image_size(doc, image)?, thresholds)?;
    for class in [PORTRAIT_CLASS, LANDSCAPE_CLASS, ULTRA_WIDE_CLASS] {
        doc.remove_class(figure, class);
    }
    for class in orientation.classes() {
        doc.add_class(figure, class);
    }
    Some(orientation)
}
