//! Caption normalization.
//!
//! Book figures carry their captions in one of three shapes:
//!
//! ```html
//! <!-- structured -->
//! <div class="caption"><span class="id">Figure 3.2</span><span class="content">Beam steering</span></div>
//! <!-- generic -->
//! <figcaption>Figure 3.2: Beam steering</figcaption>
//! <!-- none -->
//! ```
//!
//! All of them normalize to the same [`Caption`]: `id = "Figure 3.2:"`,
//! `text = "Beam steering"`. The rules depend only on one figure's own
//! markup and are stable under re-application to their own output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static FIGURE_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^Figure\s+([A-Za-z0-9][A-Za-z0-9.\-]*)\s*:\s*(.*)$")
        .expect("figure label regex")
});

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Normalized caption of one figure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Caption {
    /// Label such as `"Figure 3:"`. Empty until indexing assigns a fallback.
    pub id: String,
    /// Caption body without the label.
    pub text: String,
}

/// Raw caption text pulled out of a figure's markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptionMarkup {
    /// Text of the `.caption .id` element.
    pub id: Option<String>,
    /// Text of the `.caption .content` element.
    pub content: Option<String>,
    /// Text of the figure's `figcaption`.
    pub figcaption: Option<String>,
}

/// Label assigned to the figure at 1-based position `number` when its markup
/// yields none.
pub fn fallback_id(number: usize) -> String {
    format!("Figure {number}:")
}

/// Apply the normalization rules to one figure's caption markup.
pub fn normalize(markup: &CaptionMarkup) -> Caption {
    let mut id = markup
        .id
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    let mut content = markup
        .content
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    if content.is_empty()
        && let Some(figcaption) = &markup.figcaption
    {
        content = if id.is_empty() {
            figcaption.trim().to_string()
        } else {
            figcaption.replacen(id.as_str(), "", 1).trim().to_string()
        };
    }

    // Re-apply until nothing changes, so the result is a fixed point even
    // when the body repeats its own label.
    loop {
        let (next_id, next_content) = apply_label_rules(&id, &content);
        if next_id == id && next_content == content {
            break;
        }
        id = next_id;
        content = next_content;
    }

    Caption { id, text: content }
}

/// Label detection, id cleanup and duplicate-prefix stripping, once.
fn apply_label_rules(id: &str, content: &str) -> (String, String) {
    let (id, mut content) = match FIGURE_LABEL_RE.captures(content) {
        Some(caps) => (
            format!("Figure {}:", &caps[1]),
            caps.get(2)
                .map(|body| body.as_str().trim())
                .unwrap_or_default()
                .to_string(),
        ),
        None => (id.to_string(), content.to_string()),
    };

    let mut id = WHITESPACE_RE.replace_all(&id, " ").trim().to_string();
    if !id.is_empty() && !id.ends_with(':') {
        id.push(':');
    }

    if !id.is_empty()
        && let Some(rest) = strip_prefix_ignore_case(&content, &id)
    {
        content = rest.trim().to_string();
    }

    (id, content)
}

/// Strip `prefix` from the start of `text`, comparing characters
/// case-insensitively.
fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let mut rest = text.char_indices();
    for expected in prefix.chars() {
        let (_, actual) = rest.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    let offset = rest.next().map(|(i, _)| i).unwrap_or(text.len());
    Some(&text[offset..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured(id: &str, content: &str) -> CaptionMarkup {
        CaptionMarkup {
            id: Some(id.to_string()),
            content: Some(content.to_string()),
            figcaption: None,
        }
    }

    fn generic(figcaption: &str) -> CaptionMarkup {
        CaptionMarkup {
            figcaption: Some(figcaption.to_string()),
            ..Default::default()
        }
    }

    fn caption(id: &str, text: &str) -> Caption {
        Caption {
            id: id.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn figure_label_in_content_becomes_id() {
        for label in ["3", "3.2", "A-1", "12b", "4.1-c"] {
            let parsed = normalize(&generic(&format!("Figure {label}: Beam pattern  ")));
            assert_eq!(parsed, caption(&format!("Figure {label}:"), "Beam pattern"));
        }
    }

    #[test]
    fn figure_label_match_is_case_insensitive() {
        let parsed = normalize(&generic("FIGURE 7 : grating lobes"));
        assert_eq!(parsed, caption("Figure 7:", "grating lobes"));
    }

    #[test]
    fn structured_caption_gets_colon() {
        let parsed = normalize(&structured(" Figure  3 ", " Array factor "));
        assert_eq!(parsed, caption("Figure 3:", "Array factor"));
    }

    #[test]
    fn figcaption_has_id_text_removed() {
        let markup = CaptionMarkup {
            id: Some("Fig. 4".into()),
            content: None,
            figcaption: Some("Fig. 4 Element spacing".into()),
        };
        assert_eq!(normalize(&markup), caption("Fig. 4:", "Element spacing"));
    }

    #[test]
    fn duplicated_prefix_is_stripped_case_insensitively() {
        let parsed = normalize(&structured("Plate 2", "plate 2: Radiating slots"));
        assert_eq!(parsed, caption("Plate 2:", "Radiating slots"));
    }

    #[test]
    fn coincidental_prefix_is_stripped_too() {
        let parsed = normalize(&structured("Note", "Note: this text"));
        assert_eq!(parsed, caption("Note:", "this text"));
    }

    #[test]
    fn missing_markup_yields_empty_caption() {
        assert_eq!(normalize(&CaptionMarkup::default()), Caption::default());
    }

    #[test]
    fn figcaption_without_label_keeps_text_and_empty_id() {
        let parsed = normalize(&generic("A lonely antenna"));
        assert_eq!(parsed, caption("", "A lonely antenna"));
    }

    #[test]
    fn multiline_content_does_not_match_label() {
        let parsed = normalize(&generic("Figure 5: first\nsecond"));
        assert_eq!(parsed, caption("", "Figure 5: first\nsecond"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            generic("Figure 3: Beam pattern"),
            structured("Figure 9", "Figure 9: Twice"),
            structured("Plate 2", "Radiating slots"),
            generic("Untitled sketch"),
        ];
        for markup in inputs {
            let once = normalize(&markup);
            let twice = normalize(&structured(&once.id, &once.text));
            assert_eq!(once, twice, "not idempotent for {markup:?}");
        }
    }

    #[test]
    fn repeated_labels_settle_in_one_pass() {
        let parsed = normalize(&generic("Figure 1: Figure 1: Figure 1: Lobes"));
        assert_eq!(parsed, caption("Figure 1:", "Lobes"));
        let parsed = normalize(&generic("Figure 1: Figure 2: Lobes"));
        assert_eq!(parsed, caption("Figure 2:", "Lobes"));
        let parsed = normalize(&structured("Note", "note: NOTE: kept"));
        assert_eq!(parsed, caption("Note:", "kept"));
    }

    #[test]
    fn prefix_strip_handles_non_ascii() {
        assert_eq!(strip_prefix_ignore_case("ÉTUDE 1: x", "étude 1:"), Some(" x"));
        assert_eq!(strip_prefix_ignore_case("short", "longer prefix"), None);
        assert_eq!(strip_prefix_ignore_case("Exact", "exact"), Some(""));
    }

    #[test]
    fn fallback_id_is_one_based_label() {
        assert_eq!(fallback_id(2), "Figure 2:");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn label_heavy_id() -> impl Strategy<Value = String> {
            prop_oneof!["\\PC{0,16}", "(Figure|Plate|Fig\\.) ?[0-9.]{1,4}:?"]
        }

        fn label_heavy_content() -> impl Strategy<Value = String> {
            prop_oneof![
                "\\PC{0,40}",
                "((Figure|figure|FIGURE|Plate) [0-9A-Za-z.\\-]{1,4} ?: ){0,3}[a-z ]{0,20}",
            ]
        }

        proptest! {
            #[test]
            fn any_figure_label_is_extracted(
                word in prop::sample::select(vec!["Figure", "figure", "FIGURE"]),
                label in "[A-Za-z0-9][A-Za-z0-9.\\-]{0,12}",
                gap in "[ \t]{0,3}",
                body in "[^fF\\s][^\\n]{0,40}",
            ) {
                let parsed = normalize(&generic(&format!("{word} {label}{gap}: {body}")));
                prop_assert_eq!(parsed.id, format!("Figure {label}:"));
                prop_assert_eq!(parsed.text, body.trim());
            }

            #[test]
            fn normalization_reaches_a_fixed_point(
                id in prop::option::of(label_heavy_id()),
                content in prop::option::of(label_heavy_content()),
                figcaption in prop::option::of(label_heavy_content()),
            ) {
                let markup = CaptionMarkup { id, content, figcaption };
                let once = normalize(&markup);
                let twice = normalize(&structured(&once.id, &once.text));
                prop_assert_eq!(once, twice);
            }

            #[test]
            fn normalized_id_is_clean(
                id in prop::option::of(label_heavy_id()),
                content in prop::option::of(label_heavy_content()),
            ) {
                let parsed = normalize(&CaptionMarkup { id, content, figcaption: None });
                prop_assert!(parsed.id.is_empty() || parsed.id.ends_with(':'));
                prop_assert_eq!(parsed.id.trim(), parsed.id.as_str());
                prop_assert_eq!(parsed.text.trim(), parsed.text.as_str());
            }
        }
    }
}
