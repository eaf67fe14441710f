//! Line-ending detection and normalization
//!
//! Shared by the renderer and the patch engine. The default policy keeps a
//! file's dominant style; `lf` and `crlf` force one style over the whole
//! content after all other edits are done.

use serde::{Deserialize, Serialize};

/// A concrete line-ending style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineEnding {
    /// `\n`
    Lf,
    /// `\r\n`
    Crlf,
}

impl LineEnding {
    /// The separator this style writes
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Crlf => "\r\n",
        }
    }

    /// Detect the dominant style by majority vote; ties go to LF.
    pub fn detect(content: &str) -> LineEnding {
        let crlf = content.matches("\r\n").count();
        let lf_total = content.matches('\n').count();
        let bare_lf = lf_total - crlf;

        if crlf > bare_lf {
            LineEnding::Crlf
        } else {
            LineEnding::Lf
        }
    }
}

/// How line endings of written content are chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEndingPolicy {
    /// Keep whatever the content already uses
    #[default]
    Preserve,
    /// Force `\n`
    Lf,
    /// Force `\r\n`
    Crlf,
}

impl LineEndingPolicy {
    /// Apply the policy to a complete file body
    pub fn apply(&self, content: &str) -> String {
        match self {
            LineEndingPolicy::Preserve => content.to_string(),
            LineEndingPolicy::Lf => normalize_to_lf(content),
            LineEndingPolicy::Crlf => convert(content, LineEnding::Crlf),
        }
    }
}

/// Convert CRLF and lone CR to LF.
pub fn normalize_to_lf(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

/// Rewrite every line break in `content` as `ending`.
pub fn convert(content: &str, ending: LineEnding) -> String {
    let normalized = normalize_to_lf(content);
    match ending {
        LineEnding::Lf => normalized,
        LineEnding::Crlf => normalized.replace('\n', "\r\n"),
    }
}

/// Compare two texts ignoring line-ending differences.
pub fn equivalent(a: &str, b: &str) -> bool {
    normalize_to_lf(a) == normalize_to_lf(b)
}
