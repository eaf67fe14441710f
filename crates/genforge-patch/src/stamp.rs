//! Idempotency stamps
//!
//! A stamp is the line `genforge:patch[<key>]` wrapped in the comment syntax
//! of the patched file. Detection looks for the bare body, so the comment
//! style chosen when a stamp was written never affects later checks.

use std::path::Path;

/// Comment syntax used to wrap a stamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `// ...`
    DoubleSlash,
    /// `# ...`
    Hash,
    /// `-- ...`
    DoubleDash,
    /// `<!-- ... -->`
    Markup,
    /// `/* ... */`
    Block,
}

impl CommentStyle {
    /// Pick a style from the file's extension (or well-known file name)
    pub fn for_path(path: &Path) -> CommentStyle {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some(
                "rs" | "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" | "go" | "java" | "kt"
                | "kts" | "swift" | "c" | "h" | "cc" | "cpp" | "hpp" | "cs" | "scala" | "dart"
                | "php" | "groovy" | "gradle" | "proto" | "zig" | "jsonc",
            ) => CommentStyle::DoubleSlash,
            Some("sql" | "lua" | "hs" | "elm") => CommentStyle::DoubleDash,
            Some("html" | "htm" | "xml" | "md" | "markdown" | "svg" | "vue" | "xaml") => {
                CommentStyle::Markup
            }
            Some("css" | "scss" | "less") => CommentStyle::Block,
            _ => CommentStyle::Hash,
        }
    }

    /// Wrap `body` as a single-line comment
    pub fn wrap(&self, body: &str) -> String {
        match self {
            CommentStyle::DoubleSlash => format!("// {}", body),
            CommentStyle::Hash => format!("# {}", body),
            CommentStyle::DoubleDash => format!("-- {}", body),
            CommentStyle::Markup => format!("<!-- {} -->", body),
            CommentStyle::Block => format!("/* {} */", body),
        }
    }
}

/// Marker recording that the patch with a given key has been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyStamp {
    body: String,
}

impl IdempotencyStamp {
    pub fn new(key: &str) -> Self {
        Self {
            body: format!("genforge:patch[{}]", key),
        }
    }

    /// The comment-free stamp text
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The stamp line as written into `path`
    pub fn render_for(&self, path: &Path) -> String {
        CommentStyle::for_path(path).wrap(&self.body)
    }

    pub fn is_present_in(&self, content: &str) -> bool {
        content.contains(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_by_extension() {
        assert_eq!(CommentStyle::for_path(Path::new("a/app.ts")), CommentStyle::DoubleSlash);
        assert_eq!(CommentStyle::for_path(Path::new("Cargo.toml")), CommentStyle::Hash);
        assert_eq!(CommentStyle::for_path(Path::new("schema.SQL")), CommentStyle::DoubleDash);
        assert_eq!(CommentStyle::for_path(Path::new("README.md")), CommentStyle::Markup);
        assert_eq!(CommentStyle::for_path(Path::new("site.css")), CommentStyle::Block);
        assert_eq!(CommentStyle::for_path(Path::new("Dockerfile")), CommentStyle::Hash);
    }

    #[test]
    fn test_render_for_path() {
        let stamp = IdempotencyStamp::new("k1");
        assert_eq!(stamp.render_for(Path::new("app.ts")), "// genforge:patch[k1]");
        assert_eq!(
            stamp.render_for(Path::new("index.html")),
            "<!-- genforge:patch[k1] -->"
        );
    }

    #[test]
    fn test_detection_ignores_comment_style() {
        let stamp = IdempotencyStamp::new("routes");
        assert!(stamp.is_present_in("x\n# genforge:patch[routes]\ny"));
        assert!(stamp.is_present_in("/* genforge:patch[routes] */"));
        assert!(!stamp.is_present_in("genforge:patch[route]"));
    }

    #[test]
    fn test_keys_are_distinct() {
        let a = IdempotencyStamp::new("a");
        assert!(!a.is_present_in(IdempotencyStamp::new("ab").body()));
    }
}
