//! Output escaping for rendered values

use serde::{Deserialize, Serialize};
use std::path::Path;

/// How substituted values are escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeMode {
    /// Insert values verbatim
    Plain,
    /// Escape values for HTML/XML text
    Html,
    /// `Html` for markup outputs, `Plain` for everything else
    #[default]
    Auto,
}

/// Output extensions that `Auto` treats as markup
const MARKUP_EXTENSIONS: &[&str] = &["html", "htm", "xhtml", "xml"];

impl EscapeMode {
    /// Settle `Auto` against the output path.
    #[must_use]
    pub fn resolve_for(self, output: &Path) -> Self {
        match self {
            Self::Auto => {
                let is_markup = output
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        MARKUP_EXTENSIONS
                            .iter()
                            .any(|m| m.eq_ignore_ascii_case(ext))
                    });
                if is_markup { Self::Html } else { Self::Plain }
            }
            other => other,
        }
    }
}

impl std::fmt::Display for EscapeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => f.write_str("plain"),
            Self::Html => f.write_str("html"),
            Self::Auto => f.write_str("auto"),
        }
    }
}

/// Escape `value` the way Go's `html/template` escapes text, appending to `out`.
pub fn escape_html_into(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '\0' => out.push('\u{FFFD}'),
            '"' => out.push_str("&#34;"),
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&#39;"),
            '+' => out.push_str("&#43;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escape(value: &str) -> String {
        let mut out = String::new();
        escape_html_into(value, &mut out);
        out
    }

    #[test]
    fn test_html_replacement_table() {
        assert_eq!(escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&#34;x&#34;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;");
        assert_eq!(escape("a+b"), "a&#43;b");
        assert_eq!(escape("nul\0"), "nul\u{FFFD}");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_auto_resolves_by_extension() {
        assert_eq!(EscapeMode::Auto.resolve_for(Path::new("out/index.html")), EscapeMode::Html);
        assert_eq!(EscapeMode::Auto.resolve_for(Path::new("web.XML")), EscapeMode::Html);
        assert_eq!(EscapeMode::Auto.resolve_for(Path::new("appsettings.json")), EscapeMode::Plain);
        assert_eq!(EscapeMode::Auto.resolve_for(Path::new(".env")), EscapeMode::Plain);
        assert_eq!(EscapeMode::Auto.resolve_for(Path::new("config")), EscapeMode::Plain);
    }

    #[test]
    fn test_explicit_modes_are_kept() {
        assert_eq!(EscapeMode::Html.resolve_for(Path::new("a.json")), EscapeMode::Html);
        assert_eq!(EscapeMode::Plain.resolve_for(Path::new("a.html")), EscapeMode::Plain);
    }
}
