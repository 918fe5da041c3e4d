//! Template rendering for secretfill
//!
//! Renders Go-style `{{.Key}}` templates against a flat string context.
//! Placeholders for keys that are absent from the context render as the empty
//! string; only malformed syntax and I/O failures are errors.
//!
//! ```ignore
//! use secretfill_template::{EscapeMode, Template};
//!
//! let template = Template::parse(r#"{"abc":"{{.PerfectSecret}}"}"#)?;
//! let rendered = template.render(&context, EscapeMode::Plain);
//! ```

mod escape;
mod parse;

pub use escape::{EscapeMode, escape_html_into};

use parse::{Node, Source};
use secretfill_secrets::TemplateContext;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading, parsing or writing a template
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Malformed template syntax
    #[error("template parse error at line {line}: {message}")]
    Parse {
        /// 1-based line of the offending action
        line: usize,
        /// What is wrong with the action
        message: String,
    },

    /// Template file could not be read
    #[error("failed to read template '{}': {source}", path.display())]
    Read {
        /// Template path
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Output file could not be created or written
    #[error("failed to write output '{}': {source}", path.display())]
    Write {
        /// Output path
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },
}

/// Key lookup used while rendering.
pub trait Lookup {
    /// Value for `key`, or `None` when absent.
    fn lookup(&self, key: &str) -> Option<&str>;
}

impl Lookup for TemplateContext {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key)
    }
}

impl Lookup for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl Lookup for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

/// A parsed template, ready to render any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Parse template source.
    ///
    /// # Errors
    /// Returns [`TemplateError::Parse`] for malformed actions.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            nodes: parse::parse(source)?,
        })
    }

    /// Read and parse a template file.
    ///
    /// # Errors
    /// Returns [`TemplateError::Read`] if the file cannot be read as UTF-8,
    /// or [`TemplateError::Parse`] for malformed actions.
    pub fn parse_file(path: &Path) -> Result<Self, TemplateError> {
        let source = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source)
    }

    /// Context keys referenced by the template, deduplicated and sorted.
    #[must_use]
    pub fn placeholders(&self) -> BTreeSet<&str> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Value {
                    source: Source::Field(key),
                    ..
                } => Some(key.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Render against `context`.
    ///
    /// Missing keys render as the empty string. [`EscapeMode::Auto`] has no
    /// output path to inspect here and behaves as [`EscapeMode::Plain`].
    #[must_use]
    pub fn render<C: Lookup + ?Sized>(&self, context: &C, escape: EscapeMode) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Value { source, html } => {
                    let value = match source {
                        Source::Field(key) => context.lookup(key).unwrap_or_default(),
                        Source::Literal(literal) => literal.as_str(),
                    };
                    if *html || escape == EscapeMode::Html {
                        escape_html_into(value, &mut out);
                    } else {
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }
}

/// Outcome of [`render_to_file`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderReport {
    /// Bytes written to the output
    pub bytes: usize,
    /// Escape mode after resolving `Auto`
    pub escape: EscapeMode,
    /// Referenced keys that were absent from the context
    pub missing: Vec<String>,
}

/// Render the template at `template_path` into `output_path`.
///
/// The template is parsed and rendered fully in memory first; the output file
/// is only created (or truncated) once there is something to write, and is
/// closed on every exit path.
///
/// # Errors
/// Returns [`TemplateError::Read`], [`TemplateError::Parse`] or
/// [`TemplateError::Write`].
pub fn render_to_file<C: Lookup + ?Sized>(
    template_path: &Path,
    output_path: &Path,
    context: &C,
    escape: EscapeMode,
) -> Result<RenderReport, TemplateError> {
    let template = Template::parse_file(template_path)?;
    let escape = escape.resolve_for(output_path);

    let missing: Vec<String> = template
        .placeholders()
        .into_iter()
        .filter(|key| context.lookup(key).is_none())
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        tracing::debug!(missing = ?missing, "Placeholders without a value render empty");
    }

    let rendered = template.render(context, escape);
    write_output(output_path, rendered.as_bytes())?;

    tracing::info!(
        template = %template_path.display(),
        output = %output_path.display(),
        bytes = rendered.len(),
        escape = %escape,
        "Template output written"
    );

    Ok(RenderReport {
        bytes: rendered.len(),
        escape,
        missing,
    })
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), TemplateError> {
    let to_error = |source: io::Error| TemplateError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::create(path).map_err(to_error)?;
    file.write_all(bytes).map_err(to_error)?;
    file.sync_all().map_err(to_error)
}
