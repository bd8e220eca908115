//! Renderer module
//!
//! Renders ResultSet to different output formats: jsonl, json, md

use crate::core::model::{Kind, ResultItem, ResultSet};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Jsonl,
    Json,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jsonl" => Ok(OutputFormat::Jsonl),
            "json" => Ok(OutputFormat::Json),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

/// Render configuration combining format and options
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl RenderConfig {
    pub fn with_pretty(format: OutputFormat, pretty: bool) -> Self {
        Self { format, pretty }
    }
}

/// Renderer for result sets
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render a result set to a string
    pub fn render(&self, result_set: &ResultSet) -> String {
        match self.config.format {
            OutputFormat::Jsonl => self.render_jsonl(result_set),
            OutputFormat::Json => self.render_json(result_set),
            OutputFormat::Markdown => self.render_markdown(result_set),
        }
    }

    /// Render as JSON Lines (one JSON object per line)
    fn render_jsonl(&self, result_set: &ResultSet) -> String {
        result_set
            .items
            .iter()
            .filter_map(|item| {
                if self.config.pretty {
                    serde_json::to_string_pretty(item).ok()
                } else {
                    serde_json::to_string(item).ok()
                }
            })
            .collect::<Vec<_>>()
            .join(if self.config.pretty { "\n\n" } else { "\n" })
    }

    /// Render as a single JSON array
    fn render_json(&self, result_set: &ResultSet) -> String {
        let rendered = if self.config.pretty {
            serde_json::to_string_pretty(&result_set.items)
        } else {
            serde_json::to_string(&result_set.items)
        };
        rendered.unwrap_or_else(|_| "[]".to_string())
    }

    /// Render as Markdown, grouped by kind
    fn render_markdown(&self, result_set: &ResultSet) -> String {
        let sections = [
            (Kind::Stats, "Cache"),
            (Kind::Entry, "Entries"),
            (Kind::Key, "Keys"),
            (Kind::Audio, "Audio"),
            (Kind::Maintenance, "Maintenance"),
            (Kind::Tool, "Tools"),
        ];

        let mut output = String::new();
        for (kind, title) in sections {
            let items: Vec<_> = result_set
                .items
                .iter()
                .filter(|item| item.kind == kind)
                .collect();
            if items.is_empty() {
                continue;
            }

            output.push_str(&format!("## {}\n\n", title));
            for item in items {
                render_item_md(&mut output, item);
            }
            output.push('\n');
        }

        output
    }
}

fn render_item_md(output: &mut String, item: &ResultItem) {
    output.push('-');
    if let Some(key) = &item.key {
        output.push_str(&format!(" `{}`", key));
    }
    if let Some(summary) = &item.summary {
        output.push_str(&format!(" {}", summary));
    }
    if let Some(path) = &item.path {
        output.push_str(&format!(" ({})", path));
    }
    output.push('\n');

    for error in &item.errors {
        output.push_str(&format!("  - **{}**: {}\n", error.code, error.message));
    }
}
