//! Doctor - External tool checks

use anyhow::Result;
use serde_json::json;

use crate::backends::download::YtDlp;
use crate::backends::transcriber::{whisper_cpp_binary, TranscriberBackend};
use crate::config::ToolConfig;
use crate::core::model::{Issue, Kind, ResultItem, ResultSet};
use crate::core::render::{RenderConfig, Renderer};
use crate::core::util::command_exists;

/// Tool status
#[derive(Debug, Clone)]
pub struct ToolStatus {
    pub name: String,
    pub available: bool,
    pub command: Option<String>,
    pub required: bool,
    pub notes: Option<String>,
}

impl ToolStatus {
    pub fn to_result_item(&self) -> ResultItem {
        let status = if self.available { "✓" } else { "✗" };
        let required = if self.required {
            "required"
        } else {
            "optional"
        };

        let mut item = ResultItem::new(Kind::Tool)
            .with_summary(format!("{} {} ({})", status, self.name, required))
            .with_data(json!({
                "available": self.available,
                "required": self.required,
                "notes": self.notes,
            }));
        if let Some(command) = &self.command {
            item = item.with_path(command.clone());
        }

        if !self.available && self.required {
            item = item.with_error(Issue::new(
                "MISSING_DEPENDENCY",
                format!("{} is required but not found", self.name),
            ));
        }

        item
    }
}

/// Check every external tool the service can use
pub fn check_tools(tools: &ToolConfig) -> Vec<ToolStatus> {
    let mut statuses = Vec::new();

    let downloader = YtDlp::new(tools.downloader.clone());
    let downloader_ok = downloader.is_available();
    statuses.push(ToolStatus {
        name: "yt-dlp".to_string(),
        available: downloader_ok,
        command: downloader_ok.then(|| tools.downloader.clone()),
        required: true,
        notes: Some("Install: pipx install yt-dlp / brew install yt-dlp".to_string()),
    });

    let ffmpeg_ok = command_exists("ffmpeg");
    statuses.push(ToolStatus {
        name: "ffmpeg".to_string(),
        available: ffmpeg_ok,
        command: ffmpeg_ok.then(|| "ffmpeg".to_string()),
        required: true,
        notes: Some("Needed by yt-dlp to extract audio".to_string()),
    });

    let binary = whisper_cpp_binary(&tools.whisper_cpp_dir);
    let cpp_ok = tools.use_whisper_cpp && binary.is_file();
    statuses.push(ToolStatus {
        name: "whisper.cpp".to_string(),
        available: cpp_ok,
        command: cpp_ok.then(|| binary.to_string_lossy().to_string()),
        required: false,
        notes: Some("Preferred transcriber when built under --whisper-cpp-dir".to_string()),
    });

    let whisper_ok = command_exists(&tools.whisper);
    statuses.push(ToolStatus {
        name: "whisper".to_string(),
        available: whisper_ok,
        command: whisper_ok.then(|| tools.whisper.clone()),
        required: false,
        notes: Some("Fallback transcriber: pip install openai-whisper".to_string()),
    });

    statuses
}

/// Run the doctor command
pub fn run_doctor(tools: &ToolConfig, config: RenderConfig) -> Result<()> {
    let statuses = check_tools(tools);

    let mut result_set: ResultSet = statuses.iter().map(ToolStatus::to_result_item).collect();
    let selected = TranscriberBackend::select(tools);
    result_set.push(
        ResultItem::new(Kind::Tool)
            .with_summary(format!(
                "transcriber: {}",
                selected.as_ref().map_or("none", TranscriberBackend::name)
            ))
            .with_data(json!({ "selected": selected.as_ref().map(TranscriberBackend::name) })),
    );

    let renderer = Renderer::with_config(config);
    println!("{}", renderer.render(&result_set));

    if statuses.iter().any(|s| s.required && !s.available) {
        tracing::warn!("some required tools are missing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_tools_names() {
        let statuses = check_tools(&ToolConfig::default());
        let names: Vec<_> = statuses.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["yt-dlp", "ffmpeg", "whisper.cpp", "whisper"]);
    }

    #[test]
    fn test_missing_required_tool_reports_error() {
        let status = ToolStatus {
            name: "yt-dlp".to_string(),
            available: false,
            command: None,
            required: true,
            notes: None,
        };
        let item = status.to_result_item();
        assert_eq!(item.kind, Kind::Tool);
        assert_eq!(item.errors[0].code, "MISSING_DEPENDENCY");
        assert!(item.summary.unwrap().contains("✗ yt-dlp"));
    }

    #[test]
    fn test_missing_optional_tool_is_not_error() {
        let status = ToolStatus {
            name: "whisper".to_string(),
            available: false,
            command: None,
            required: false,
            notes: None,
        };
        assert!(status.to_result_item().errors.is_empty());
    }
}
