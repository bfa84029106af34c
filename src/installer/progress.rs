// src/installer/progress.rs

//! Helper output classification
//!
//! The helper mixes three kinds of lines on stdout: JSON progress records
//! (`{"percentage":40, "message":"..."}`), DebConf questions, and plain
//! package manager output. Progress records may arrive quoted and escaped
//! when the helper's logger wraps them.

use serde::Deserialize;

#[derive(Deserialize)]
struct ProgressRecord {
    percentage: u32,
    #[serde(default)]
    message: String,
}

/// One classified output line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Progress { percentage: u32, message: String },
    /// The line shows this DebConf template description
    DebConfPrompt(String),
    Text(String),
}

/// Classifies helper output for one run
#[derive(Debug, Clone, Default)]
pub struct OutputParser {
    templates: Vec<String>,
}

impl OutputParser {
    pub fn new(templates: Vec<String>) -> Self {
        Self { templates }
    }

    pub fn classify(&self, line: &str) -> OutputLine {
        if let Some(record) = parse_progress(line) {
            return OutputLine::Progress {
                percentage: record.percentage.min(100),
                message: record.message,
            };
        }

        if let Some(template) = self.templates.iter().find(|t| line.contains(t.as_str())) {
            return OutputLine::DebConfPrompt(template.clone());
        }

        OutputLine::Text(line.to_string())
    }
}

fn parse_progress(line: &str) -> Option<ProgressRecord> {
    let line = line.trim();

    // Logger-quoted: "{\"percentage\":10, ...}"
    if line.starts_with('"')
        && line.ends_with('"')
        && let Ok(unquoted) = serde_json::from_str::<String>(line)
    {
        return parse_progress(&unquoted);
    }

    let start = line.find('{')?;
    let end = line.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&line[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_lines() {
        let parser = OutputParser::default();
        assert_eq!(
            parser.classify(r#"{"percentage":40, "message":"Downloading"}"#),
            OutputLine::Progress {
                percentage: 40,
                message: "Downloading".to_string()
            }
        );
        assert_eq!(
            parser.classify(r#""{\"percentage\":100, \"message\":\"Done\"}""#),
            OutputLine::Progress {
                percentage: 100,
                message: "Done".to_string()
            }
        );
    }

    #[test]
    fn test_debconf_prompt() {
        let parser = OutputParser::new(vec!["Do you accept the license?".to_string()]);
        assert_eq!(
            parser.classify("Package configuration: Do you accept the license? [yes/no]"),
            OutputLine::DebConfPrompt("Do you accept the license?".to_string())
        );
    }

    #[test]
    fn test_plain_text() {
        let parser = OutputParser::default();
        assert_eq!(
            parser.classify("Setting up foo (1.0) ..."),
            OutputLine::Text("Setting up foo (1.0) ...".to_string())
        );
        assert_eq!(parser.classify("{not json}"), OutputLine::Text("{not json}".to_string()));
    }
}
