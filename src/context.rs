//! Source material attached to a prompt, read from the student's editor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::Settings;

const FENCE: &str = "```";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    Selection,
    WholeFile,
    #[serde(alias = "all_opened_files")]
    AllOpenFiles,
}

impl std::str::FromStr for ContextKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "selection" => Ok(ContextKind::Selection),
            "whole_file" | "whole-file" => Ok(ContextKind::WholeFile),
            "all_open_files" | "all-open-files" | "all_opened_files" => {
                Ok(ContextKind::AllOpenFiles)
            }
            other => Err(format!("unknown context kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub text: String,
    pub language_id: String,
    /// Full text of the line the selection ends on.
    pub end_line_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: Option<PathBuf>,
    pub text: String,
    pub language_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenTab {
    pub label: String,
    /// `None` for tabs that are not backed by a file on disk.
    pub path: Option<PathBuf>,
}

/// Read access to the editor plus the one write the controller forwards.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EditorHost: Send + Sync {
    fn selection(&self) -> Option<Selection>;

    fn active_document(&self) -> Option<Document>;

    /// Tabs across every tab group, in display order.
    fn open_tabs(&self) -> Vec<OpenTab>;

    async fn read_file(&self, path: &Path) -> std::io::Result<String>;

    async fn replace_selection(&self, text: &str) -> std::io::Result<()>;
}

/// Produce the context blob for `kind`. Empty when there is nothing to attach.
pub async fn extract(kind: ContextKind, editor: &dyn EditorHost, settings: &Settings) -> String {
    match kind {
        ContextKind::Selection => match editor.selection() {
            Some(selection) if !selection.text.is_empty() => {
                fence(&selection.text, &selection.language_id, settings)
            }
            _ => String::new(),
        },
        ContextKind::WholeFile => match editor.active_document() {
            Some(doc) => fence(&doc.text, &doc.language_id, settings),
            None => String::new(),
        },
        ContextKind::AllOpenFiles => merge_open_files(editor).await,
    }
}

fn fence(text: &str, language_id: &str, settings: &Settings) -> String {
    if !settings.selected_inside_codeblock {
        return text.to_string();
    }
    let language = if settings.codeblock_with_language_id {
        language_id
    } else {
        ""
    };
    format!("{FENCE}{language}\n{text}\n{FENCE}")
}

/// Every file-backed open tab as `## <path>` followed by a fenced copy of its content.
pub async fn merge_open_files(editor: &dyn EditorHost) -> String {
    let mut merged = String::new();
    for tab in editor.open_tabs() {
        let Some(path) = tab.path else {
            tracing::debug!("Skipping tab '{}' without a backing file", tab.label);
            continue;
        };
        match editor.read_file(&path).await {
            Ok(content) => {
                merged.push_str(&format!(
                    "## {}\n{FENCE}\n{}\n{FENCE}\n",
                    path.display(),
                    content
                ));
            }
            Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
        }
    }
    merged
}

/// Trim `code` and indent its continuation lines to match the selection's last line.
pub fn reindent(code: &str, end_line_text: &str) -> String {
    let indent: String = end_line_text
        .chars()
        .take_while(|c| c.is_whitespace())
        .collect();
    code.trim()
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect::<Vec<_>>()
        .join(&format!("\n{indent}"))
}
