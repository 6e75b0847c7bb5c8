//! Filesystem stand-in for the editor: files named on the command line act as
//! the open tabs, one of them is active, and an optional line range is the
//! selection.

use async_trait::async_trait;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use crate::context::{Document, EditorHost, OpenTab, Selection};

#[derive(Debug, Clone, Default)]
pub struct WorkspaceEditor {
    open_files: Vec<PathBuf>,
    active: Option<PathBuf>,
    /// 1-based, inclusive line range within the active file.
    selection: Option<RangeInclusive<usize>>,
}

impl WorkspaceEditor {
    pub fn new(open_files: Vec<PathBuf>) -> Self {
        let active = open_files.first().cloned();
        Self {
            open_files,
            active,
            selection: None,
        }
    }

    pub fn with_active(mut self, path: PathBuf) -> Self {
        if !self.open_files.contains(&path) {
            self.open_files.push(path.clone());
        }
        self.active = Some(path);
        self
    }

    pub fn with_selection(mut self, lines: RangeInclusive<usize>) -> Self {
        self.selection = Some(lines);
        self
    }

    fn active_text(&self) -> Option<(PathBuf, String)> {
        let path = self.active.clone()?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Some((path, text)),
            Err(e) => {
                tracing::warn!("Cannot read active file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn selected_span(&self, text: &str) -> Option<(usize, usize)> {
        let range = self.selection.as_ref()?;
        let lines: Vec<&str> = text.lines().collect();
        let start = range.start().saturating_sub(1);
        let end = (*range.end()).min(lines.len());
        (start < end).then_some((start, end))
    }
}

/// Parse `A-B` (or a single line `A`) into a 1-based inclusive range.
pub fn parse_line_range(spec: &str) -> Result<RangeInclusive<usize>, String> {
    let (start, end) = match spec.split_once('-') {
        Some((a, b)) => (a.trim(), b.trim()),
        None => (spec.trim(), spec.trim()),
    };
    let start: usize = start
        .parse()
        .map_err(|_| format!("invalid line number '{}'", start))?;
    let end: usize = end
        .parse()
        .map_err(|_| format!("invalid line number '{}'", end))?;
    if start == 0 || end < start {
        return Err(format!("invalid line range '{}'", spec));
    }
    Ok(start..=end)
}

/// Editor language identifier for a path, by extension.
pub fn language_id(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "javascriptreact",
        "ts" => "typescript",
        "tsx" => "typescriptreact",
        "html" | "htm" => "html",
        "css" => "css",
        "json" => "json",
        "md" => "markdown",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "sh" => "shellscript",
        "yaml" | "yml" => "yaml",
        _ => "plaintext",
    }
}

#[async_trait]
impl EditorHost for WorkspaceEditor {
    fn selection(&self) -> Option<Selection> {
        let (path, text) = self.active_text()?;
        let (start, end) = self.selected_span(&text)?;
        let lines: Vec<&str> = text.lines().collect();
        Some(Selection {
            text: lines[start..end].join("\n"),
            language_id: language_id(&path).to_string(),
            end_line_text: lines[end - 1].to_string(),
        })
    }

    fn active_document(&self) -> Option<Document> {
        let (path, text) = self.active_text()?;
        Some(Document {
            language_id: language_id(&path).to_string(),
            path: Some(path),
            text,
        })
    }

    fn open_tabs(&self) -> Vec<OpenTab> {
        self.open_files
            .iter()
            .map(|path| OpenTab {
                label: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path: path.is_file().then(|| path.clone()),
            })
            .collect()
    }

    async fn read_file(&self, path: &Path) -> std::io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn replace_selection(&self, text: &str) -> std::io::Result<()> {
        let Some(path) = self.active.as_ref() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no active file",
            ));
        };
        let original = tokio::fs::read_to_string(path).await?;
        let lines: Vec<&str> = original.lines().collect();

        let updated = match self.selected_span(&original) {
            Some((start, end)) => {
                let mut out: Vec<&str> = lines[..start].to_vec();
                out.push(text);
                out.extend_from_slice(&lines[end..]);
                out.join("\n")
            }
            None => format!("{}{}", original, text),
        };
        let trailing = if original.ends_with('\n') && !updated.ends_with('\n') {
            "\n"
        } else {
            ""
        };
        tokio::fs::write(path, format!("{}{}", updated, trailing)).await
    }
}
