//! File operations: read, write, list, and single-occurrence patching.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs;

use crate::action::{Action, ActionKind, FileSubAction};
use crate::error::{Error, Result};
use crate::router::CapabilityHandler;

use super::unsupported;

/// Characters of file content returned by a read before truncation.
const MAX_READ_CHARS: usize = 4000;

/// Directory entries returned by a listing before truncation.
const MAX_LIST_ENTRIES: usize = 200;

/// Handles `file_op` actions against the local filesystem.
#[derive(Debug, Default)]
pub struct FileManager;

impl FileManager {
    pub fn new() -> Self {
        Self
    }

    async fn read(&self, path: &str) -> Result<String> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| Error::handler("file_op", format!("read {path}: {e}")))?;

        if content.chars().count() > MAX_READ_CHARS {
            let truncated: String = content.chars().take(MAX_READ_CHARS).collect();
            Ok(format!(
                "{truncated}\n... [truncated, {} chars total]",
                content.chars().count()
            ))
        } else {
            Ok(content)
        }
    }

    /// Write content, creating parent directories as needed.
    async fn write(&self, path: &str, content: &str) -> Result<String> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::handler("file_op", format!("mkdir {}: {e}", parent.display())))?;
            }
        }
        fs::write(path, content)
            .await
            .map_err(|e| Error::handler("file_op", format!("write {path}: {e}")))?;
        Ok(format!("wrote {} bytes to {path}", content.len()))
    }

    /// List directory entries, sorted by name.
    async fn list(&self, path: &str) -> Result<String> {
        let mut dir = fs::read_dir(path)
            .await
            .map_err(|e| Error::handler("file_op", format!("list {path}: {e}")))?;

        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| Error::handler("file_op", e.to_string()))?
        {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| Error::handler("file_op", e.to_string()))?;
            if file_type.is_dir() {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();

        if names.is_empty() {
            return Ok(format!("{path} is empty"));
        }
        let total = names.len();
        if total > MAX_LIST_ENTRIES {
            names.truncate(MAX_LIST_ENTRIES);
            names.push(format!("... [{total} entries total]"));
        }
        Ok(names.join("\n"))
    }

    /// Replace the first occurrence of `search` with `replace`.
    ///
    /// Works on the full file content; the read cap applies only to what
    /// the `read` sub-action displays.
    async fn patch(&self, path: &str, search: &str, replace: &str) -> Result<String> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| Error::handler("file_op", format!("read {path}: {e}")))?;
        if !content.contains(search) {
            return Err(Error::handler(
                "file_op",
                format!("search text not found in {path}"),
            ));
        }
        let patched = content.replacen(search, replace, 1);
        fs::write(path, patched)
            .await
            .map_err(|e| Error::handler("file_op", format!("write {path}: {e}")))?;
        Ok(format!("patched {path}"))
    }
}

#[async_trait]
impl CapabilityHandler for FileManager {
    async fn handle(&self, action: &Action) -> Result<String> {
        let ActionKind::FileOp {
            sub_action,
            path,
            content,
            search_text,
            replace_text,
        } = &action.kind
        else {
            return Err(unsupported(action.tag()));
        };

        match sub_action {
            FileSubAction::Read => self.read(path).await,
            FileSubAction::Write => {
                let content = content.as_deref().ok_or_else(|| {
                    Error::handler("file_op", "write requires a content field")
                })?;
                self.write(path, content).await
            }
            FileSubAction::List => self.list(path).await,
            FileSubAction::Patch => {
                let (search, replace) = match (search_text, replace_text) {
                    (Some(s), Some(r)) => (s, r),
                    _ => {
                        return Err(Error::handler(
                            "file_op",
                            "patch requires search_text and replace_text",
                        ))
                    }
                };
                self.patch(path, search, replace).await
            }
        }
    }
}
