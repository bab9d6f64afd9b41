//! Persistent message history: paged reads for hydrating a conversation view.
//!
//! The engine itself is in-memory; history is the narrow interface to the
//! host's storage, used once when a view opens. [`FileHistory`] keeps one
//! JSONL file per conversation (one message per line, append order = display
//! order), which is all the CLI host needs.

use crate::message::Message;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Messages loaded per page when hydrating (the host app loads up to 10k per
/// conversation in one page).
pub const DEFAULT_PAGE_SIZE: usize = 10_000;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("invalid conversation id: {0:?}")]
    InvalidConversationId(String),
    #[error("history I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Bounded page read of a conversation's persisted messages, oldest first.
pub trait HistoryStore {
    fn page(
        &self,
        conversation_id: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Message>, HistoryError>;
}

/// One `<conversation_id>.jsonl` file per conversation under `dir`.
pub struct FileHistory {
    dir: PathBuf,
}

impl FileHistory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, conversation_id: &str) -> Result<PathBuf, HistoryError> {
        let id = conversation_id.trim();
        if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
            return Err(HistoryError::InvalidConversationId(
                conversation_id.to_string(),
            ));
        }
        Ok(self.dir.join(format!("{id}.jsonl")))
    }

    /// Append one committed message to the conversation's file, creating the
    /// directory and file as needed.
    pub fn append(&self, conversation_id: &str, message: &Message) -> Result<(), HistoryError> {
        let path = self.path_for(conversation_id)?;
        fs::create_dir_all(&self.dir)?;
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(message)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Overwrite the conversation's file with a full committed transcript.
    pub fn replace(&self, conversation_id: &str, messages: &[Message]) -> Result<(), HistoryError> {
        let path = self.path_for(conversation_id)?;
        fs::create_dir_all(&self.dir)?;
        let mut out = String::new();
        for msg in messages {
            out.push_str(&serde_json::to_string(msg)?);
            out.push('\n');
        }
        fs::write(path, out)?;
        Ok(())
    }
}

impl HistoryStore for FileHistory {
    fn page(
        &self,
        conversation_id: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Message>, HistoryError> {
        let path = self.path_for(conversation_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let skip = page.saturating_mul(page_size);
        let reader = BufReader::new(fs::File::open(&path)?);
        let mut seen = 0usize;
        let mut out = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let msg: Message = match serde_json::from_str(&line) {
                Ok(m) => m,
                Err(e) => {
                    log::warn!(
                        "skipping malformed history line {} in {}: {}",
                        lineno + 1,
                        path.display(),
                        e
                    );
                    continue;
                }
            };
            if seen >= skip {
                out.push(msg);
                if out.len() >= page_size {
                    break;
                }
            }
            seen += 1;
        }
        Ok(out)
    }
}
