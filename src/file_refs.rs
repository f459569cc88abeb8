//! Embedded file blocks in message text
//!
//! Prompts embed project files as
//!
//! ```text
//! **{ src/app.py }**
//! ```
//! <file content>
//! ```
//! ```
//!
//! A block is a marker line that is exactly `**{ <path> }**`, a line that is
//! exactly the fence, and a body that runs until the first following line that
//! is exactly the fence. Paths match by string equality only. A fence inside
//! the body that carries anything else on its line (` ```python `, indented
//! fences) does not close the block.

use crate::llm::{Message, Role};
use serde::{Deserialize, Serialize};

const FENCE: &str = "```";

/// A project file as seen by the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub path: String,
    pub content: String,
}

impl ProjectFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Marker line introducing the block for `path`
pub fn file_marker(path: &str) -> String {
    format!("**{{ {path} }}**")
}

/// Render a complete block for `path` holding `content`
pub fn file_block(path: &str, content: &str) -> String {
    format!("{}\n{FENCE}\n{content}\n{FENCE}", file_marker(path))
}

/// Replace the body of every block tagged with `file_path`.
///
/// Returns the rewritten text and the number of blocks replaced. With zero
/// replacements the input comes back unchanged.
pub fn replace_file_content(message: &str, file_path: &str, new_content: &str) -> (String, usize) {
    let marker = file_marker(file_path);
    let lines: Vec<&str> = message.split_inclusive('\n').collect();

    let mut out = String::with_capacity(message.len());
    let mut replaced = 0;
    let mut i = 0;
    while i < lines.len() {
        match block_end(&lines, i, &marker) {
            Some(close) => {
                out.push_str(&file_block(file_path, new_content));
                if lines[close].ends_with('\n') {
                    out.push('\n');
                }
                replaced += 1;
                i = close + 1;
            }
            None => {
                out.push_str(lines[i]);
                i += 1;
            }
        }
    }

    if replaced == 0 {
        return (message.to_string(), 0);
    }
    (out, replaced)
}

/// Index of the closing fence if a block for `marker` starts at `start`
fn block_end(lines: &[&str], start: usize, marker: &str) -> Option<usize> {
    if line_text(lines[start]) != marker || line_text(lines.get(start + 1)?) != FENCE {
        return None;
    }
    (start + 2..lines.len()).find(|&j| line_text(lines[j]) == FENCE)
}

fn line_text(line: &str) -> &str {
    line.strip_suffix('\n').unwrap_or(line)
}

/// Refresh every file block in `user` messages with current file contents.
///
/// Returns the total number of blocks replaced.
pub fn rewrite_file_refs(messages: &mut [Message], files: &[ProjectFile]) -> usize {
    let mut total = 0;
    for msg in messages.iter_mut().filter(|m| m.role == Role::User) {
        for file in files {
            let (updated, count) = replace_file_content(&msg.content, &file.path, &file.content);
            if count > 0 {
                msg.content = updated;
                total += count;
            }
        }
    }
    total
}
