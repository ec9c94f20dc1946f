use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A raw document read from the source directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub file_name: String,
    pub path: PathBuf,
    pub mime_type: String,
    pub text: String,
}

impl Document {
    pub fn new(file_name: String, path: PathBuf, mime_type: String, text: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_name,
            path,
            mime_type,
            text,
        }
    }

    pub fn is_markdown(&self) -> bool {
        self.mime_type == "text/markdown" || self.mime_type == "text/x-markdown"
    }
}
