use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A passage of a [`Document`](super::document::Document), the unit that gets embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextChunk {
    pub id: String,
    pub document_id: String,
    pub file_name: String,
    pub chunk: String,
}

impl TextChunk {
    pub fn new(document_id: String, file_name: String, chunk: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id,
            file_name,
            chunk,
        }
    }
}
