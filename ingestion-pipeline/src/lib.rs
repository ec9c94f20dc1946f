#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod chunking;
pub mod utils;

pub use chunking::{split_document, ChunkingConfig};
pub use utils::file_text_extraction::{read_documents, source_is_ready};
