pub mod document;
pub mod system_prompts;
pub mod text_chunk;
