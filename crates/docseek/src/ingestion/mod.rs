//! Document ingestion pipeline with multi-format extraction

mod chunker;
pub mod external_parser;
mod parser;
mod processor;
pub mod text;

pub use chunker::{estimate_tokens, split_sentences, SemanticChunker};
pub use external_parser::{ExternalTools, ExternalToolsConfig, ToolStatus};
pub use parser::{xml_to_value, FileParser};
pub use processor::{
    IngestPipeline, PreparedDocument, KEY_DOCUMENT, KEY_FRAGMENT_TEXT, KEY_ID, KEY_ORIGINAL_TEXT,
};
