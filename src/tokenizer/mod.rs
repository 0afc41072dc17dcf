// src/tokenizer/mod.rs

pub mod batch;
pub mod combiner;
pub mod config;
pub mod decoder;
pub mod normalizer;
pub mod parallelism;
mod progress;
pub mod result;
pub mod segmenter;
pub mod stream;
pub mod vocab;

pub use batch::BatchExecutor;
pub use combiner::{combine, combine_files, VocabCombiner};
pub use config::{TokenFormat, TokenizerConfig, TokenizerConfigBuilder};
pub use decoder::DecodePolicy;
pub use normalizer::META_SYMBOL;
pub use result::{Error, Result};
pub use segmenter::{EncodedPiece, Segmenter};
pub use vocab::{Piece, PieceKind, Vocabulary};

/// What a batch executor needs from a tokenizer model. Implementations are
/// shared read-only across worker threads.
pub trait Model: Send + Sync {
    fn encode_as_pieces(&self, text: &str) -> Vec<String>;

    fn encode_as_ids(&self, text: &str) -> Result<Vec<u32>>;

    fn decode_ids(&self, ids: &[u32]) -> Result<String>;

    fn decode_pieces(&self, pieces: &[String]) -> Result<String>;

    fn vocab_size(&self) -> usize;
}
