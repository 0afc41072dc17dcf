//! Subword tokenization over a score-annotated piece vocabulary.
//!
//! A [`Vocabulary`] is loaded from `surface<TAB>score` lines, a [`Segmenter`]
//! finds the highest-scoring piece sequence for a text (falling back to
//! `<0xHH>` byte pieces), and a [`BatchExecutor`] runs either direction over
//! many inputs on a worker pool. [`VocabCombiner`] merges vocabulary files.

pub mod tokenizer;

pub use tokenizer::{
    BatchExecutor, DecodePolicy, EncodedPiece, Error, Model, Result, Segmenter, TokenFormat,
    TokenizerConfig, VocabCombiner, Vocabulary,
};
