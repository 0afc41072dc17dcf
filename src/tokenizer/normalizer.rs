// src/tokenizer/normalizer.rs
//
// Text normalization applied before segmentation. The trainer learned its scores
// on NFKC text where whitespace is spelled with the meta symbol, so encode has
// to see the same shape.

use unicode_normalization::{is_nfkc_quick, IsNormalized, UnicodeNormalization};

/// Word-start marker standing in for whitespace inside pieces.
pub const META_SYMBOL: char = '\u{2581}';

pub trait Normalizer {
    fn normalize(&self, text: &str) -> String;
}

/// Unicode compatibility composition (NFKC).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Nfkc;

impl Normalizer for Nfkc {
    fn normalize(&self, text: &str) -> String {
        match is_nfkc_quick(text.chars()) {
            IsNormalized::Yes => text.to_string(),
            _ => text.nfkc().collect(),
        }
    }
}

/// Collapses whitespace runs into a single meta symbol in front of the next word.
///
/// Leading and trailing whitespace is dropped. With `add_prefix_space` the first
/// word also gets a meta symbol, so every word starts with one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MetaSpace {
    pub add_prefix_space: bool,
}

impl Default for MetaSpace {
    fn default() -> Self {
        Self {
            add_prefix_space: true,
        }
    }
}

impl Normalizer for MetaSpace {
    fn normalize(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + META_SYMBOL.len_utf8());
        let mut pending_space = self.add_prefix_space;
        for word in text.split(char::is_whitespace).filter(|w| !w.is_empty()) {
            if pending_space {
                out.push(META_SYMBOL);
            }
            out.push_str(word);
            pending_space = true;
        }
        out
    }
}

/// The full pipeline used by encode: NFKC, then meta-symbol whitespace.
pub fn normalize(text: &str) -> String {
    MetaSpace::default().normalize(&Nfkc.normalize(text))
}
