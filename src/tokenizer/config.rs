// src/tokenizer/config.rs

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::tokenizer::decoder::DecodePolicy;
use crate::tokenizer::Result;

/// Hardware concurrency, read when a config is built. Falls back to 1.
pub fn default_num_threads() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Settings for a batch-capable tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Path to a `surface<TAB>score` vocabulary file.
    pub vocab: PathBuf,
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
    #[serde(default)]
    pub decode_errors: DecodePolicy,
}

impl TokenizerConfig {
    pub fn new<P: Into<PathBuf>>(vocab: P) -> Self {
        Self::builder(vocab).build()
    }

    pub fn builder<P: Into<PathBuf>>(vocab: P) -> TokenizerConfigBuilder {
        TokenizerConfigBuilder::new(vocab)
    }

    /// Reads a config such as `{"vocab": "bpe.vocab", "num_threads": 4}`.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut config: TokenizerConfig = serde_json::from_reader(BufReader::new(file))?;
        config.num_threads = config.num_threads.max(1);
        Ok(config)
    }
}

pub struct TokenizerConfigBuilder {
    config: TokenizerConfig,
}

impl TokenizerConfigBuilder {
    pub fn new<P: Into<PathBuf>>(vocab: P) -> Self {
        Self {
            config: TokenizerConfig {
                vocab: vocab.into(),
                num_threads: default_num_threads(),
                decode_errors: DecodePolicy::default(),
            },
        }
    }

    /// Worker count for batch calls; 0 is treated as 1.
    #[must_use]
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.config.num_threads = num_threads.max(1);
        self
    }

    #[must_use]
    pub fn decode_errors(mut self, policy: DecodePolicy) -> Self {
        self.config.decode_errors = policy;
        self
    }

    pub fn build(self) -> TokenizerConfig {
        self.config
    }
}

/// How tokens are spelled in an encode/decode stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenFormat {
    #[default]
    Piece,
    Id,
}

impl FromStr for TokenFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "piece" => Ok(Self::Piece),
            "id" => Ok(Self::Id),
            _ => Err(format!("invalid token format: {s:?} (expected \"piece\" or \"id\")")),
        }
    }
}

impl fmt::Display for TokenFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Piece => f.write_str("piece"),
            Self::Id => f.write_str("id"),
        }
    }
}
