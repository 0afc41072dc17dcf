// src/tokenizer/batch.rs

use std::sync::Arc;

use log::debug;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::tokenizer::config::default_num_threads;
use crate::tokenizer::parallelism::MaybeParallelIterator;
use crate::tokenizer::{Error, Model, Result, Segmenter, TokenizerConfig};

/// Runs a model over collections of inputs on a bounded worker pool.
///
/// `output[i]` always belongs to `input[i]`. The model is shared read-only by
/// every worker. The first failing item aborts the batch and is reported as
/// `Error::Batch`; partial results are dropped.
pub struct BatchExecutor<M = Segmenter> {
    model: Arc<M>,
    /// `None` when a single worker was requested; items then run inline.
    pool: Option<ThreadPool>,
    num_threads: usize,
}

impl<M: Model> BatchExecutor<M> {
    pub fn new(model: M, num_threads: usize) -> Result<Self> {
        Self::from_shared(Arc::new(model), num_threads)
    }

    /// Uses one worker per available hardware thread.
    pub fn with_default_threads(model: M) -> Result<Self> {
        Self::new(model, default_num_threads())
    }

    pub fn from_shared(model: Arc<M>, num_threads: usize) -> Result<Self> {
        let num_threads = num_threads.max(1);
        let pool = if num_threads > 1 {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .thread_name(|i| format!("ssentencepiece-worker-{i}"))
                    .build()?,
            )
        } else {
            None
        };
        Ok(Self {
            model,
            pool,
            num_threads,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce(bool) -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(|| op(true)),
            None => op(false),
        }
    }

    fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        debug!("batch of {} items on {} workers", items.len(), self.num_threads);
        self.install(|parallel| {
            (0..items.len())
                .into_maybe_par_iter_cond(parallel && items.len() > 1)
                .map(|index| f(&items[index]))
                .collect()
        })
    }

    fn try_map<T, R, F>(&self, items: &[T], f: F) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> Result<R> + Sync + Send,
    {
        debug!("batch of {} items on {} workers", items.len(), self.num_threads);
        self.install(|parallel| {
            (0..items.len())
                .into_maybe_par_iter_cond(parallel && items.len() > 1)
                .map(|index| {
                    f(&items[index]).map_err(|source| Error::Batch {
                        index,
                        source: Box::new(source),
                    })
                })
                .collect()
        })
    }

    pub fn encode_batch_as_pieces<S>(&self, texts: &[S]) -> Vec<Vec<String>>
    where
        S: AsRef<str> + Sync,
    {
        self.map(texts, |text| self.model.encode_as_pieces(text.as_ref()))
    }

    pub fn encode_batch_as_ids<S>(&self, texts: &[S]) -> Result<Vec<Vec<u32>>>
    where
        S: AsRef<str> + Sync,
    {
        self.try_map(texts, |text| self.model.encode_as_ids(text.as_ref()))
    }

    pub fn decode_batch_ids<I>(&self, sequences: &[I]) -> Result<Vec<String>>
    where
        I: AsRef<[u32]> + Sync,
    {
        self.try_map(sequences, |ids| self.model.decode_ids(ids.as_ref()))
    }

    pub fn decode_batch_pieces<P>(&self, sequences: &[P]) -> Result<Vec<String>>
    where
        P: AsRef<[String]> + Sync,
    {
        self.try_map(sequences, |pieces| self.model.decode_pieces(pieces.as_ref()))
    }
}

impl BatchExecutor<Segmenter> {
    pub fn from_config(config: &TokenizerConfig) -> Result<Self> {
        Self::new(Segmenter::from_config(config)?, config.num_threads)
    }
}
