// src/tokenizer/parallelism.rs
//
// Iterators that run on rayon or serially, decided at call time.

use rayon::prelude::*;
use rayon_cond::CondIterator;

pub trait MaybeParallelIterator<P, S>
where
    P: ParallelIterator,
    S: Iterator<Item = P::Item>,
{
    /// Parallel when `parallel` is true, a plain iterator otherwise.
    fn into_maybe_par_iter_cond(self, parallel: bool) -> CondIterator<P, S>;
}

impl<P, S, I> MaybeParallelIterator<P, S> for I
where
    I: IntoParallelIterator<Iter = P, Item = P::Item> + IntoIterator<IntoIter = S, Item = S::Item>,
    P: ParallelIterator,
    S: Iterator<Item = P::Item>,
{
    fn into_maybe_par_iter_cond(self, parallel: bool) -> CondIterator<P, S> {
        CondIterator::new(self, parallel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_modes_preserve_order() {
        let items: Vec<u32> = (0..100).collect();
        for parallel in [false, true] {
            let doubled: Vec<u32> = items
                .clone()
                .into_maybe_par_iter_cond(parallel)
                .map(|x| x * 2)
                .collect();
            assert_eq!(doubled, (0..100).map(|x| x * 2).collect::<Vec<_>>());
        }
    }
}
