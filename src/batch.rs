//! Batching helpers for bulk lookups.
//!
//! - [`chunk`] splits a slice into fixed-size groups, order preserved.
//! - [`batch_get`] resolves ids through a lookup map, fetching only the
//!   missing ones in a single bulk call and answering in request order.
//!   [`batch_fetch`] does the same without a map to keep.
//! - [`parallel_batch`] runs a per-item async operation with bounded
//!   concurrency.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use tracing::trace;

/// Default number of in-flight operations for [`parallel_batch`].
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Items that know their own lookup key (usually a row id).
pub trait Keyed {
    type Key: Eq + Hash + Clone;

    fn key(&self) -> Self::Key;
}

/// Split `items` into groups of `size`; the last group may be shorter.
///
/// A `size` of 0 is treated as 1.
///
/// ```rust
/// assert_eq!(stockade::chunk(&[1, 2, 3, 4, 5], 2), vec![vec![1, 2], vec![3, 4], vec![5]]);
/// ```
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}

/// Resolve `ids` through `cache`, fetching the missing ones with `fetcher`.
///
/// `fetcher` is called at most once, with each missing id exactly once, and
/// not at all when every id is already cached. Fetched items are merged into
/// `cache`. The result follows the order of `ids` (repeats included); ids the
/// fetcher did not return are left out rather than padded.
pub async fn batch_get<K, V, F, Fut, E>(
    ids: &[K],
    cache: &mut HashMap<K, V>,
    fetcher: F,
) -> Result<Vec<V>, E>
where
    K: Eq + Hash + Clone,
    V: Keyed<Key = K> + Clone,
    F: FnOnce(Vec<K>) -> Fut,
    Fut: Future<Output = Result<Vec<V>, E>>,
{
    let mut seen = HashSet::new();
    let missing: Vec<K> = ids
        .iter()
        .filter(|id| !cache.contains_key(*id) && seen.insert(*id))
        .cloned()
        .collect();

    if !missing.is_empty() {
        trace!(requested = ids.len(), missing = missing.len(), "fetching missing ids");
        for item in fetcher(missing).await? {
            cache.insert(item.key(), item);
        }
    }

    Ok(ids.iter().filter_map(|id| cache.get(id).cloned()).collect())
}

/// [`batch_get`] without a caller-held cache.
///
/// Ids are still deduplicated before the single `fetcher` call, and the
/// result follows the order of `ids`.
pub async fn batch_fetch<K, V, F, Fut, E>(ids: &[K], fetcher: F) -> Result<Vec<V>, E>
where
    K: Eq + Hash + Clone,
    V: Keyed<Key = K> + Clone,
    F: FnOnce(Vec<K>) -> Fut,
    Fut: Future<Output = Result<Vec<V>, E>>,
{
    let mut scratch = HashMap::new();
    batch_get(ids, &mut scratch, fetcher).await
}

/// Run `processor` over `items` with at most `concurrency` calls in flight.
///
/// Results come back in completion order, not input order. The first error
/// is returned and the operations still in flight are dropped. A
/// `concurrency` of 0 is treated as 1.
pub async fn parallel_batch<I, F, Fut, R, E>(
    items: I,
    concurrency: usize,
    processor: F,
) -> Result<Vec<R>, E>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    stream::iter(items)
        .map(processor)
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_empty() {
        assert!(chunk::<u8>(&[], 3).is_empty());
    }

    #[test]
    fn chunk_zero_size_is_one() {
        assert_eq!(chunk(&['a', 'b'], 0), vec![vec!['a'], vec!['b']]);
    }

    #[test]
    fn chunk_larger_than_input() {
        assert_eq!(chunk(&[1, 2], 10), vec![vec![1, 2]]);
    }
}
