//! Top-K selection of scored responses
//!
//! Picking the best K of N responses with a bounded heap is O(N log K)
//! instead of sorting all N.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::experiment::{MetricRecord, Repository, ResponseRecord};
use crate::Result;

/// Sort order for Top-K selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending order (smallest K values)
    Ascending,
    /// Descending order (largest K values)
    Descending,
}

/// A response together with its metric.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResponse {
    /// The response.
    pub response: ResponseRecord,
    /// Its quality assessment.
    pub metric: MetricRecord,
}

impl RankedResponse {
    /// Overall quality of the response.
    #[must_use]
    pub const fn overall_quality(&self) -> f64 {
        self.metric.overall_quality()
    }
}

/// Select the `k` items with the largest (or smallest) `score`.
///
/// Ties keep input order. The result is sorted best first for the requested
/// order.
///
/// # Examples
///
/// ```rust
/// use gridlab::rank::{top_k_by, SortOrder};
///
/// let best = top_k_by(vec![0.2, 0.9, 0.5, 0.7], 2, SortOrder::Descending, |v| *v);
/// assert_eq!(best, vec![0.9, 0.7]);
/// ```
pub fn top_k_by<T, I, F>(items: I, k: usize, order: SortOrder, score: F) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> f64,
{
    if k == 0 {
        return Vec::new();
    }

    match order {
        SortOrder::Descending => {
            let mut heap: BinaryHeap<MinHeapItem<T>> = BinaryHeap::with_capacity(k);
            for (index, item) in items.into_iter().enumerate() {
                let value = score(&item);
                if heap.len() < k {
                    heap.push(MinHeapItem { value, index, item });
                } else if let Some(top) = heap.peek() {
                    if value.total_cmp(&top.value) == Ordering::Greater {
                        heap.pop();
                        heap.push(MinHeapItem { value, index, item });
                    }
                }
            }
            let mut result = heap.into_vec();
            result.sort_by(|a, b| b.value.total_cmp(&a.value).then(a.index.cmp(&b.index)));
            result.into_iter().map(|entry| entry.item).collect()
        }
        SortOrder::Ascending => {
            let mut heap: BinaryHeap<MaxHeapItem<T>> = BinaryHeap::with_capacity(k);
            for (index, item) in items.into_iter().enumerate() {
                let value = score(&item);
                if heap.len() < k {
                    heap.push(MaxHeapItem { value, index, item });
                } else if let Some(top) = heap.peek() {
                    if value.total_cmp(&top.value) == Ordering::Less {
                        heap.pop();
                        heap.push(MaxHeapItem { value, index, item });
                    }
                }
            }
            let mut result = heap.into_vec();
            result.sort_by(|a, b| a.value.total_cmp(&b.value).then(a.index.cmp(&b.index)));
            result.into_iter().map(|entry| entry.item).collect()
        }
    }
}

/// The `k` highest-quality responses of a run, best first.
///
/// Responses without a metric are skipped.
///
/// # Errors
///
/// Returns [`crate::Error::NotFound`] if the run does not exist.
pub async fn best_responses<R: Repository>(
    repository: &R,
    run_id: &str,
    k: usize,
) -> Result<Vec<RankedResponse>> {
    repository.get_run(run_id).await?;

    let mut scored = Vec::new();
    for response in repository.list_responses(run_id).await? {
        if let Some(metric) = repository.get_metric(response.response_id()).await? {
            scored.push(RankedResponse { response, metric });
        }
    }

    Ok(top_k_by(
        scored,
        k,
        SortOrder::Descending,
        RankedResponse::overall_quality,
    ))
}

// Heap entries order by value, then by reversed input position so that among
// equal values the later item is evicted first.

struct MinHeapItem<T> {
    value: f64,
    index: usize,
    item: T,
}

impl<T> PartialEq for MinHeapItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for MinHeapItem<T> {}

impl<T> Ord for MinHeapItem<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for min-heap (smallest at top)
        other
            .value
            .total_cmp(&self.value)
            .then(self.index.cmp(&other.index))
    }
}

impl<T> PartialOrd for MinHeapItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct MaxHeapItem<T> {
    value: f64,
    index: usize,
    item: T,
}

impl<T> PartialEq for MaxHeapItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for MaxHeapItem<T> {}

impl<T> Ord for MaxHeapItem<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then(self.index.cmp(&other.index))
    }
}

impl<T> PartialOrd for MaxHeapItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
