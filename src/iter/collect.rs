//! Draining helpers
//!
//! `reduce` and `to_vec` consume the whole sequence and are only meant for
//! sequences the caller already knows to be bounded. User-facing paging goes
//! through `to_page`, which never pulls more than one item past the page.
//!
//! The `try_` variants work over `Result` items and stop at the first `Err`.

use serde::Serialize;

use super::adapters::Peekable;
use super::source::AsyncIter;

/// A bounded slice of a sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Whether the sequence continues after `items`
    pub has_more: bool,
}

/// Left fold over the whole sequence
pub async fn reduce<I, B, F>(mut iter: I, init: B, mut f: F) -> B
where
    I: AsyncIter,
    F: FnMut(B, I::Item) -> B,
{
    let mut acc = init;
    while let Some(item) = iter.next().await {
        acc = f(acc, item);
    }
    acc
}

/// Collects the whole sequence
pub async fn to_vec<I: AsyncIter>(iter: I) -> Vec<I::Item> {
    reduce(iter, Vec::new(), |mut acc, item| {
        acc.push(item);
        acc
    })
    .await
}

/// Pulls at most `page_size` items.
///
/// `has_more` is false only when exhaustion was observed. After a full page
/// the iterator is peeked, not consumed, so the next call continues exactly
/// where this one stopped. A zero page size peeks at nothing and reports
/// `has_more = true`.
pub async fn to_page<I: AsyncIter>(iter: &mut Peekable<I>, page_size: usize) -> Page<I::Item> {
    let mut items = Vec::new();
    if page_size == 0 {
        return Page {
            items,
            has_more: true,
        };
    }

    while items.len() < page_size {
        match iter.next().await {
            Some(item) => items.push(item),
            None => {
                return Page {
                    items,
                    has_more: false,
                }
            }
        }
    }

    let has_more = !iter.is_exhausted().await;
    Page { items, has_more }
}

/// Fallible left fold
pub async fn try_reduce<I, T, E, B, F>(mut iter: I, init: B, mut f: F) -> Result<B, E>
where
    I: AsyncIter<Item = Result<T, E>>,
    F: FnMut(B, T) -> B,
{
    let mut acc = init;
    while let Some(item) = iter.next().await {
        acc = f(acc, item?);
    }
    Ok(acc)
}

/// Fallible collect
pub async fn try_to_vec<I, T, E>(iter: I) -> Result<Vec<T>, E>
where
    I: AsyncIter<Item = Result<T, E>>,
{
    try_reduce(iter, Vec::new(), |mut acc, item| {
        acc.push(item);
        acc
    })
    .await
}

/// Fallible `to_page`.
///
/// An `Err` met while filling the page is returned. An `Err` met by the
/// boundary look-ahead belongs to the next page: it stays buffered, the current
/// page is returned with `has_more = true`, and the next call surfaces it.
pub async fn try_to_page<I, T, E>(iter: &mut Peekable<I>, page_size: usize) -> Result<Page<T>, E>
where
    I: AsyncIter<Item = Result<T, E>>,
    T: Send,
    E: Send,
{
    let mut items = Vec::new();
    if page_size == 0 {
        return Ok(Page {
            items,
            has_more: true,
        });
    }

    while items.len() < page_size {
        match iter.next().await {
            Some(item) => items.push(item?),
            None => {
                return Ok(Page {
                    items,
                    has_more: false,
                })
            }
        }
    }

    let has_more = !iter.is_exhausted().await;
    Ok(Page { items, has_more })
}

#[cfg(test)]
mod tests {
    use super::super::adapters::AsyncIterExt;
    use super::super::source::from_iter;
    use super::*;

    #[tokio::test]
    async fn test_reduce_folds_left() {
        let joined = reduce(from_iter(vec!["a", "b", "c"]), String::new(), |mut acc, s| {
            acc.push_str(s);
            acc
        })
        .await;
        assert_eq!(joined, "abc");
    }

    #[tokio::test]
    async fn test_to_page_exact_size_has_no_more() {
        let mut iter = from_iter(vec![1, 2, 3]).peekable();
        let page = to_page(&mut iter, 3).await;
        assert_eq!(page.items, vec![1, 2, 3]);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_to_page_one_extra_has_more_and_continues() {
        let mut iter = from_iter(vec![1, 2, 3, 4]).peekable();

        let first = to_page(&mut iter, 3).await;
        assert_eq!(first.items, vec![1, 2, 3]);
        assert!(first.has_more);

        let second = to_page(&mut iter, 3).await;
        assert_eq!(second.items, vec![4]);
        assert!(!second.has_more);
    }

    #[tokio::test]
    async fn test_to_page_zero_size() {
        let mut iter = from_iter(Vec::<u8>::new()).peekable();
        let page = to_page(&mut iter, 0).await;
        assert!(page.items.is_empty());
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn test_to_page_never_exceeds_size() {
        for size in 1..6 {
            let mut iter = from_iter(0..10).peekable();
            let page = to_page(&mut iter, size).await;
            assert_eq!(page.items.len(), size);
        }
    }

    #[tokio::test]
    async fn test_to_page_unbounded_size() {
        let mut iter = from_iter(vec![1, 2, 3]).peekable();
        let page = to_page(&mut iter, usize::MAX).await;
        assert_eq!(page.items, vec![1, 2, 3]);
        assert!(!page.has_more);

        let mut iter = from_iter(vec![Ok::<_, &str>(1), Ok(2), Ok(3)]).peekable();
        let page = try_to_page(&mut iter, usize::MAX).await.unwrap();
        assert_eq!(page.items, vec![1, 2, 3]);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_try_to_vec_stops_at_error() {
        let result = try_to_vec(from_iter(vec![Ok(1), Err("boom"), Ok(2)])).await;
        assert_eq!(result, Err("boom"));
    }

    #[tokio::test]
    async fn test_try_to_page_returns_error_inside_page() {
        let mut iter = from_iter(vec![Ok(1), Err("boom"), Ok(2)]).peekable();
        assert_eq!(try_to_page(&mut iter, 2).await, Err("boom"));
    }

    #[tokio::test]
    async fn test_try_to_page_defers_error_at_boundary() {
        let mut iter = from_iter(vec![Ok(1), Ok(2), Err("boom")]).peekable();

        let page = try_to_page(&mut iter, 2).await.unwrap();
        assert_eq!(page.items, vec![1, 2]);
        assert!(page.has_more);

        assert_eq!(try_to_page(&mut iter, 2).await, Err("boom"));
    }
}
