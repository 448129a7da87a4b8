//! The pull-based iteration protocol and its basic sources

use futures_util::future::BoxFuture;
use futures_util::stream::{self, Stream};

/// A single-consumer asynchronous sequence.
///
/// Each `next` call resolves to the next item, or `None` once the sequence is
/// exhausted. `next` takes `&mut self`, so one iterator can never be advanced
/// by two callers at once.
pub trait AsyncIter: Send {
    /// Item produced by the sequence
    type Item: Send;

    /// Pulls the next item
    fn next(&mut self) -> BoxFuture<'_, Option<Self::Item>>;
}

/// Type-erased iterator
pub type BoxAsyncIter<'a, T> = Box<dyn AsyncIter<Item = T> + 'a>;

impl<I: AsyncIter + ?Sized> AsyncIter for Box<I> {
    type Item = I::Item;

    fn next(&mut self) -> BoxFuture<'_, Option<Self::Item>> {
        (**self).next()
    }
}

/// Iterator over an in-memory sequence
#[derive(Debug)]
pub struct FromIter<I> {
    inner: I,
}

impl<I> AsyncIter for FromIter<I>
where
    I: Iterator + Send,
    I::Item: Send,
{
    type Item = I::Item;

    fn next(&mut self) -> BoxFuture<'_, Option<Self::Item>> {
        let item = self.inner.next();
        Box::pin(async move { item })
    }
}

/// Lifts any `IntoIterator` into an `AsyncIter`
pub fn from_iter<I>(items: I) -> FromIter<I::IntoIter>
where
    I: IntoIterator,
    I::IntoIter: Send,
    I::Item: Send,
{
    FromIter {
        inner: items.into_iter(),
    }
}

/// Exposes an `AsyncIter` as a `futures` stream
pub fn into_stream<'a, I>(iter: I) -> impl Stream<Item = I::Item> + Send + 'a
where
    I: AsyncIter + 'a,
{
    stream::unfold(iter, |mut iter| async move {
        let item = iter.next().await?;
        Some((item, iter))
    })
}
