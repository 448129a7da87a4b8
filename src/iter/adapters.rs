//! Lazy adapters over `AsyncIter`
//!
//! Every adapter is an explicit state machine: the upstream handle plus
//! whatever buffer the adapter needs. Nothing is pulled from upstream until
//! the adapter itself is pulled.

use std::future::Future;

use futures_util::future::BoxFuture;

use super::source::{AsyncIter, BoxAsyncIter};

/// Adapter constructors available on every `AsyncIter`
pub trait AsyncIterExt: AsyncIter + Sized {
    /// Applies `f` to each item
    fn map<U, F>(self, f: F) -> Map<Self, F>
    where
        F: FnMut(Self::Item) -> U + Send,
        U: Send,
    {
        Map { inner: self, f }
    }

    /// Applies an asynchronous `f` to each item
    fn then<F, Fut>(self, f: F) -> Then<Self, F>
    where
        F: FnMut(Self::Item) -> Fut + Send,
        Fut: Future + Send,
        Fut::Output: Send,
    {
        Then { inner: self, f }
    }

    /// Skips items for which `predicate` is false
    fn filter<P>(self, predicate: P) -> Filter<Self, P>
    where
        P: FnMut(&Self::Item) -> bool + Send,
    {
        Filter {
            inner: self,
            predicate,
        }
    }

    /// Keeps and narrows the items for which `f` returns `Some`
    fn filter_map<U, F>(self, f: F) -> FilterMap<Self, F>
    where
        F: FnMut(Self::Item) -> Option<U> + Send,
        U: Send,
    {
        FilterMap { inner: self, f }
    }

    /// Yields the elements of each batch one at a time
    fn flatten(self) -> Flatten<Self, <Self::Item as IntoIterator>::IntoIter>
    where
        Self::Item: IntoIterator,
        <Self::Item as IntoIterator>::IntoIter: Send,
        <Self::Item as IntoIterator>::Item: Send,
    {
        Flatten {
            inner: self,
            buffer: None,
        }
    }

    /// `flatten` over fallible batches; errors are forwarded as items
    fn try_flatten<C, E>(self) -> TryFlatten<Self, C::IntoIter>
    where
        Self: AsyncIter<Item = Result<C, E>>,
        C: IntoIterator + Send,
        C::IntoIter: Send,
        C::Item: Send,
        E: Send,
    {
        TryFlatten {
            inner: self,
            buffer: None,
        }
    }

    /// Allows looking at the next item without consuming it
    fn peekable(self) -> Peekable<Self> {
        Peekable {
            inner: self,
            peeked: None,
        }
    }

    /// Erases the iterator type
    fn boxed<'a>(self) -> BoxAsyncIter<'a, Self::Item>
    where
        Self: 'a,
    {
        Box::new(self)
    }
}

impl<I: AsyncIter> AsyncIterExt for I {}

/// See [`AsyncIterExt::map`]
pub struct Map<I, F> {
    inner: I,
    f: F,
}

impl<I, F, U> AsyncIter for Map<I, F>
where
    I: AsyncIter,
    F: FnMut(I::Item) -> U + Send,
    U: Send,
{
    type Item = U;

    fn next(&mut self) -> BoxFuture<'_, Option<U>> {
        Box::pin(async move {
            let item = self.inner.next().await?;
            Some((self.f)(item))
        })
    }
}

/// See [`AsyncIterExt::then`]
pub struct Then<I, F> {
    inner: I,
    f: F,
}

impl<I, F, Fut> AsyncIter for Then<I, F>
where
    I: AsyncIter,
    F: FnMut(I::Item) -> Fut + Send,
    Fut: Future + Send,
    Fut::Output: Send,
{
    type Item = Fut::Output;

    fn next(&mut self) -> BoxFuture<'_, Option<Self::Item>> {
        Box::pin(async move {
            let item = self.inner.next().await?;
            Some((self.f)(item).await)
        })
    }
}

/// See [`AsyncIterExt::filter`]
pub struct Filter<I, P> {
    inner: I,
    predicate: P,
}

impl<I, P> AsyncIter for Filter<I, P>
where
    I: AsyncIter,
    P: FnMut(&I::Item) -> bool + Send,
{
    type Item = I::Item;

    fn next(&mut self) -> BoxFuture<'_, Option<Self::Item>> {
        Box::pin(async move {
            loop {
                let item = self.inner.next().await?;
                if (self.predicate)(&item) {
                    return Some(item);
                }
            }
        })
    }
}

/// See [`AsyncIterExt::filter_map`]
pub struct FilterMap<I, F> {
    inner: I,
    f: F,
}

impl<I, F, U> AsyncIter for FilterMap<I, F>
where
    I: AsyncIter,
    F: FnMut(I::Item) -> Option<U> + Send,
    U: Send,
{
    type Item = U;

    fn next(&mut self) -> BoxFuture<'_, Option<U>> {
        Box::pin(async move {
            loop {
                let item = self.inner.next().await?;
                if let Some(mapped) = (self.f)(item) {
                    return Some(mapped);
                }
            }
        })
    }
}

/// See [`AsyncIterExt::flatten`].
///
/// `buffer` holds the remainder of the current batch; upstream is pulled only
/// once it is drained, so empty batches are skipped without yielding.
pub struct Flatten<I, B> {
    inner: I,
    buffer: Option<B>,
}

impl<I, B> AsyncIter for Flatten<I, B>
where
    I: AsyncIter,
    I::Item: IntoIterator<IntoIter = B>,
    B: Iterator + Send,
    B::Item: Send,
{
    type Item = B::Item;

    fn next(&mut self) -> BoxFuture<'_, Option<Self::Item>> {
        Box::pin(async move {
            loop {
                if let Some(buffer) = self.buffer.as_mut() {
                    if let Some(item) = buffer.next() {
                        return Some(item);
                    }
                    self.buffer = None;
                }
                let batch = self.inner.next().await?;
                self.buffer = Some(batch.into_iter());
            }
        })
    }
}

/// See [`AsyncIterExt::try_flatten`]
pub struct TryFlatten<I, B> {
    inner: I,
    buffer: Option<B>,
}

impl<I, C, B, E> AsyncIter for TryFlatten<I, B>
where
    I: AsyncIter<Item = Result<C, E>>,
    C: IntoIterator<IntoIter = B> + Send,
    B: Iterator + Send,
    B::Item: Send,
    E: Send,
{
    type Item = Result<B::Item, E>;

    fn next(&mut self) -> BoxFuture<'_, Option<Self::Item>> {
        Box::pin(async move {
            loop {
                if let Some(buffer) = self.buffer.as_mut() {
                    if let Some(item) = buffer.next() {
                        return Some(Ok(item));
                    }
                    self.buffer = None;
                }
                match self.inner.next().await? {
                    Ok(batch) => self.buffer = Some(batch.into_iter()),
                    Err(err) => return Some(Err(err)),
                }
            }
        })
    }
}

/// See [`AsyncIterExt::peekable`]
pub struct Peekable<I: AsyncIter> {
    inner: I,
    peeked: Option<Option<I::Item>>,
}

impl<I: AsyncIter> Peekable<I> {
    /// Returns the next item without consuming it
    pub async fn peek(&mut self) -> Option<&I::Item> {
        if self.peeked.is_none() {
            let item = self.inner.next().await;
            self.peeked = Some(item);
        }
        self.peeked.as_ref().and_then(Option::as_ref)
    }

    /// True when no further item exists.
    ///
    /// Pulls upstream at most once; the pulled item stays buffered.
    pub async fn is_exhausted(&mut self) -> bool {
        self.peek().await.is_none()
    }
}

impl<I: AsyncIter> AsyncIter for Peekable<I> {
    type Item = I::Item;

    fn next(&mut self) -> BoxFuture<'_, Option<Self::Item>> {
        Box::pin(async move {
            match self.peeked.take() {
                Some(item) => item,
                None => self.inner.next().await,
            }
        })
    }
}
