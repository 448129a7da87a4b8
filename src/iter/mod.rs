//! Pull-based asynchronous iteration
//!
//! Every multi-result read in this crate is an `AsyncIter`: store queries
//! arrive as a sequence of pages, adapters reshape that sequence lazily, and
//! the draining helpers materialize it either fully or one bounded page at a
//! time.
//!
//! # Usage
//!
//! ```ignore
//! use docmodel::iter::{from_iter, to_page, AsyncIterExt};
//!
//! let mut items = from_iter(vec![vec![1, 2], vec![], vec![3]]).flatten().peekable();
//! let page = to_page(&mut items, 2).await;
//! assert_eq!(page.items, vec![1, 2]);
//! assert!(page.has_more);
//! ```

mod adapters;
mod collect;
mod source;

pub use adapters::{AsyncIterExt, Filter, FilterMap, Flatten, Map, Peekable, Then, TryFlatten};
pub use collect::{reduce, to_page, to_vec, try_reduce, try_to_page, try_to_vec, Page};
pub use source::{from_iter, into_stream, AsyncIter, BoxAsyncIter, FromIter};
