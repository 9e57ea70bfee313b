//! The row type shown by grids and lists.

use std::fmt::Debug;
use std::hash::Hash;

/// A record that can be paged in by a [`Loader`](crate::loader::Loader).
///
/// The key identifies a record across pages: two fetched rows with the same
/// key are the same record, and only the first one is kept. Keys are also
/// how selection membership is decided.
///
/// ```rust,ignore
/// #[derive(Debug, Clone)]
/// struct Customer { id: u64, name: String }
///
/// impl Record for Customer {
///     type Key = u64;
///     fn key(&self) -> u64 { self.id }
/// }
/// ```
pub trait Record: Clone + Debug + Send + 'static {
    /// The unique identifier type.
    type Key: Clone + Eq + Hash + Debug + Send + 'static;

    /// Return this record's unique identifier.
    fn key(&self) -> Self::Key;
}
