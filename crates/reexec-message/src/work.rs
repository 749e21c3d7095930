//! Units of work that can be shipped to another process

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// A zero-argument unit of work whose captured state is its serialized form
///
/// Every field the work needs is captured when the value is built; nothing is
/// passed at invocation time. `TAG` names the kind of work on the wire and must
/// be unique within a [`Catalog`](crate::Catalog).
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Add { a: i64, b: i64 }
///
/// impl Work for Add {
///     const TAG: &'static str = "add";
///     type Output = i64;
///     type Error = std::convert::Infallible;
///
///     fn run(self) -> Result<i64, Self::Error> {
///         Ok(self.a + self.b)
///     }
/// }
/// ```
pub trait Work: Serialize + DeserializeOwned + 'static {
    /// Stable wire name of this kind of work
    const TAG: &'static str;

    /// Value handed back to a two-way caller
    type Output: Serialize + DeserializeOwned;

    /// Recognized failure, reported by its `Display` text
    type Error: fmt::Display;

    fn run(self) -> Result<Self::Output, Self::Error>;
}
