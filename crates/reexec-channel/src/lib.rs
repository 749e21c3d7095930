//! reexec-channel: one-shot result channel between processes
//!
//! A [`InterprocessPromise`] writes exactly one [`Outcome`] into a byte stream and an
//! [`InterprocessFuture`] reads it back on the other side. Both are generic over
//! the stream, so the same pair runs over an anonymous pipe or a TCP connection.
//!
//! # Example
//!
//! ```ignore
//! use reexec_channel::{InterprocessFuture, InterprocessPromise};
//!
//! let (read_end, write_end) = nix::unistd::pipe()?;
//! InterprocessPromise::<i32, _>::new(std::fs::File::from(write_end)).set_value(13)?;
//! assert_eq!(InterprocessFuture::<i32, _>::from_fd(read_end).get()?, 13);
//! ```

pub mod future;
pub mod outcome;
pub mod promise;
pub mod socket;

pub use future::InterprocessFuture;
pub use outcome::Outcome;
pub use promise::InterprocessPromise;
pub use socket::{FutureListener, connect_promise, listen};
