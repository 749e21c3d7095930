//! reexec-message: relocatable units of work
//!
//! A [`Work`] value captures everything it needs at construction time. An
//! [`ActiveMessage`] is its self-describing encoding, and a [`Catalog`] turns a
//! decoded message back into a call in whichever process receives it.

pub mod catalog;
pub mod message;
pub mod reply;
pub mod work;

pub use catalog::Catalog;
pub use message::ActiveMessage;
pub use reply::run_and_reply;
pub use work::Work;
