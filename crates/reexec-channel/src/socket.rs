//! TCP transport for the result channel
//!
//! The reading side listens for a single connection and turns it into a future;
//! the writing side connects back and turns its connection into a promise.

use crate::future::InterprocessFuture;
use crate::promise::InterprocessPromise;
use log::{debug, warn};
use reexec_core::{ExecError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

/// Connection attempts made while the listener refuses
pub const CONNECT_ATTEMPTS: u32 = 1000;

/// Pause between refused connection attempts
pub const CONNECT_BACKOFF: Duration = Duration::from_millis(1);

/// A listening socket that yields exactly one future
pub struct FutureListener {
    listener: TcpListener,
}

/// Bind a listener for a single incoming promise
pub fn listen(addr: impl ToSocketAddrs) -> Result<FutureListener> {
    let listener = TcpListener::bind(addr)?;
    debug!("Future listener bound to {:?}", listener.local_addr().ok());
    Ok(FutureListener { listener })
}

impl FutureListener {
    /// Address the listener is bound to (useful when bound to port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept one connection and wrap it as a future. The listener is consumed.
    pub fn accept_future<T: DeserializeOwned>(self) -> Result<InterprocessFuture<T, TcpStream>> {
        let (stream, peer) = self.listener.accept()?;
        debug!("Accepted promise connection from {}", peer);
        Ok(InterprocessFuture::new(stream))
    }
}

/// Connect to a [`FutureListener`] and wrap the connection as a promise
///
/// Retries while the connection is refused, since the listener may not be up yet.
pub fn connect_promise<T: Serialize>(
    addr: impl ToSocketAddrs,
) -> Result<InterprocessPromise<T, TcpStream>> {
    let addrs: Vec<SocketAddr> = addr.to_socket_addrs()?.collect();
    let mut last_error = None;

    for attempt in 0..CONNECT_ATTEMPTS {
        match TcpStream::connect(&addrs[..]) {
            Ok(stream) => {
                debug!("Connected promise after {} refused attempts", attempt);
                return Ok(InterprocessPromise::new(stream));
            }
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                last_error = Some(e);
                thread::sleep(CONNECT_BACKOFF);
            }
            Err(e) => return Err(e.into()),
        }
    }

    warn!(
        "Giving up on promise connection after {} attempts",
        CONNECT_ATTEMPTS
    );
    Err(ExecError::Io(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused")
    })))
}
