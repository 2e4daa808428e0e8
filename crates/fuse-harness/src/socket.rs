//! Reachability checks for the container's listening ports.
//!
//! Knowing that a port accepts connections is only a readiness signal. It
//! says nothing about whether the management bridge behind it is answering.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

/// Upper bound for one connection attempt to one resolved address.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// The port did not accept a connection on any address `host` resolved to.
#[derive(Debug, Error)]
#[error("tcp://{host}:{port} is not accepting connections ({attempted} address(es) tried): {source}")]
pub struct ProbeError {
    pub host: String,
    pub port: u16,
    pub attempted: usize,
    /// Failure of the last address tried, or the resolver error.
    #[source]
    pub source: io::Error,
}

/// Connects to `host:port` and returns the address that accepted.
///
/// Every address the host resolves to is tried in order, so a listener bound
/// only to IPv4 is still found when the resolver lists `::1` first. The
/// connection is closed straight away.
pub fn probe_tcp(host: &str, port: u16) -> Result<SocketAddr, ProbeError> {
    let failure = |attempted, source| ProbeError {
        host: host.to_owned(),
        port,
        attempted,
        source,
    };
    let addresses = (host, port)
        .to_socket_addrs()
        .map_err(|source| failure(0, source))?;

    let mut attempted = 0;
    let mut last_error = None;
    for address in addresses {
        attempted += 1;
        match TcpStream::connect_timeout(&address, CONNECT_TIMEOUT) {
            Ok(_) => return Ok(address),
            Err(error) => last_error = Some(error),
        }
    }
    let source = last_error.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{host} resolved to no addresses"),
        )
    });
    Err(failure(attempted, source))
}
