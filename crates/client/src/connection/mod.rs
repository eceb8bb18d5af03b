//! Connection establishment and the stream traits the client runs on.
//!
//! The client never opens sockets itself. It asks a [`ConnectionSource`] for
//! a bidirectional byte stream, plain or TLS, and speaks HTTP/1.1 over it.
//! [`TcpConnector`] is the default source; tests substitute in-memory ones.

use std::io;
use std::io::{Cursor, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use http::Uri;

mod socket;

pub use socket::{SocketStream, TcpConnector};

/// A stream a response can be read from.
///
/// Streams that count transferred bytes reset their counters once the
/// response head has been read, so only body bytes are accounted.
pub trait ResponseSource: Read {
    fn reset_counts(&mut self) {}
}

impl ResponseSource for &[u8] {}

impl<T: AsRef<[u8]>> ResponseSource for Cursor<T> {}

impl ResponseSource for TcpStream {}

impl<S: ResponseSource + ?Sized> ResponseSource for Box<S> {
    fn reset_counts(&mut self) {
        (**self).reset_counts();
    }
}

/// A connected stream: requests are written to it and the response read back.
pub trait Connection: ResponseSource + Write + Send {}

impl<T: ResponseSource + Write + Send> Connection for T {}

/// Opens connections to request targets.
pub trait ConnectionSource {
    type Connection: Connection;

    /// Opens a plain connection to the target's host and port.
    fn connect_unsecured(&self, target: &Uri, timeout: Duration) -> io::Result<Self::Connection>;

    /// Opens a TLS connection to the target's host and port.
    fn connect_ssl(&self, target: &Uri, timeout: Duration) -> io::Result<Self::Connection>;
}

impl<C: ConnectionSource + ?Sized> ConnectionSource for &C {
    type Connection = C::Connection;

    fn connect_unsecured(&self, target: &Uri, timeout: Duration) -> io::Result<Self::Connection> {
        (**self).connect_unsecured(target, timeout)
    }

    fn connect_ssl(&self, target: &Uri, timeout: Duration) -> io::Result<Self::Connection> {
        (**self).connect_ssl(target, timeout)
    }
}

/// Host and port of a target, with the scheme's default port filled in.
pub fn host_and_port(target: &Uri) -> io::Result<(&str, u16)> {
    let host = target
        .host()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("target {target} has no host")))?;
    let port = target.port_u16().unwrap_or_else(|| default_port(target));
    Ok((host, port))
}

/// 443 for `https`, 80 for anything else.
pub fn default_port(target: &Uri) -> u16 {
    if is_secure(target) { 443 } else { 80 }
}

pub fn is_secure(target: &Uri) -> bool {
    target.scheme_str().is_some_and(|scheme| scheme.eq_ignore_ascii_case("https"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_follow_scheme() {
        let uri: Uri = "http://example.com/a".parse().unwrap();
        assert_eq!(host_and_port(&uri).unwrap(), ("example.com", 80));

        let uri: Uri = "HTTPS://example.com/a".parse().unwrap();
        assert!(is_secure(&uri));
        assert_eq!(host_and_port(&uri).unwrap(), ("example.com", 443));

        let uri: Uri = "https://example.com:8443".parse().unwrap();
        assert_eq!(host_and_port(&uri).unwrap(), ("example.com", 8443));
    }

    #[test]
    fn relative_target_has_no_host() {
        let uri: Uri = "/just/a/path".parse().unwrap();
        assert_eq!(host_and_port(&uri).unwrap_err().kind(), io::ErrorKind::InvalidInput);
    }
}
