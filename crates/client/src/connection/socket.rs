//! TCP connections, optionally wrapped in TLS.
//!
//! Server certificates are checked against the bundled Mozilla roots.

use std::io;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use http::Uri;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use tracing::{debug, trace};

use crate::connection::{ConnectionSource, ResponseSource, host_and_port};

enum Transport {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

/// A TCP connection, optionally TLS wrapped, that counts the bytes it moves.
pub struct SocketStream {
    transport: Transport,
    bytes_read: u64,
    bytes_written: u64,
}

impl SocketStream {
    pub fn plain(stream: TcpStream) -> Self {
        Self { transport: Transport::Plain(stream), bytes_read: 0, bytes_written: 0 }
    }

    pub fn tls(stream: StreamOwned<ClientConnection, TcpStream>) -> Self {
        Self { transport: Transport::Tls(Box::new(stream)), bytes_read: 0, bytes_written: 0 }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self.transport, Transport::Tls(_))
    }

    /// Bytes read since connecting or since the last [`ResponseSource::reset_counts`].
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn tcp_stream(&self) -> &TcpStream {
        match &self.transport {
            Transport::Plain(stream) => stream,
            Transport::Tls(stream) => &stream.sock,
        }
    }
}

impl Read for SocketStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match &mut self.transport {
            Transport::Plain(stream) => stream.read(buf)?,
            Transport::Tls(stream) => stream.read(buf)?,
        };
        self.bytes_read += n as u64;
        Ok(n)
    }
}

impl Write for SocketStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = match &mut self.transport {
            Transport::Plain(stream) => stream.write(buf)?,
            Transport::Tls(stream) => stream.write(buf)?,
        };
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.transport {
            Transport::Plain(stream) => stream.flush(),
            Transport::Tls(stream) => stream.flush(),
        }
    }
}

impl ResponseSource for SocketStream {
    fn reset_counts(&mut self) {
        trace!(bytes_read = self.bytes_read, bytes_written = self.bytes_written, "resetting byte counts");
        self.bytes_read = 0;
        self.bytes_written = 0;
    }
}

impl Drop for SocketStream {
    fn drop(&mut self) {
        if let Transport::Tls(stream) = &mut self.transport {
            stream.conn.send_close_notify();
            let _ = stream.conn.write_tls(&mut stream.sock);
        }
        let _ = self.tcp_stream().shutdown(Shutdown::Both);
    }
}

impl std::fmt::Debug for SocketStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketStream")
            .field("tls", &self.is_secure())
            .field("bytes_read", &self.bytes_read)
            .field("bytes_written", &self.bytes_written)
            .finish()
    }
}

/// Opens [`SocketStream`]s with `std::net` and `rustls`.
///
/// `timeout` bounds the connect and every single socket read and write. TLS
/// certificates are checked against the Mozilla root store.
#[derive(Clone)]
pub struct TcpConnector {
    tls_config: Arc<ClientConfig>,
}

impl std::fmt::Debug for TcpConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnector").finish_non_exhaustive()
    }
}

impl TcpConnector {
    pub fn new() -> io::Result<Self> {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = ClientConfig::builder_with_provider(rustls::crypto::ring::default_provider().into())
            .with_safe_default_protocol_versions()
            .map_err(|e| io::Error::new(ErrorKind::Unsupported, e))?
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Ok(Self::with_tls_config(Arc::new(config)))
    }

    /// Uses a caller supplied TLS configuration, e.g. with private roots.
    pub fn with_tls_config(tls_config: Arc<ClientConfig>) -> Self {
        Self { tls_config }
    }

    fn connect_tcp(&self, target: &Uri, timeout: Duration) -> io::Result<TcpStream> {
        let (host, port) = host_and_port(target)?;
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(ErrorKind::NotFound, format!("no address found for {host}:{port}")))?;

        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        let _ = stream.set_nodelay(true);

        debug!(host, port, %addr, "established tcp connection");
        Ok(stream)
    }
}

impl ConnectionSource for TcpConnector {
    type Connection = SocketStream;

    fn connect_unsecured(&self, target: &Uri, timeout: Duration) -> io::Result<SocketStream> {
        Ok(SocketStream::plain(self.connect_tcp(target, timeout)?))
    }

    fn connect_ssl(&self, target: &Uri, timeout: Duration) -> io::Result<SocketStream> {
        let stream = self.connect_tcp(target, timeout)?;
        let (host, _) = host_and_port(target)?;

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| io::Error::new(ErrorKind::InvalidInput, format!("invalid tls server name '{host}': {e}")))?;
        let connection = ClientConnection::new(Arc::clone(&self.tls_config), server_name)
            .map_err(|e| io::Error::new(ErrorKind::ConnectionAborted, e))?;

        Ok(SocketStream::tls(StreamOwned::new(connection, stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn counts_bytes_until_reset() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(b"pong!").unwrap();
        });

        let target: Uri = format!("http://{addr}/").parse().unwrap();
        let mut socket = TcpConnector::new().unwrap().connect_unsecured(&target, Duration::from_secs(5)).unwrap();
        assert!(!socket.is_secure());

        socket.write_all(b"ping").unwrap();
        let mut buf = [0u8; 5];
        socket.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong!");
        assert_eq!(socket.bytes_written(), 4);
        assert_eq!(socket.bytes_read(), 5);

        socket.reset_counts();
        assert_eq!(socket.bytes_read(), 0);
        server.join().unwrap();
    }
}
