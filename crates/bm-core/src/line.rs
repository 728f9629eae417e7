//! Newline-framed text over TCP.
//!
//! [`LineServer`] accepts one peer at a time and hands back complete lines;
//! when the peer closes, `read_line` returns `Ok(None)` and the caller loops
//! back to `accept_one`. A line that is not UTF-8 comes back as
//! [`MeshError::Parse`] with the connection still open, so the caller can
//! skip it and keep reading. [`LineClient`] writes one line per call.

use std::net::SocketAddr;

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream, tcp::OwnedReadHalf},
};
use tracing::info;

use crate::error::{MeshError, Result};

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Listening side of a line stream.
pub struct LineServer {
    listener: TcpListener,
    reader: Option<BufReader<OwnedReadHalf>>,
    peer: Option<SocketAddr>,
    buf: Vec<u8>,
}

impl LineServer {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| MeshError::Transport(format!("bind {addr}: {e}")))?;
        info!("[line] listening on {}", listener.local_addr()?);
        Ok(Self { listener, reader: None, peer: None, buf: Vec::new() })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept exactly one connection, closing the previous one first.
    pub async fn accept_one(&mut self) -> Result<SocketAddr> {
        self.reader = None;
        self.peer = None;
        let (stream, peer) = self.listener.accept().await?;
        let _ = stream.set_nodelay(true);
        let (read, _write) = stream.into_split();
        self.reader = Some(BufReader::new(read));
        self.peer = Some(peer);
        info!("[line] accepted {}", peer);
        Ok(peer)
    }

    /// Next line without its `\n` / `\r\n`, or `None` once the peer closed.
    ///
    /// A final line without a trailing newline is still returned. Invalid
    /// UTF-8 fails only the line it is on.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        self.buf.clear();
        let n = reader.read_until(b'\n', &mut self.buf).await?;
        if n == 0 {
            if let Some(peer) = self.peer.take() {
                info!("[line] peer {} closed", peer);
            }
            self.reader = None;
            return Ok(None);
        }
        let line = self.buf.strip_suffix(b"\n").unwrap_or(&self.buf);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        match std::str::from_utf8(line) {
            Ok(text) => Ok(Some(text.to_string())),
            Err(e) => Err(MeshError::Parse(format!("{e} in '{}'", String::from_utf8_lossy(line)))),
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Connecting side of a line stream.
pub struct LineClient {
    stream: TcpStream,
    addr: String,
}

impl LineClient {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| MeshError::Transport(format!("connect {addr}: {e}")))?;
        let _ = stream.set_nodelay(true);
        info!("[line] connected to {}", addr);
        Ok(Self { stream, addr })
    }

    /// Write `text` followed by `\n`.
    pub async fn write_line(&mut self, text: &str) -> Result<()> {
        let mut buf = Vec::with_capacity(text.len() + 1);
        buf.extend_from_slice(text.as_bytes());
        buf.push(b'\n');
        self.stream
            .write_all(&buf)
            .await
            .map_err(|e| MeshError::Transport(format!("write {}: {e}", self.addr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lines_arrive_in_order_and_strip_cr() {
        let mut server = LineServer::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        let client = tokio::spawn(async move {
            let mut c = LineClient::connect("127.0.0.1", port).await.unwrap();
            c.write_line("10Y,100-000,0-002").await.unwrap();
            c.write_line("2Y,99-160,0-002\r").await.unwrap();
            c.write_line("").await.unwrap();
        });

        server.accept_one().await.unwrap();
        assert_eq!(server.read_line().await.unwrap().as_deref(), Some("10Y,100-000,0-002"));
        assert_eq!(server.read_line().await.unwrap().as_deref(), Some("2Y,99-160,0-002"));
        assert_eq!(server.read_line().await.unwrap().as_deref(), Some(""));
        client.await.unwrap();
        assert_eq!(server.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn reaccept_after_peer_close() {
        let mut server = LineServer::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        for round in 0..2 {
            let client = tokio::spawn(async move {
                let mut c = LineClient::connect("127.0.0.1", port).await.unwrap();
                c.write_line(&format!("round {round}")).await.unwrap();
            });
            server.accept_one().await.unwrap();
            assert_eq!(server.read_line().await.unwrap(), Some(format!("round {round}")));
            client.await.unwrap();
            assert_eq!(server.read_line().await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn unterminated_last_line_is_returned() {
        let mut server = LineServer::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let client = tokio::spawn(async move {
            let mut s = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            s.write_all(b"a\npartial").await.unwrap();
        });
        server.accept_one().await.unwrap();
        client.await.unwrap();
        assert_eq!(server.read_line().await.unwrap().as_deref(), Some("a"));
        assert_eq!(server.read_line().await.unwrap().as_deref(), Some("partial"));
        assert_eq!(server.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_utf8_fails_one_line_only() {
        let mut server = LineServer::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let client = tokio::spawn(async move {
            let mut s = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            s.write_all(b"2Y,99-16\xff,0.0078125\n3Y,100,0.0078125\n").await.unwrap();
        });
        server.accept_one().await.unwrap();
        client.await.unwrap();
        assert!(matches!(server.read_line().await, Err(MeshError::Parse(_))));
        assert_eq!(server.read_line().await.unwrap().as_deref(), Some("3Y,100,0.0078125"));
        assert_eq!(server.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn connect_refused_is_transport_error() {
        let server = LineServer::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        drop(server);
        assert!(matches!(LineClient::connect("127.0.0.1", port).await, Err(MeshError::Transport(_))));
    }
}
