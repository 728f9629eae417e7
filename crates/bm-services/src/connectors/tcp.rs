//! TCP line connectors.
//!
//! Inbound: one task per listening port decodes each line into a record and
//! hands it to the owning service. A peer close goes back to `accept_one`; a
//! bad line is logged and skipped.
//!
//! Outbound: [`TcpOutboundConnector`] writes each record synchronously,
//! connecting on the first publish; connect and write failures go back to
//! the caller.

use std::sync::Arc;

use bm_core::{
    MeshError, ProductRepository, Result,
    codec::{FromLine, ToLine},
    line::{LineClient, LineServer},
    soa::{Connector, Service},
};
use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Serve `server` forever, feeding each decoded record to `service`.
///
/// Only an accept failure on the listening socket itself ends the loop.
pub async fn run_inbound<V: FromLine>(
    mut server: LineServer,
    products: Arc<ProductRepository>,
    service: Arc<dyn Service<str, V>>,
    label: &'static str,
) -> Result<()> {
    info!("[{label}] inbound listening on {}", server.local_addr()?);
    loop {
        let peer = server.accept_one().await?;
        let mut accepted = 0u64;
        let mut skipped = 0u64;

        loop {
            let line = match server.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e @ MeshError::Parse(_)) => {
                    warn!("[{label}] skipping unreadable line from {peer}: {e}");
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!("[{label}] read from {peer} failed: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match V::from_line(&line, &products) {
                Ok(record) => {
                    service.on_message(record);
                    accepted += 1;
                }
                Err(e) => {
                    warn!("[{label}] skipping '{line}': {e}");
                    skipped += 1;
                }
            }
        }
        info!("[{label}] {peer} done: {accepted} accepted, {skipped} skipped");
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

type WriteRequest = (String, Sender<Result<()>>);

/// Connector writing one line per published record to a remote line server.
///
/// `publish` returns once the line is written, or with the connect or write
/// error. The socket is owned by a dedicated writer thread running its own
/// current-thread runtime, so `publish` works from tokio tasks and plain
/// threads alike. After a failure the connection is dropped; the next
/// `publish` connects again. Failed lines are never resent.
pub struct TcpOutboundConnector {
    label: &'static str,
    tx: Sender<WriteRequest>,
}

impl TcpOutboundConnector {
    pub fn new(host: &str, port: u16, label: &'static str) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        let (tx, rx) = crossbeam_channel::bounded::<WriteRequest>(0);
        let host = host.to_string();

        std::thread::Builder::new().name(format!("{label}-writer")).spawn(move || {
            let mut client: Option<LineClient> = None;
            for (line, reply) in rx {
                let written = rt.block_on(write_one(&mut client, &host, port, &line));
                match &written {
                    Ok(()) => debug!("[{label}] sent {line}"),
                    Err(_) => client = None,
                }
                let _ = reply.send(written);
            }
            debug!("[{label}] outbound writer exited");
        })?;

        Ok(Self { label, tx })
    }
}

async fn write_one(client: &mut Option<LineClient>, host: &str, port: u16, line: &str) -> Result<()> {
    if client.is_none() {
        *client = Some(LineClient::connect(host, port).await?);
    }
    match client.as_mut() {
        Some(c) => c.write_line(line).await,
        None => Err(MeshError::Transport(format!("no connection to {host}:{port}"))),
    }
}

impl<V: ToLine> Connector<V> for TcpOutboundConnector {
    fn publish(&self, data: &V) -> Result<()> {
        let closed = || MeshError::Transport(format!("{} writer closed", self.label));
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.tx.send((data.to_line(), reply_tx)).map_err(|_| closed())?;
        reply_rx.recv().map_err(|_| closed())?
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bm_core::{Price, config::default_products, price::format_fractional};

    use super::*;
    use crate::pricing::PricingService;

    fn repo() -> Arc<ProductRepository> {
        Arc::new(ProductRepository::from_config(&default_products()).unwrap())
    }

    async fn wait_for<T>(mut probe: impl FnMut() -> Option<T>) -> T {
        for _ in 0..200 {
            if let Some(v) = probe() {
                return v;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 2s");
    }

    #[tokio::test]
    async fn inbound_skips_bad_lines_and_reaccepts() {
        let server = LineServer::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let pricing = Arc::new(PricingService::new());
        let task = tokio::spawn(run_inbound::<Price>(server, repo(), pricing.clone(), "prices"));

        let mut c = LineClient::connect("127.0.0.1", port).await.unwrap();
        c.write_line("garbage").await.unwrap();
        c.write_line("").await.unwrap();
        c.write_line("40Y,100,0.01").await.unwrap();
        c.write_line("2Y,99-16+,0.0078125").await.unwrap();
        drop(c);

        let p = wait_for(|| pricing.get_data("2Y").ok()).await;
        assert_eq!(p.mid, 99.0 + 16.0 / 32.0 + 4.0 / 256.0);

        // Second peer after the first closed.
        let mut c = LineClient::connect("127.0.0.1", port).await.unwrap();
        c.write_line("30Y,101.5,0.015625").await.unwrap();
        let p = wait_for(|| pricing.get_data("30Y").ok()).await;
        assert_eq!(p.bid_offer_spread, 0.015625);
        assert!(pricing.get_data("40Y").is_err());

        task.abort();
    }

    #[tokio::test]
    async fn inbound_keeps_peer_after_non_utf8_line() {
        let server = LineServer::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let pricing = Arc::new(PricingService::new());
        let task = tokio::spawn(run_inbound::<Price>(server, repo(), pricing.clone(), "prices"));

        let mut s = tokio::net::TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        tokio::io::AsyncWriteExt::write_all(
            &mut s,
            b"2Y,99-16\xff,0.0078125\n3Y,100,0.0078125\n5Y,100,0.0078125\n",
        )
        .await
        .unwrap();

        wait_for(|| pricing.get_data("5Y").ok()).await;
        assert!(pricing.get_data("3Y").is_ok());
        assert!(pricing.get_data("2Y").is_err());

        task.abort();
    }

    #[tokio::test]
    async fn outbound_connects_lazily_and_writes_lines() {
        let mut server = LineServer::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let out = TcpOutboundConnector::new("127.0.0.1", port, "streaming").unwrap();

        let repo = repo();
        let price = Price::new(repo.get("5Y").unwrap(), 100.5, 0.0078125);
        Connector::<Price>::publish(&out, &price).unwrap();

        server.accept_one().await.unwrap();
        let line = server.read_line().await.unwrap().unwrap();
        assert_eq!(line, format!("5Y,{},{}", format_fractional(100.5), format_fractional(0.0078125)));
    }

    #[test]
    fn outbound_to_dead_peer_fails_publish() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let out = TcpOutboundConnector::new("127.0.0.1", port, "executions").unwrap();
        let price = Price::new(repo().get("2Y").unwrap(), 100.0, 0.0078125);

        assert!(matches!(Connector::<Price>::publish(&out, &price), Err(MeshError::Transport(_))));
        // No resend and no hidden queue: a second publish fails on its own.
        assert!(matches!(Connector::<Price>::publish(&out, &price), Err(MeshError::Transport(_))));
    }
}
