//! Helper processes that feed or observe a running trading system.

use std::path::Path;

use anyhow::{Context, Result};
use bm_core::{
    OrderBook, ProductRepository,
    codec::FromLine,
    config::AppConfig,
    line::{LineClient, LineServer},
    soa::Connector,
};
use bm_services::connectors::shm::ShmPublisher;
use tracing::{info, warn};

fn read_lines(input: &Path) -> Result<String> {
    std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))
}

/// Decode each line of `input` as an order book and push it onto the
/// configured queue. Blocks while the queue is full.
pub fn shm_publish(config: &AppConfig, input: &Path) -> Result<usize> {
    let products = ProductRepository::from_config(&config.products)?;
    let shm = &config.shm;
    let publisher = ShmPublisher::open(&shm.name, shm.capacity, shm.max_message_size)?;

    let mut pushed = 0;
    for (n, line) in read_lines(input)?.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match OrderBook::from_line(line, &products) {
            Ok(book) => {
                Connector::<OrderBook>::publish(&publisher, &book)?;
                pushed += 1;
            }
            Err(e) => warn!("[shm_publish] line {}: {e}", n + 1),
        }
    }
    Ok(pushed)
}

/// Send every non-empty line of `input` to `host:port`.
pub async fn feed(host: &str, port: u16, input: &Path) -> Result<usize> {
    let text = read_lines(input)?;
    let mut client = LineClient::connect(host, port).await?;
    let mut sent = 0;
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        client.write_line(line).await?;
        sent += 1;
    }
    Ok(sent)
}

/// Accept one peer on `host:port` and print its lines until it closes.
pub async fn print(host: &str, port: u16, label: &str) -> Result<()> {
    let mut server = LineServer::bind(&format!("{host}:{port}")).await?;
    let peer = server.accept_one().await?;
    let mut lines = 0u64;
    while let Some(line) = server.read_line().await? {
        println!("[{label}] {line}");
        lines += 1;
    }
    info!("[{label}] {peer} closed after {lines} line(s)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use bm_core::shm::BoundedTextQueue;

    use super::*;

    #[test]
    fn shm_publish_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("marketdata.txt");
        std::fs::write(
            &input,
            "2Y|99-310:10000000|100-000:10000000\n\nnot a book\n40Y|99-310:1|100-000:1\n3Y||100-000:5\n",
        )
        .unwrap();

        let mut config = AppConfig::default();
        config.shm.name = format!("bm_tools_{}", std::process::id());
        config.shm.capacity = 8;
        config.shm.max_message_size = 256;

        assert_eq!(shm_publish(&config, &input).unwrap(), 2);
        let queue = BoundedTextQueue::attach(&config.shm.name).unwrap();
        assert_eq!(queue.pop().unwrap(), "2Y|99-310:10000000|100-000:10000000");
        assert_eq!(queue.pop().unwrap(), "3Y||100-000:5");
        BoundedTextQueue::remove(&config.shm.name).unwrap();
    }

    #[tokio::test]
    async fn feed_sends_non_empty_lines() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("prices.txt");
        std::fs::write(&input, "2Y,99-160,0-002\n\n3Y,99-000,0-004\n").unwrap();

        let mut server = LineServer::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let sender = tokio::spawn(async move { feed("127.0.0.1", port, &input).await.unwrap() });

        server.accept_one().await.unwrap();
        let mut got = Vec::new();
        while let Some(line) = server.read_line().await.unwrap() {
            got.push(line);
        }
        assert_eq!(sender.await.unwrap(), 2);
        assert_eq!(got, vec!["2Y,99-160,0-002", "3Y,99-000,0-004"]);
    }
}
