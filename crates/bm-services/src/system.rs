//! Process lifecycle around a [`TradingGraph`].
//!
//! ```text
//! TradingSystem::new()  ──► graph built, internal edges registered
//!              .start() ──► outbound writers + history files attached,
//!                           one tokio task per TCP inbound port,
//!                           one OS thread for the shm consumer
//!              .stop()  ──► abort inbound tasks
//! ```

use std::{collections::BTreeMap, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use bm_core::{
    Inquiry, OrderBook, Price, ProductRepository, Trade,
    codec::FromLine,
    config::AppConfig,
    line::LineServer,
    shm::BoundedTextQueue,
    soa::Service,
};
use tracing::{error, info, warn};

use crate::{
    connectors::{shm::run_shm_subscriber, tcp::run_inbound},
    graph::{HistorySinks, OutboundSinks, TradingGraph},
};

pub struct TradingSystem {
    config: AppConfig,
    graph: TradingGraph,
    tasks: Vec<tokio::task::JoinHandle<()>>,
    inbound: BTreeMap<&'static str, SocketAddr>,
    shm_worker: Option<std::thread::JoinHandle<()>>,
}

impl TradingSystem {
    pub fn new(config: AppConfig) -> Result<Self> {
        let graph = TradingGraph::new(&config).context("building service graph")?;
        Ok(Self { config, graph, tasks: Vec::new(), inbound: BTreeMap::new(), shm_worker: None })
    }

    pub fn name(&self) -> String {
        self.config.module_name()
    }

    pub fn graph(&self) -> &TradingGraph {
        &self.graph
    }

    /// Bound address of an inbound listener (`prices`, `trades`, `inquiries`).
    pub fn inbound_addr(&self, label: &str) -> Option<SocketAddr> {
        self.inbound.get(label).copied()
    }

    /// Attach sinks, then start every inbound worker.
    pub async fn start(&mut self) -> Result<()> {
        let outbound = OutboundSinks::tcp(&self.config.outbound).context("starting outbound writers")?;
        self.graph.attach_outbound(outbound);
        let history = HistorySinks::files(&self.config.history)
            .with_context(|| format!("opening history files in {}", self.config.history.dir.display()))?;
        self.graph.attach_history(history, &self.config.gui);

        let inbound = self.config.inbound.clone();
        let (pricing, trades, inquiries) =
            (self.graph.pricing.clone(), self.graph.trade_booking.clone(), self.graph.inquiry.clone());
        self.spawn_inbound::<Price>("prices", &inbound.bind_host, inbound.prices_port, pricing).await?;
        self.spawn_inbound::<Trade>("trades", &inbound.bind_host, inbound.trades_port, trades).await?;
        self.spawn_inbound::<Inquiry>("inquiries", &inbound.bind_host, inbound.inquiries_port, inquiries).await?;

        self.spawn_shm_consumer()?;

        info!("[{}] started: {} tcp inbound, shm '{}'", self.name(), self.tasks.len(), self.config.shm.name);
        Ok(())
    }

    async fn spawn_inbound<V: FromLine + Send + 'static>(
        &mut self,
        label: &'static str,
        host: &str,
        port: u16,
        service: Arc<dyn Service<str, V>>,
    ) -> Result<()> {
        let server = LineServer::bind(&format!("{host}:{port}"))
            .await
            .with_context(|| format!("binding {label} inbound"))?;
        self.inbound.insert(label, server.local_addr()?);
        let products: Arc<ProductRepository> = self.graph.products.clone();

        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = run_inbound(server, products, service, label).await {
                error!("[{label}] inbound stopped: {e}");
            }
        }));
        Ok(())
    }

    fn spawn_shm_consumer(&mut self) -> Result<()> {
        let shm = &self.config.shm;
        let queue = BoundedTextQueue::open_or_create(&shm.name, shm.capacity, shm.max_message_size)
            .with_context(|| format!("opening shm queue '{}'", shm.name))?;
        let products = self.graph.products.clone();
        let service: Arc<dyn Service<str, OrderBook>> = self.graph.market_data.clone();
        let cpu = shm.cpu_affinity;

        let handle = std::thread::Builder::new()
            .name("md-shm".into())
            .spawn(move || run_shm_subscriber::<OrderBook>(queue, products, service, cpu, "md_shm"))
            .context("spawning shm consumer")?;
        self.shm_worker = Some(handle);
        Ok(())
    }

    /// Abort the TCP workers. The shm consumer may be parked in `pop` and is
    /// left to exit with the process.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(worker) = self.shm_worker.take()
            && !worker.is_finished()
        {
            warn!("[{}] shm consumer still blocked, detaching", self.name());
        }
        info!("[{}] stopped", self.name());
    }
}
