//! The service graph: every service, the edges between them, and the sinks
//! hanging off them.
//!
//! ```text
//! shm ──► MarketData ──► AlgoExecution ──► Execution ──► TradeBooking ◄── tcp trades
//!                                             │                │
//!                                          outbound         Position ──► Risk
//!
//! tcp prices ──► Pricing ──► AlgoStreaming ──► Streaming ──► outbound
//!                   └──► GUI
//!
//! tcp inquiries ──► Inquiry ◄──► loopback
//! ```
//!
//! Edges are listener registrations made once here; no service owns its
//! upstream.

use std::sync::Arc;

use bm_core::{
    BucketedPosition, BucketedRisk, ExecutionOrder, Inquiry, Market, PV01, Position, Price,
    PriceStream, ProductRepository, Result, SectorMap,
    codec::gui_price_line,
    config::{AppConfig, GuiConfig, HistoryConfig, OutboundConfig},
    soa::{Connector, Service},
};
use tracing::info;

use crate::{
    algo_execution::AlgoExecutionService,
    algo_streaming::AlgoStreamingService,
    bridge::{AlgoExecutionToExecution, AlgoStreamToStreaming, ExecutionToTradeBooking},
    connectors::{PublishListener, file::FileSink, loopback::InquiryLoopback, tcp::TcpOutboundConnector},
    execution::ExecutionService,
    gui::GuiService,
    historical::HistoricalDataService,
    inquiry::InquiryService,
    market_data::MarketDataService,
    position::PositionService,
    pricing::PricingService,
    risk::RiskService,
    streaming::StreamingService,
    trade_booking::TradeBookingService,
};

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Where executions, streams and (optionally) inquiry updates leave the process.
pub struct OutboundSinks {
    pub executions: Arc<dyn Connector<ExecutionOrder>>,
    pub streaming: Arc<dyn Connector<PriceStream>>,
    pub inquiries: Option<Arc<dyn Connector<Inquiry>>>,
}

impl OutboundSinks {
    /// TCP writers for every configured port. Each connects on first use.
    pub fn tcp(cfg: &OutboundConfig) -> Result<Self> {
        let inquiries = match cfg.inquiries_port {
            Some(port) => {
                let out: Arc<dyn Connector<Inquiry>> =
                    Arc::new(TcpOutboundConnector::new(&cfg.host, port, "inquiries_out")?);
                Some(out)
            }
            None => None,
        };
        Ok(Self {
            executions: Arc::new(TcpOutboundConnector::new(&cfg.host, cfg.executions_port, "executions_out")?),
            streaming: Arc::new(TcpOutboundConnector::new(&cfg.host, cfg.streaming_port, "streaming_out")?),
            inquiries,
        })
    }
}

/// One sink per persisted stream plus the GUI feed.
pub struct HistorySinks {
    pub positions: Arc<dyn Connector<Position>>,
    pub bucket_positions: Arc<dyn Connector<BucketedPosition>>,
    pub risk: Arc<dyn Connector<PV01>>,
    pub bucket_risk: Arc<dyn Connector<BucketedRisk>>,
    pub executions: Arc<dyn Connector<ExecutionOrder>>,
    pub streaming: Arc<dyn Connector<PriceStream>>,
    pub inquiries: Arc<dyn Connector<Inquiry>>,
    pub gui: Arc<dyn Connector<Price>>,
}

impl HistorySinks {
    /// Timestamped files under `cfg.dir`, truncated on open.
    pub fn files(cfg: &HistoryConfig) -> Result<Self> {
        Ok(Self {
            positions: Arc::new(FileSink::<Position>::create(&cfg.path(&cfg.positions))?),
            bucket_positions: Arc::new(FileSink::<BucketedPosition>::create(&cfg.path(&cfg.bucket_positions))?),
            risk: Arc::new(FileSink::<PV01>::create(&cfg.path(&cfg.risk))?),
            bucket_risk: Arc::new(FileSink::<BucketedRisk>::create(&cfg.path(&cfg.bucket_risk))?),
            executions: Arc::new(FileSink::<ExecutionOrder>::create(&cfg.path(&cfg.executions))?),
            streaming: Arc::new(FileSink::<PriceStream>::create(&cfg.path(&cfg.streaming))?),
            inquiries: Arc::new(FileSink::<Inquiry>::create(&cfg.path(&cfg.inquiries))?),
            gui: Arc::new(FileSink::with_format(&cfg.path(&cfg.gui), gui_price_line)?),
        })
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

pub struct TradingGraph {
    pub products: Arc<ProductRepository>,
    pub market_data: Arc<MarketDataService>,
    pub algo_execution: Arc<AlgoExecutionService>,
    pub execution: Arc<ExecutionService>,
    pub trade_booking: Arc<TradeBookingService>,
    pub position: Arc<PositionService>,
    pub risk: Arc<RiskService>,
    pub pricing: Arc<PricingService>,
    pub algo_streaming: Arc<AlgoStreamingService>,
    pub streaming: Arc<StreamingService>,
    pub inquiry: Arc<InquiryService>,
}

impl TradingGraph {
    /// Build every service from config and register the internal edges.
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let products = Arc::new(ProductRepository::from_config(&config.products)?);
        let sectors = Arc::new(SectorMap::from_config(&config.sectors));
        let algo = &config.algo;

        let graph = Self {
            products,
            market_data: Arc::new(MarketDataService::new()),
            algo_execution: Arc::new(AlgoExecutionService::new(algo.tight_spread, algo.spread_tolerance)),
            execution: Arc::new(ExecutionService::new()),
            trade_booking: Arc::new(TradeBookingService::new()),
            position: Arc::new(PositionService::new(sectors.clone())),
            risk: Arc::new(RiskService::new(sectors)),
            pricing: Arc::new(PricingService::new()),
            algo_streaming: Arc::new(AlgoStreamingService::new(algo.stream_sizes)),
            streaming: Arc::new(StreamingService::new()),
            inquiry: Arc::new(InquiryService::new(algo.quote_price)),
        };

        // Execution chain.
        graph.market_data.add_listener(graph.algo_execution.clone());
        graph
            .algo_execution
            .add_listener(Arc::new(AlgoExecutionToExecution::new(graph.execution.clone(), Market::BrokerTec)));
        graph
            .execution
            .add_listener(Arc::new(ExecutionToTradeBooking::new(graph.trade_booking.clone(), algo.books.clone())?));
        graph.trade_booking.add_listener(graph.position.clone());
        graph.position.add_listener(graph.risk.clone());

        // Streaming chain.
        graph.pricing.add_listener(graph.algo_streaming.clone());
        graph.algo_streaming.add_listener(Arc::new(AlgoStreamToStreaming::new(graph.streaming.clone())));

        // Inquiries answer themselves.
        graph.inquiry.set_connector(Arc::new(InquiryLoopback::new(&graph.inquiry)));

        info!(
            "[graph] built: {} products, {} sectors",
            graph.products.len(),
            config.sectors.len()
        );
        Ok(graph)
    }

    pub fn attach_outbound(&self, sinks: OutboundSinks) {
        self.execution.set_connector(sinks.executions);
        self.streaming.set_connector(sinks.streaming);
        if let Some(inquiries) = sinks.inquiries {
            self.inquiry.add_listener(Arc::new(PublishListener::new("inquiries_out", inquiries)));
        }
    }

    /// Register the persistence taps and the GUI feed.
    pub fn attach_history(&self, sinks: HistorySinks, gui: &GuiConfig) {
        self.position
            .add_listener(Arc::new(HistoricalDataService::new("hist_positions", sinks.positions)));
        self.position
            .add_bucket_listener(Arc::new(HistoricalDataService::new("hist_bucket_positions", sinks.bucket_positions)));
        self.risk.add_listener(Arc::new(HistoricalDataService::new("hist_risk", sinks.risk)));
        self.risk
            .add_bucket_listener(Arc::new(HistoricalDataService::new("hist_bucket_risk", sinks.bucket_risk)));
        self.execution
            .add_listener(Arc::new(HistoricalDataService::new("hist_executions", sinks.executions)));
        self.streaming
            .add_listener(Arc::new(HistoricalDataService::new("hist_streaming", sinks.streaming)));
        self.inquiry
            .add_listener(Arc::new(HistoricalDataService::new("hist_inquiries", sinks.inquiries)));
        self.pricing.add_listener(Arc::new(GuiService::new(gui, sinks.gui)));
    }
}
