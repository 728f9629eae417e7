//! Whole-graph tests: records enter where the real feeds enter and are
//! checked where they leave.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use bm_core::{
    ExecutionOrder, Inquiry, InquiryState, OrderBook, PriceStream, PricingSide, Side,
    codec::FromLine,
    config::AppConfig,
    line::{LineClient, LineServer},
    shm::BoundedTextQueue,
    soa::{Connector, Service},
};
use bm_services::{
    connectors::{PublishListener, memory::RecordingConnector, shm::ShmPublisher},
    graph::{OutboundSinks, TradingGraph},
    system::TradingSystem,
};

fn graph_with(tight: f64) -> (TradingGraph, Arc<RecordingConnector<ExecutionOrder>>) {
    let mut config = AppConfig::default();
    config.algo.tight_spread = tight;
    let graph = TradingGraph::new(&config).unwrap();
    let sent = Arc::new(RecordingConnector::<ExecutionOrder>::new());
    graph.attach_outbound(OutboundSinks {
        executions: sent.clone(),
        streaming: Arc::new(RecordingConnector::<PriceStream>::new()),
        inquiries: None,
    });
    (graph, sent)
}

#[test]
fn tight_book_becomes_one_trade() {
    let (graph, sent) = graph_with(1.0 / 32.0);
    let line = "10Y|99.96875:5000000;99.9375:7000000|100.0:4000000;100.03125:9000000";
    let book = OrderBook::from_line(line, &graph.products).unwrap();

    graph.market_data.on_message(book);

    assert_eq!(sent.len(), 1);
    assert_eq!(graph.trade_booking.len(), 1);
    let trade = graph.trade_booking.get_data("EXEC_TRADE_1").unwrap();
    // First trigger lifts the offer: a BUY for the top offer size.
    assert_eq!(trade.side, Side::Buy);
    assert_eq!(trade.quantity, 4_000_000);
    assert_eq!(trade.price, 100.0);
    assert_eq!(graph.position.get_data("10Y").unwrap().aggregate(), 4_000_000);
}

#[test]
fn sides_alternate_across_products() {
    let (graph, sent) = graph_with(1.0 / 32.0);
    for pid in ["2Y", "5Y", "30Y"] {
        let line = format!("{pid}|99-310:1000000|100-000:2000000");
        graph.market_data.on_message(OrderBook::from_line(&line, &graph.products).unwrap());
    }
    // Not tight: skipped without consuming a side.
    graph
        .market_data
        .on_message(OrderBook::from_line("7Y|99-300:1000000|100-000:2000000", &graph.products).unwrap());

    let sides: Vec<PricingSide> = sent.snapshot().iter().map(|o| o.side).collect();
    assert_eq!(sides, vec![PricingSide::Offer, PricingSide::Bid, PricingSide::Offer]);
    let ids: Vec<String> = sent.snapshot().into_iter().map(|o| o.order_id).collect();
    assert_eq!(ids, vec!["2Y_EXE_1", "5Y_EXE_2", "30Y_EXE_3"]);
}

#[test]
fn received_inquiry_ends_done() {
    let (graph, _) = graph_with(1.0 / 128.0);
    let seen = Arc::new(RecordingConnector::<Inquiry>::new());
    graph.inquiry.add_listener(Arc::new(PublishListener::<Inquiry>::new("seen", seen.clone())));

    let inq = Inquiry::from_line("INQ42,20Y,SELL,3000000,99-160,RECEIVED", &graph.products).unwrap();
    graph.inquiry.on_message(inq);

    let states: Vec<InquiryState> = seen.snapshot().iter().map(|i| i.state).collect();
    assert_eq!(states, vec![InquiryState::Received, InquiryState::Quoted, InquiryState::Done]);
    assert_eq!(graph.inquiry.get_data("INQ42").unwrap().price, 100.0);
}

// ---------------------------------------------------------------------------
// Full process: TCP and shared memory in, TCP and files out
// ---------------------------------------------------------------------------

fn unique_shm() -> String {
    static SEQ: AtomicU32 = AtomicU32::new(0);
    format!("bm_e2e_{}_{}", std::process::id(), SEQ.fetch_add(1, Ordering::Relaxed))
}

async fn next_line(server: &mut LineServer) -> String {
    tokio::time::timeout(Duration::from_secs(5), async {
        if server.peer().is_none() {
            server.accept_one().await.unwrap();
        }
        server.read_line().await.unwrap().unwrap()
    })
    .await
    .expect("no outbound line within 5s")
}

async fn eventually(mut probe: impl FnMut() -> bool) {
    for _ in 0..500 {
        if probe() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 5s");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn running_system_moves_records_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut exec_out = LineServer::bind("127.0.0.1:0").await.unwrap();
    let mut stream_out = LineServer::bind("127.0.0.1:0").await.unwrap();

    let mut config = AppConfig::default();
    config.inbound.bind_host = "127.0.0.1".into();
    config.inbound.prices_port = 0;
    config.inbound.trades_port = 0;
    config.inbound.inquiries_port = 0;
    config.outbound.executions_port = exec_out.local_addr().unwrap().port();
    config.outbound.streaming_port = stream_out.local_addr().unwrap().port();
    config.shm.name = unique_shm();
    config.shm.capacity = 16;
    config.shm.max_message_size = 512;
    config.history.dir = dir.path().to_path_buf();
    config.algo.tight_spread = 1.0 / 32.0;

    let mut system = TradingSystem::new(config.clone()).unwrap();
    system.start().await.unwrap();

    // Market data over shared memory -> execution order over TCP.
    let publisher = ShmPublisher::open(&config.shm.name, config.shm.capacity, config.shm.max_message_size).unwrap();
    let book = OrderBook::from_line("5Y|99-310:2000000|100-000:1000000", &system.graph().products).unwrap();
    Connector::<OrderBook>::publish(&publisher, &book).unwrap();
    let exec_line = next_line(&mut exec_out).await;
    assert!(exec_line.starts_with("5Y,5Y_EXE_1,OFFER,MARKET,100-000,1000000,0,"), "{exec_line}");

    // Prices over TCP -> two-way stream over TCP.
    let prices = system.inbound_addr("prices").unwrap();
    let mut c = LineClient::connect("127.0.0.1", prices.port()).await.unwrap();
    c.write_line("2Y,99-160,0-002").await.unwrap();
    let stream_line = next_line(&mut stream_out).await;
    assert!(stream_line.starts_with("2Y,99-157,1000000,2000000,99-161,1000000,2000000"), "{stream_line}");

    // Trades over TCP -> positions, and the position history file.
    let trades = system.inbound_addr("trades").unwrap();
    let mut c = LineClient::connect("127.0.0.1", trades.port()).await.unwrap();
    c.write_line("T1,7Y,99-000,TRSY3,3000000,SELL").await.unwrap();
    c.write_line("not,a,trade").await.unwrap();
    c.write_line("T2,7Y,99-000,TRSY3,1000000,BUY").await.unwrap();
    let positions_file = config.history.path(&config.history.positions);
    eventually(|| {
        std::fs::read_to_string(&positions_file)
            .is_ok_and(|h| h.lines().any(|l| l.ends_with(",7Y,TRSY3:-2000000,-2000000")))
    })
    .await;
    assert_eq!(system.graph().position.get_data("7Y").unwrap().aggregate(), -2_000_000);

    // Inquiries over TCP -> DONE.
    let inquiries = system.inbound_addr("inquiries").unwrap();
    let mut c = LineClient::connect("127.0.0.1", inquiries.port()).await.unwrap();
    c.write_line("Q1,3Y,BUY,1000000,99-000,RECEIVED").await.unwrap();
    let inquiry = system.graph().inquiry.clone();
    eventually(|| inquiry.get_data("Q1").is_ok_and(|i| i.state == InquiryState::Done)).await;

    system.stop();
    BoundedTextQueue::remove(&config.shm.name).unwrap();
}
