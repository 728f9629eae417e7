//! # bm-services
//!
//! The bond trading service graph built on `bm-core`.
//!
//! ## Services
//!
//! - [`market_data`], [`algo_execution`], [`execution`], [`trade_booking`],
//!   [`position`], [`risk`]: order books through to bucketed risk
//! - [`pricing`], [`algo_streaming`], [`streaming`]: internal prices through
//!   to two-way streams
//! - [`inquiry`]: client request-for-quote workflow
//! - [`historical`], [`gui`]: persistence taps and the throttled GUI feed
//!
//! ## Plumbing
//!
//! - [`sector`]: incremental per-sector totals
//! - [`bridge`]: listener edges between services
//! - [`connectors`]: TCP, shared memory, file, loopback, in-memory
//! - [`graph`]: builds and wires every service
//! - [`system`]: start/stop lifecycle driven by the runner

pub mod algo_execution;
pub mod algo_streaming;
pub mod bridge;
pub mod connectors;
pub mod execution;
pub mod graph;
pub mod gui;
pub mod historical;
pub mod inquiry;
pub mod market_data;
pub mod position;
pub mod pricing;
pub mod risk;
pub mod sector;
pub mod streaming;
pub mod system;
pub mod trade_booking;
