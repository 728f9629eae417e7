//! Configuration parsing for the trading-system process.
//!
//! All settings come from a single JSON file. Every section and field has a
//! default, so `{}` describes a complete local setup: TCP inbound ports
//! 9001/9002/9003, outbound ports 9101/9102, the `BOND_MD_SHM` market data
//! queue, and the seven-tenor Treasury universe.
//!
//! # Example config
//!
//! ```json
//! {
//!   "module": { "module_name": "trading_system", "log_path": "/tmp/log" },
//!   "inbound": { "prices_port": 9001, "trades_port": 9002, "inquiries_port": 9003 },
//!   "outbound": { "host": "127.0.0.1", "executions_port": 9101, "streaming_port": 9102 },
//!   "shm": { "name": "BOND_MD_SHM", "capacity": 8192, "max_message_size": 2048 },
//!   "algo": { "tight_spread": 0.0078125, "stream_sizes": [1000000, 2000000] },
//!   "history": { "dir": "./history" }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{
    error::{MeshError, Result},
    types::BondIdType,
};

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub module: ModuleMeta,
    pub inbound: InboundConfig,
    pub outbound: OutboundConfig,
    pub shm: ShmConfig,
    pub algo: AlgoConfig,
    pub history: HistoryConfig,
    pub gui: GuiConfig,
    #[serde(default = "default_products")]
    pub products: Vec<ProductConfig>,
    #[serde(default = "default_sectors")]
    pub sectors: Vec<SectorConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            module: ModuleMeta::default(),
            inbound: InboundConfig::default(),
            outbound: OutboundConfig::default(),
            shm: ShmConfig::default(),
            algo: AlgoConfig::default(),
            history: HistoryConfig::default(),
            gui: GuiConfig::default(),
            products: default_products(),
            sectors: default_sectors(),
        }
    }
}

/// Module metadata block.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

/// TCP listen ports, one per inbound record type.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InboundConfig {
    pub bind_host: String,
    pub prices_port: u16,
    pub trades_port: u16,
    pub inquiries_port: u16,
}

impl Default for InboundConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".into(),
            prices_port: 9001,
            trades_port: 9002,
            inquiries_port: 9003,
        }
    }
}

/// Downstream TCP line servers the trading system publishes to.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    pub host: String,
    pub executions_port: u16,
    pub streaming_port: u16,
    /// Inquiry state changes leave over TCP only when this is set.
    pub inquiries_port: Option<u16>,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            executions_port: 9101,
            streaming_port: 9102,
            inquiries_port: None,
        }
    }
}

/// Shared-memory market data queue.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShmConfig {
    pub name: String,
    pub capacity: u32,
    pub max_message_size: u32,
    /// CPU core for the queue consumer thread.
    pub cpu_affinity: Option<usize>,
}

impl Default for ShmConfig {
    fn default() -> Self {
        Self {
            name: "BOND_MD_SHM".into(),
            capacity: 8192,
            max_message_size: 2048,
            cpu_affinity: None,
        }
    }
}

/// Algo execution / streaming / inquiry parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlgoConfig {
    /// Spread at which algo execution aggresses the book.
    pub tight_spread: f64,
    pub spread_tolerance: f64,
    /// Visible sizes the algo stream alternates between.
    pub stream_sizes: [i64; 2],
    /// Price quoted back on every RECEIVED inquiry.
    pub quote_price: f64,
    /// Books that execution-fed trades are booked into, round robin.
    pub books: Vec<String>,
}

impl Default for AlgoConfig {
    fn default() -> Self {
        Self {
            tight_spread: 1.0 / 128.0,
            spread_tolerance: 1e-9,
            stream_sizes: [1_000_000, 2_000_000],
            quote_price: 100.0,
            books: vec!["TRSY1".into(), "TRSY2".into(), "TRSY3".into()],
        }
    }
}

/// Historical file sinks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub dir: PathBuf,
    pub positions: String,
    pub bucket_positions: String,
    pub risk: String,
    pub bucket_risk: String,
    pub executions: String,
    pub streaming: String,
    pub inquiries: String,
    pub gui: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            positions: "positions.txt".into(),
            bucket_positions: "bucket_positions.txt".into(),
            risk: "risk.txt".into(),
            bucket_risk: "bucket_risk.txt".into(),
            executions: "executions.txt".into(),
            streaming: "streaming.txt".into(),
            inquiries: "allinquiries.txt".into(),
            gui: "gui.txt".into(),
        }
    }
}

impl HistoryConfig {
    /// Full path of one history file.
    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }
}

/// Throttled GUI price output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuiConfig {
    pub throttle_ms: u64,
    pub max_lines: usize,
}

impl Default for GuiConfig {
    fn default() -> Self {
        Self { throttle_ms: 300, max_lines: 100 }
    }
}

/// Registry entry for one bond.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductConfig {
    pub product_id: String,
    #[serde(default)]
    pub id_type: BondIdType,
    #[serde(default = "default_ticker")]
    pub ticker: String,
    pub coupon: f64,
    pub maturity: String,
    pub pv01: f64,
}

/// A named bucket of product ids.
#[derive(Debug, Clone, Deserialize)]
pub struct SectorConfig {
    pub name: String,
    pub products: Vec<String>,
}

fn default_ticker() -> String {
    "T".into()
}

/// The seven on-the-run Treasury tenors.
pub fn default_products() -> Vec<ProductConfig> {
    [
        ("2Y", "2027-12-31", 0.020),
        ("3Y", "2028-12-31", 0.028),
        ("5Y", "2030-12-31", 0.045),
        ("7Y", "2032-12-31", 0.060),
        ("10Y", "2035-12-31", 0.085),
        ("20Y", "2045-12-31", 0.120),
        ("30Y", "2055-12-31", 0.150),
    ]
    .into_iter()
    .map(|(id, maturity, pv01)| ProductConfig {
        product_id: id.into(),
        id_type: BondIdType::Cusip,
        ticker: default_ticker(),
        coupon: 0.045,
        maturity: maturity.into(),
        pv01,
    })
    .collect()
}

/// Front end / belly / long end of the curve.
pub fn default_sectors() -> Vec<SectorConfig> {
    vec![
        SectorConfig { name: "FrontEnd".into(), products: vec!["2Y".into(), "3Y".into()] },
        SectorConfig {
            name: "Belly".into(),
            products: vec!["5Y".into(), "7Y".into(), "10Y".into()],
        },
        SectorConfig { name: "LongEnd".into(), products: vec!["20Y".into(), "30Y".into()] },
    ]
}

impl AppConfig {
    /// Module name used for log files, defaulting to `"trading_system"`.
    pub fn module_name(&self) -> String {
        self.module.module_name.clone().unwrap_or_else(|| "trading_system".into())
    }

    /// Reject settings that would make a component unusable.
    pub fn validate(&self) -> Result<()> {
        if self.shm.capacity == 0 {
            return Err(MeshError::Config("shm.capacity must be > 0".into()));
        }
        if self.shm.max_message_size < 2 {
            return Err(MeshError::Config("shm.max_message_size must be >= 2".into()));
        }
        if self.algo.books.is_empty() {
            return Err(MeshError::Config("algo.books must not be empty".into()));
        }
        for sector in &self.sectors {
            for pid in &sector.products {
                if !self.products.iter().any(|p| &p.product_id == pid) {
                    return Err(MeshError::Config(format!(
                        "sector '{}' names unknown product '{pid}'",
                        sector.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_complete() {
        let cfg: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.inbound.prices_port, 9001);
        assert_eq!(cfg.outbound.streaming_port, 9102);
        assert_eq!(cfg.shm.capacity, 8192);
        assert_eq!(cfg.shm.max_message_size, 2048);
        assert_eq!(cfg.products.len(), 7);
        assert_eq!(cfg.sectors.len(), 3);
        assert_eq!(cfg.algo.tight_spread, 1.0 / 128.0);
        assert_eq!(cfg.module_name(), "trading_system");
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_override() {
        let cfg: AppConfig = serde_json::from_str(
            r#"{ "shm": { "name": "TEST_MD", "capacity": 16 }, "algo": { "tight_spread": 0.03125 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.shm.name, "TEST_MD");
        assert_eq!(cfg.shm.capacity, 16);
        assert_eq!(cfg.shm.max_message_size, 2048);
        assert_eq!(cfg.algo.tight_spread, 0.03125);
        assert_eq!(cfg.algo.books.len(), 3);
    }

    #[test]
    fn sector_with_unknown_product_rejected() {
        let cfg: AppConfig = serde_json::from_str(
            r#"{ "sectors": [ { "name": "Ultra", "products": ["50Y"] } ] }"#,
        )
        .unwrap();
        assert!(matches!(cfg.validate(), Err(MeshError::Config(_))));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{ "module": { "module_name": "ts_test" } }"#).unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.module_name(), "ts_test");
    }
}
