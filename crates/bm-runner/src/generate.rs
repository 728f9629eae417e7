//! Sample input files in the wire formats the system reads.
//!
//! - `prices.txt`: mid walks 99 → 101 → 99 in 1/256 steps, spread alternates
//!   1/128 and 1/64
//! - `marketdata.txt`: five levels a side, 10mm..50mm, top spread cycling
//!   1/128, 1/64, 3/128, 1/32, 3/128, 1/64
//! - `trades.txt`: ten trades per product, books round robin
//! - `inquiries.txt`: ten RECEIVED inquiries per product

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::Arc,
};

use anyhow::{Context, Result};
use bm_core::{
    Bond, Inquiry, InquiryState, Order, OrderBook, Price, PricingSide, ProductRepository, Side, Trade,
    codec::ToLine, config::AppConfig,
};
use tracing::info;

const TICK: f64 = 1.0 / 256.0;
/// Ticks from 99 to 101.
const SWING: usize = 512;
const BOOK_SPREADS: [f64; 6] = [2.0 * TICK, 4.0 * TICK, 6.0 * TICK, 8.0 * TICK, 6.0 * TICK, 4.0 * TICK];
const LEVELS: usize = 5;
const TRADES_PER_PRODUCT: usize = 10;
const INQUIRIES_PER_PRODUCT: usize = 10;

/// Mid for update `i`: a triangle wave between 99 and 101.
fn mid_at(i: usize) -> f64 {
    let k = i % (2 * SWING);
    let up = if k <= SWING { k } else { 2 * SWING - k };
    99.0 + up as f64 * TICK
}

fn write_file(dir: &Path, name: &str, lines: impl Iterator<Item = String>) -> Result<usize> {
    let path = dir.join(name);
    let mut w = BufWriter::new(File::create(&path).with_context(|| format!("creating {}", path.display()))?);
    let mut n = 0;
    for line in lines {
        writeln!(w, "{line}")?;
        n += 1;
    }
    w.flush()?;
    info!("[generate] {} lines -> {}", n, path.display());
    Ok(n)
}

fn prices(bonds: &[Arc<Bond>], count: usize) -> impl Iterator<Item = String> + '_ {
    bonds.iter().flat_map(move |b| {
        (0..count).map(move |i| {
            let spread = if i % 2 == 0 { 2.0 * TICK } else { 4.0 * TICK };
            Price::new(b.clone(), mid_at(i), spread).to_line()
        })
    })
}

fn book(bond: &Arc<Bond>, i: usize) -> OrderBook {
    let mid = mid_at(i);
    let half = BOOK_SPREADS[i % BOOK_SPREADS.len()] / 2.0;
    let level = |j: usize, side: PricingSide| {
        let qty = (j as i64 + 1) * 10_000_000;
        let px = match side {
            PricingSide::Bid => mid - half - j as f64 * TICK,
            PricingSide::Offer => mid + half + j as f64 * TICK,
        };
        Order::new(px, qty, side)
    };
    OrderBook::new(
        bond.clone(),
        (0..LEVELS).map(|j| level(j, PricingSide::Bid)).collect(),
        (0..LEVELS).map(|j| level(j, PricingSide::Offer)).collect(),
    )
}

fn books(bonds: &[Arc<Bond>], count: usize) -> impl Iterator<Item = String> + '_ {
    bonds.iter().flat_map(move |b| (0..count).map(move |i| book(b, i).to_line()))
}

fn trades<'a>(bonds: &'a [Arc<Bond>], books: &'a [String]) -> impl Iterator<Item = String> + 'a {
    bonds.iter().flat_map(move |b| {
        (0..TRADES_PER_PRODUCT).map(move |n| {
            let buy = n % 2 == 0;
            Trade {
                product: b.clone(),
                trade_id: format!("{}_TRADE_{}", b.product_id, n + 1),
                price: if buy { 99.0 } else { 100.0 },
                book: books[n % books.len()].clone(),
                quantity: (n as i64 % 5 + 1) * 1_000_000,
                side: if buy { Side::Buy } else { Side::Sell },
            }
            .to_line()
        })
    })
}

fn inquiries(bonds: &[Arc<Bond>]) -> impl Iterator<Item = String> + '_ {
    bonds.iter().flat_map(move |b| {
        (0..INQUIRIES_PER_PRODUCT).map(move |n| {
            Inquiry {
                inquiry_id: format!("{}_INQ_{}", b.product_id, n + 1),
                product: b.clone(),
                side: if n % 2 == 0 { Side::Buy } else { Side::Sell },
                quantity: (n as i64 % 5 + 1) * 1_000_000,
                price: 100.0,
                state: InquiryState::Received,
            }
            .to_line()
        })
    })
}

/// Write all four files into `dir`, creating it if needed.
pub fn write_all(dir: &Path, config: &AppConfig, count: usize) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let repo = ProductRepository::from_config(&config.products)?;
    let bonds = repo.ids().iter().map(|id| repo.get(id)).collect::<bm_core::Result<Vec<_>>>()?;

    write_file(dir, "prices.txt", prices(&bonds, count))?;
    write_file(dir, "marketdata.txt", books(&bonds, count))?;
    write_file(dir, "trades.txt", trades(&bonds, &config.algo.books))?;
    write_file(dir, "inquiries.txt", inquiries(&bonds))?;
    Ok(())
}
