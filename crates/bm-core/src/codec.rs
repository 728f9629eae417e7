//! One-line text codec for every record that crosses a process boundary.
//!
//! | record          | line                                                       |
//! |-----------------|------------------------------------------------------------|
//! | `Price`         | `productId,mid,spread`                                     |
//! | `Trade`         | `tradeId,productId,price,book,qty,BUY\|SELL`               |
//! | `OrderBook`     | `productId\|px:qty;px:qty\|px:qty;...`                     |
//! | `Inquiry`       | `inquiryId,productId,BUY\|SELL,qty,price,STATE`            |
//! | `ExecutionOrder`| `productId,orderId,BID\|OFFER,type,px,vis,hid,parent,0\|1` |
//! | `PriceStream`   | `productId,bidPx,bidVis,bidHid,offerPx,offerVis,offerHid`  |
//!
//! Readers accept fractional or decimal prices; writers always emit the
//! fractional notation. History-only records (positions, risk, buckets)
//! implement [`ToLine`] alone.

use crate::{
    error::{MeshError, Result},
    price::{format_fractional, parse_price},
    types::*,
};

/// Serialize a record to a single line (no trailing newline).
pub trait ToLine {
    fn to_line(&self) -> String;
}

/// Deserialize a record from a single line, resolving its product.
pub trait FromLine: Sized {
    fn from_line(line: &str, products: &ProductRepository) -> Result<Self>;
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn split_exact<'a, const N: usize>(line: &'a str, sep: char, what: &str) -> Result<[&'a str; N]> {
    let fields: Vec<&str> = line.trim_end().split(sep).collect();
    let got = fields.len();
    fields
        .try_into()
        .map_err(|_| MeshError::Parse(format!("{what}: expected {N} fields, got {got} in '{line}'")))
}

fn parse_qty(s: &str) -> Result<i64> {
    s.trim().parse().map_err(|_| MeshError::Parse(format!("bad quantity '{s}'")))
}

// ---------------------------------------------------------------------------
// Price
// ---------------------------------------------------------------------------

impl FromLine for Price {
    fn from_line(line: &str, products: &ProductRepository) -> Result<Self> {
        let [pid, mid, spread] = split_exact(line, ',', "price")?;
        let product = products.get(pid.trim())?;
        Ok(Price::new(product, parse_price(mid)?, parse_price(spread)?))
    }
}

impl ToLine for Price {
    fn to_line(&self) -> String {
        format!(
            "{},{},{}",
            self.product_id(),
            format_fractional(self.mid),
            format_fractional(self.bid_offer_spread)
        )
    }
}

/// GUI rows keep full decimal precision.
pub fn gui_price_line(price: &Price) -> String {
    format!("{},{},{}", price.product_id(), price.mid, price.bid_offer_spread)
}

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

impl FromLine for Trade {
    fn from_line(line: &str, products: &ProductRepository) -> Result<Self> {
        let [trade_id, pid, px, book, qty, side] = split_exact(line, ',', "trade")?;
        Ok(Trade {
            product: products.get(pid.trim())?,
            trade_id: trade_id.trim().to_string(),
            price: parse_price(px)?,
            book: book.trim().to_string(),
            quantity: parse_qty(qty)?,
            side: side.parse()?,
        })
    }
}

impl ToLine for Trade {
    fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            self.trade_id,
            self.product_id(),
            format_fractional(self.price),
            self.book,
            self.quantity,
            self.side
        )
    }
}

// ---------------------------------------------------------------------------
// OrderBook
// ---------------------------------------------------------------------------

fn parse_stack(s: &str, side: PricingSide) -> Result<Vec<Order>> {
    let mut out = Vec::new();
    for level in s.split(';').filter(|l| !l.trim().is_empty()) {
        let Some((px, qty)) = level.split_once(':') else {
            return Err(MeshError::Parse(format!("bad level '{level}'")));
        };
        if qty.contains(':') {
            return Err(MeshError::Parse(format!("bad level '{level}'")));
        }
        out.push(Order::new(parse_price(px)?, parse_qty(qty)?, side));
    }
    Ok(out)
}

fn format_stack(stack: &[Order]) -> String {
    stack
        .iter()
        .map(|o| format!("{}:{}", format_fractional(o.price), o.quantity))
        .collect::<Vec<_>>()
        .join(";")
}

impl FromLine for OrderBook {
    fn from_line(line: &str, products: &ProductRepository) -> Result<Self> {
        let [pid, bids, offers] = split_exact(line, '|', "order book")?;
        let product = products.get(pid.trim())?;
        Ok(OrderBook::new(
            product,
            parse_stack(bids, PricingSide::Bid)?,
            parse_stack(offers, PricingSide::Offer)?,
        ))
    }
}

impl ToLine for OrderBook {
    fn to_line(&self) -> String {
        format!(
            "{}|{}|{}",
            self.product_id(),
            format_stack(&self.bid_stack),
            format_stack(&self.offer_stack)
        )
    }
}

// ---------------------------------------------------------------------------
// Inquiry
// ---------------------------------------------------------------------------

impl FromLine for Inquiry {
    fn from_line(line: &str, products: &ProductRepository) -> Result<Self> {
        let [id, pid, side, qty, px, state] = split_exact(line, ',', "inquiry")?;
        Ok(Inquiry {
            inquiry_id: id.trim().to_string(),
            product: products.get(pid.trim())?,
            side: side.parse()?,
            quantity: parse_qty(qty)?,
            price: parse_price(px)?,
            state: state.parse()?,
        })
    }
}

impl ToLine for Inquiry {
    fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            self.inquiry_id,
            self.product_id(),
            self.side,
            self.quantity,
            format_fractional(self.price),
            self.state
        )
    }
}

// ---------------------------------------------------------------------------
// ExecutionOrder
// ---------------------------------------------------------------------------

impl FromLine for ExecutionOrder {
    fn from_line(line: &str, products: &ProductRepository) -> Result<Self> {
        let [pid, order_id, side, order_type, px, visible, hidden, parent, child] =
            split_exact(line, ',', "execution order")?;
        let is_child_order = match child.trim() {
            "0" => false,
            "1" => true,
            other => return Err(MeshError::Parse(format!("bad child flag '{other}'"))),
        };
        let parent = parent.trim();
        Ok(ExecutionOrder {
            product: products.get(pid.trim())?,
            side: side.parse()?,
            order_id: order_id.trim().to_string(),
            order_type: order_type.parse()?,
            price: parse_price(px)?,
            visible_quantity: parse_qty(visible)?,
            hidden_quantity: parse_qty(hidden)?,
            parent_order_id: (!parent.is_empty()).then(|| parent.to_string()),
            is_child_order,
        })
    }
}

impl ToLine for ExecutionOrder {
    fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{}",
            self.product_id(),
            self.order_id,
            self.side,
            self.order_type,
            format_fractional(self.price),
            self.visible_quantity,
            self.hidden_quantity,
            self.parent_order_id.as_deref().unwrap_or(""),
            u8::from(self.is_child_order)
        )
    }
}

// ---------------------------------------------------------------------------
// PriceStream
// ---------------------------------------------------------------------------

impl FromLine for PriceStream {
    fn from_line(line: &str, products: &ProductRepository) -> Result<Self> {
        let [pid, bid_px, bid_vis, bid_hid, offer_px, offer_vis, offer_hid] =
            split_exact(line, ',', "price stream")?;
        Ok(PriceStream {
            product: products.get(pid.trim())?,
            bid_order: PriceStreamOrder {
                price: parse_price(bid_px)?,
                visible_quantity: parse_qty(bid_vis)?,
                hidden_quantity: parse_qty(bid_hid)?,
                side: PricingSide::Bid,
            },
            offer_order: PriceStreamOrder {
                price: parse_price(offer_px)?,
                visible_quantity: parse_qty(offer_vis)?,
                hidden_quantity: parse_qty(offer_hid)?,
                side: PricingSide::Offer,
            },
        })
    }
}

impl ToLine for PriceStream {
    fn to_line(&self) -> String {
        let (b, o) = (&self.bid_order, &self.offer_order);
        format!(
            "{},{},{},{},{},{},{}",
            self.product_id(),
            format_fractional(b.price),
            b.visible_quantity,
            b.hidden_quantity,
            format_fractional(o.price),
            o.visible_quantity,
            o.hidden_quantity
        )
    }
}

// ---------------------------------------------------------------------------
// History-only records
// ---------------------------------------------------------------------------

impl ToLine for Position {
    fn to_line(&self) -> String {
        let books = self
            .books()
            .iter()
            .map(|(book, qty)| format!("{book}:{qty}"))
            .collect::<Vec<_>>()
            .join(";");
        format!("{},{},{}", self.product_id(), books, self.aggregate())
    }
}

impl ToLine for PV01 {
    fn to_line(&self) -> String {
        format!("{},{},{}", self.product_id(), self.pv01, self.quantity)
    }
}

impl ToLine for BucketedPosition {
    fn to_line(&self) -> String {
        format!("{},{}", self.sector, self.quantity)
    }
}

impl ToLine for BucketedRisk {
    fn to_line(&self) -> String {
        format!("{},{},{}", self.sector, self.pv01, self.quantity)
    }
}
