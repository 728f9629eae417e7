//! Domain records flowing through the service graph.
//!
//! Every record carries its product as an `Arc<Bond>` resolved from the
//! [`ProductRepository`] at decode time.

pub mod enums;
pub mod market_data;
pub mod product;
pub mod risk;
pub mod trading;

pub use enums::*;
pub use market_data::*;
pub use product::*;
pub use risk::*;
pub use trading::*;
