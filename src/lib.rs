//! Purchasing concierge and burger/pizza seller agents speaking the A2A protocol.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod a2a;
pub mod brain;
pub mod cli;
pub mod concierge;
pub mod config;
pub mod logging;
pub mod pricing;
pub mod seller;
pub mod utils;

#[cfg(test)]
mod test_helpers;
