//! Report exports.

mod stock;

pub use stock::*;
