//! Strategos - dice-driven stack combat and Monte-Carlo campaign AI

pub mod ai;
pub mod campaign;
pub mod combat;
pub mod core;
pub mod dice;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod testing;
pub mod units;
