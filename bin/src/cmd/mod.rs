//! CLI subcommand modules.

pub(crate) mod backtest;
pub(crate) mod factors;
pub(crate) mod index;
