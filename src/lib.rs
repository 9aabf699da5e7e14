//! Retirement savings projections with monthly compounding, plus solvers
//! for retirement age, withdrawal rate and required monthly investment.
//!
//! [`core`] is pure and synchronous. [`api`] binds plans to query-string
//! parameters and chart series and serves them over HTTP.

pub mod api;
pub mod config;
pub mod core;
