//! Domain Layer
//!
//! Request descriptions, the request budget, market records and query
//! results. Nothing here performs I/O.

pub mod budget;
pub mod market;
pub mod request;
pub mod result;
