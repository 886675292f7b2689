pub mod configuration;
pub mod error;
pub mod hashinator;
pub mod partitioning;
pub mod telemetry;
pub mod utils;
pub mod value;

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;
