//! indexvest-core
//!
//! Units, constants, error taxonomy and the pure vesting arithmetic:
//! the index converter, the linear vesting curve and the term records
//! the state crate persists. Nothing here performs I/O.

pub mod authority;
pub mod config;
pub mod constants;
pub mod curve;
pub mod error;
pub mod index;
pub mod math;
pub mod term;
pub mod types;

pub use authority::Authority;
pub use config::{FixedLedgerConfig, SupplyLedgerConfig};
pub use constants::*;
pub use curve::VestingWindow;
pub use error::{ErrorKind, VestingError};
pub use index::{from_index_adjusted, to_index_adjusted};
pub use term::{FixedTerm, SupplyTerm, TermRecord};
pub use types::*;
