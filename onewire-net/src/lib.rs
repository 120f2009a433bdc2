#![no_std]
#![deny(missing_docs)]
//! # onewire-net
//! A no-std implementation of the 1-Wire bus protocol engine.
//!
//! The [OneWire] trait defines the primitive operations a physical transport has to provide:
//! resetting the bus, exchanging bits and bytes under wired-AND semantics, and waiting.
//! On top of it this crate implements:
//! - the Dallas/Maxim CRC-8 accumulator, [OneWireCrc],
//! - the 64-bit ROM code model and MATCH ROM addressing, [RomCode],
//! - the [1-Wire search algorithm](https://www.analog.com/en/resources/app-notes/1wire-search-algorithm.html)
//!   in [OneWireSearch], for normal, alarm-only and family-restricted discovery.
//!
//! With the `sim` feature enabled, the `sim` module provides a bit-level simulated bus for tests.

#[cfg(any(test, feature = "sim"))]
extern crate alloc;

mod consts;
mod crc;
mod error;
mod rom;
mod search;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
mod traits;

pub use consts::*;
pub use crc::OneWireCrc;
pub use error::OneWireError;
pub use rom::RomCode;
pub use search::{OneWireSearch, OneWireSearchKind};
pub use traits::{BusStatus, DEFAULT_MAX_BLOCK_LEN, OneWire};

/// Result of a 1-Wire protocol operation.
pub type OneWireResult<T, E> = Result<T, OneWireError<E>>;
