//! Test support for the pente crates: a bytecode assembler, hand-assembled
//! fixture contracts with their artifacts, and contract call helpers.
pub mod asm;
mod bond_tracker;
pub mod contracts;

pub use bond_tracker::{BondTrackerHelper, HelperError, constructor_params};
pub use contracts::FixtureResources;

use evm_runner::Address;

/// Lowercase `0x` hex form of an address, as the privacy group prints it.
pub fn address_hex(address: Address) -> String {
    format!("{address:#x}")
}
