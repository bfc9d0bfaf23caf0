// SPDX-License-Identifier: CC0-1.0

//! Types returned by the Bitcoin Core JSON-RPC API.
//!
//! Each `raw` type mirrors the JSON shape Core actually returns (rustdocs
//! copied from Core, bugs and all); each has an `into_model()` that produces
//! the version-nonspecific, strongly typed sibling in [`model`]. Unlike the
//! upstream `corepc-types` this crate only models the four calls the
//! provenance tracer uses: `getblockchaininfo`, `getrawtransaction`,
//! `gettxout`, `validateaddress`.

/// Re-export the `rust-bitcoin` crate so downstream crates stay in lockstep.
pub extern crate bitcoin;

pub mod model;
pub mod raw;

use core::fmt;

/// Converts an `i64` numeric type to a `u32`.
///
/// The Bitcoin Core JSON-RPC API marks fields as 'numeric' without saying
/// whether they can be negative; Core has been known to return `-1` for
/// "not applicable". We decode as `i64` on the wire and convert here so a
/// genuinely negative value is a typed error instead of a silent wrap.
pub fn to_u32(value: i64, field: &'static str) -> Result<u32, NumericError> {
    if value.is_negative() {
        return Err(NumericError::Negative { value, field });
    }
    u32::try_from(value).map_err(|_| NumericError::Overflow { value, field })
}

/// Error converting an `i64` to a `u32`.
#[derive(Debug)]
pub enum NumericError {
    /// Expected an unsigned numeric value however the value was negative.
    Negative { field: &'static str, value: i64 },
    /// A value larger than `u32::MAX` was unexpectedly encountered.
    Overflow { field: &'static str, value: i64 },
}

impl fmt::Display for NumericError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use NumericError::*;
        match *self {
            Negative { field, value } => write!(f, "field '{field}' unexpectedly negative: {value}"),
            Overflow { field, value } => write!(f, "field '{field}' overflows u32: {value}"),
        }
    }
}

impl std::error::Error for NumericError {}
