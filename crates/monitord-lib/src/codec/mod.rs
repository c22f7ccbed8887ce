//! Hand-rolled JSON codec for the collector wire format
//!
//! This module provides:
//! - Value encoding to single-line JSON text
//! - Shape-directed decoding (the wire format carries no type tags)
//! - A delimiter matcher used to split lists and objects without a full parser
//! - Positional argument packing (`{"an":N,"a1":...,"aN":...}`)

mod argv;
mod error;
mod json;
mod scan;
mod value;


pub use argv::{pack, unpack, unpack_exact, ARGUMENT_COUNT_KEY, MAX_ARGUMENTS};
pub use error::{DecodeError, EncodeError};
pub use json::{decode, encode, escape_str, unescape_str, MAX_DEPTH};
pub use scan::find_unnested;
pub use value::{Shape, Value, WireFormat};
