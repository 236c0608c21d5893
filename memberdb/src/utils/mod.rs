pub mod codec;
pub mod hasher;

pub use codec::{hash32_to_hex, parse_hash32};
pub use hasher::{Hash32, ZERO_HASH32};
