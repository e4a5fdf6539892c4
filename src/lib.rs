#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused_extern_crates,
    unused,

    missing_debug_implementations,

    clippy::all,
    clippy::restriction,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
)]

#![deny(
    unused_variables,
    unused_assignments,
    dead_code,
    unused_must_use,
    trivial_numeric_casts,
    redundant_semicolon
)]

#![forbid(unsafe_code)]

// TODO #![warn(missing_docs)]

pub mod error;
pub mod math;
pub mod block;
pub mod scalar;
pub mod bitstream;
pub mod codec;
pub mod store;
pub mod cache;
pub mod array;

/// Re-exports of the types most callers need to build and use a compressed array.
pub mod prelude {
    pub use crate::array::{Array, Array1, Array2, Array3, Array4};
    pub use crate::codec::{BlockCodec, FixedRateQuantizer};
    pub use crate::error::{Error, Result};
    pub use crate::scalar::Scalar;
}
