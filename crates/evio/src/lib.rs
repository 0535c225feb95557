//! Top-level facade crate for evio.
//!
//! Re-exports the codec core and the attachment pipeline so users can depend on a single crate.

pub mod core {
    pub use evio_core::*;
}

pub mod stream {
    pub use evio_stream::*;
}
