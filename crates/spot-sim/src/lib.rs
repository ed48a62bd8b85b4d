//! Virtual IC-705
//!
//! A protocol-accurate stand-in for the radio side of the CI-V link.
//! Tests connect one end of `tokio::io::duplex` to the real radio client
//! and drive the other end through [`VirtualIc705`], flipping squelch and
//! retuning mid-run through a [`SimHandle`].

pub mod radio;

pub use radio::{spawn, SimHandle, VirtualIc705};
