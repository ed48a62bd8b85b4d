//! Icom CI-V protocol codec
//!
//! CI-V (Communication Interface V) is Icom's asynchronous serial control
//! protocol. It uses framed variable-length binary messages with
//! address-based routing:
//!
//! ```text
//! FE FE [to] [from] [cmd] [subcmd] [data...] FD
//! ```
//!
//! - `FE FE`: Preamble (two bytes)
//! - `to`: Destination address (radio address, or 0xE0 for the controller)
//! - `from`: Source address
//! - `cmd`: Command code
//! - `subcmd`: Sub-command code (optional, depends on command)
//! - `data`: Variable length payload (BCD encoded for frequencies)
//! - `FD`: Terminator
//!
//! The bus is half duplex: a controller reading its own transmit echo back
//! is normal, and parsing must tolerate repeated preamble bytes.
//!
//! # Frequency Encoding
//!
//! Frequencies are BCD encoded, least-significant nibble first, five bytes
//! for ten decimal digits of hertz. Example: 144.500.000 Hz =
//! `00 50 45 44 01`.
//!
//! # Example
//!
//! ```rust
//! use spot_protocol::{build_request, parse, cmd, IC705_ADDR};
//!
//! let wire = build_request(IC705_ADDR, cmd::READ_FREQUENCY, None, &[]);
//! assert_eq!(wire, vec![0xFE, 0xFE, 0xA4, 0xE0, 0x03, 0xFD]);
//!
//! let reply = [0xFE, 0xFE, 0xE0, 0xA4, 0x03, 0x00, 0x50, 0x45, 0x44, 0x01, 0xFD];
//! let frame = parse(&reply).unwrap();
//! assert_eq!(spot_protocol::bcd::decode_frequency(&frame.data), 144_500_000);
//! ```

pub mod bcd;
pub mod error;
pub mod frame;

pub use error::ParseError;
pub use frame::{
    build_request, cmd, parse, try_parse, CivCodec, CivFrame, ACK, CONTROLLER_ADDR, IC705_ADDR,
    NAK, PREAMBLE, TERMINATOR,
};
