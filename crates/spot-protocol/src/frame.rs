//! CI-V frame building and parsing

use crate::bcd;

/// CI-V frame preamble byte
pub const PREAMBLE: u8 = 0xFE;
/// CI-V frame terminator byte
pub const TERMINATOR: u8 = 0xFD;
/// Default controller address
pub const CONTROLLER_ADDR: u8 = 0xE0;
/// Factory CI-V address of the IC-705
pub const IC705_ADDR: u8 = 0xA4;
/// Positive acknowledgement command byte
pub const ACK: u8 = 0xFB;
/// Negative acknowledgement command byte
pub const NAK: u8 = 0xFA;

/// Maximum frame length (reasonable limit)
const MAX_FRAME_LEN: usize = 64;

/// Command and sub-command codes used against the IC-705
pub mod cmd {
    /// Read operating frequency
    pub const READ_FREQUENCY: u8 = 0x03;
    /// Read operating mode
    pub const READ_MODE: u8 = 0x04;
    /// Set operating frequency
    pub const SET_FREQUENCY: u8 = 0x05;
    /// Set operating mode
    pub const SET_MODE: u8 = 0x06;
    /// Set a level; the squelch threshold lives under sub-command 0x03
    pub const SET_LEVEL: u8 = 0x14;
    /// Read a meter or status flag
    pub const READ_STATUS: u8 = 0x15;

    /// Squelch level sub-command of [`SET_LEVEL`]
    pub const SUB_SQUELCH_LEVEL: u8 = 0x03;
    /// Squelch open/closed sub-command of [`READ_STATUS`]
    pub const SUB_SQUELCH_STATUS: u8 = 0x01;
    /// S-meter sub-command of [`READ_STATUS`]
    pub const SUB_S_METER: u8 = 0x02;
}

/// A parsed CI-V frame
///
/// `data` holds everything between the command byte and the terminator,
/// sub-command included when the command carries one; on the wire the two
/// are indistinguishable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CivFrame {
    /// Destination address
    pub to: u8,
    /// Source address
    pub from: u8,
    /// Command code
    pub cmd: u8,
    /// Payload between the command byte and the terminator
    pub data: Vec<u8>,
}

impl CivFrame {
    /// True when this frame is a positive acknowledgement (cmd 0xFB)
    pub fn is_ack(&self) -> bool {
        self.cmd == ACK
    }

    /// True when this frame is a negative acknowledgement (cmd 0xFA)
    pub fn is_nak(&self) -> bool {
        self.cmd == NAK
    }

    /// Payload bytes following the given sub-command, or `None` when the
    /// frame carries a different sub-command (or none at all).
    pub fn subcommand_data(&self, subcmd: u8) -> Option<&[u8]> {
        match self.data.split_first() {
            Some((&first, rest)) if first == subcmd => Some(rest),
            _ => None,
        }
    }

    /// Decode the payload as a little-endian BCD frequency in hertz
    pub fn frequency_hz(&self) -> u64 {
        bcd::decode_frequency(&self.data)
    }
}

/// Build a controller request frame: `FE FE radio E0 cmd [subcmd] data.. FD`
///
/// A sub-command of `Some(0x00)` encodes as absent: no public IC-705
/// command uses zero as a live sub-command byte, so the omission is
/// unambiguous.
pub fn build_request(radio_addr: u8, cmd: u8, subcmd: Option<u8>, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(7 + data.len());
    frame.extend([PREAMBLE, PREAMBLE, radio_addr, CONTROLLER_ADDR, cmd]);
    if let Some(sc) = subcmd.filter(|&sc| sc != 0x00) {
        frame.push(sc);
    }
    frame.extend_from_slice(data);
    frame.push(TERMINATOR);
    frame
}

/// Scan `buf` for the first complete frame and parse it.
///
/// Returns `None` when no complete frame is present; the caller treats
/// that as "incomplete, keep reading".
pub fn parse(buf: &[u8]) -> Option<CivFrame> {
    try_parse(buf).ok()
}

/// Strict variant of [`parse`] that says what went wrong.
///
/// Repeated preamble bytes (half-duplex bus collisions) are skipped
/// before the address bytes are taken.
pub fn try_parse(buf: &[u8]) -> Result<CivFrame, crate::ParseError> {
    use crate::ParseError;

    let start = buf
        .windows(2)
        .position(|w| w == [PREAMBLE, PREAMBLE])
        .ok_or(ParseError::Incomplete("preamble"))?;

    // A collision on the bus can stack up more than two preamble bytes.
    let mut body = start + 2;
    while body < buf.len() && buf[body] == PREAMBLE {
        body += 1;
    }

    let rest = &buf[body..];
    let term = rest
        .iter()
        .position(|&b| b == TERMINATOR)
        .ok_or(ParseError::Incomplete("terminator"))?;
    if term < 3 {
        // Terminator arrived before to/from/cmd could fit.
        return Err(ParseError::InvalidFrame("shorter than the 6-byte minimum"));
    }

    Ok(CivFrame {
        to: rest[0],
        from: rest[1],
        cmd: rest[2],
        data: rest[3..term].to_vec(),
    })
}

/// Streaming CI-V frame accumulator
///
/// Feed raw serial reads in with [`push_bytes`](CivCodec::push_bytes) and
/// pull complete frames out with [`next_frame`](CivCodec::next_frame). The
/// radio client drains every pending frame after an exchange and keeps the
/// last one, which discards the echo of its own request.
#[derive(Debug, Default)]
pub struct CivCodec {
    buffer: Vec<u8>,
}

impl CivCodec {
    /// Create an empty codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_FRAME_LEN),
        }
    }

    /// Push raw bytes into the accumulator
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // Prevent unbounded growth when the port streams garbage
        if self.buffer.len() > MAX_FRAME_LEN * 4 {
            let keep = self.buffer.len() - MAX_FRAME_LEN;
            self.buffer.drain(..keep);
        }
    }

    /// Cut and parse the next complete frame, or `None` when no complete
    /// frame is buffered. Unparseable cuts are logged and skipped.
    pub fn next_frame(&mut self) -> Option<CivFrame> {
        loop {
            let start = self
                .buffer
                .windows(2)
                .position(|w| w == [PREAMBLE, PREAMBLE])?;
            if start > 0 {
                self.buffer.drain(..start);
            }

            let term = self.buffer.iter().position(|&b| b == TERMINATOR)?;
            let cut: Vec<u8> = self.buffer.drain(..=term).collect();

            match try_parse(&cut) {
                Ok(frame) => return Some(frame),
                Err(e) => {
                    tracing::warn!("skipping CI-V cut ({e}): {:02X?}", cut);
                    continue;
                }
            }
        }
    }

    /// Discard any buffered bytes
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
