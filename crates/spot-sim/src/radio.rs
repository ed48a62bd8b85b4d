//! Simulated radio state machine and its async wire task

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use spot_protocol::{bcd, cmd, CivCodec, CivFrame, CONTROLLER_ADDR, IC705_ADDR};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// A simulated IC-705 answering CI-V request frames
///
/// State changes through the setters; [`handle_bytes`](Self::handle_bytes)
/// consumes controller traffic and produces the wire-exact byte sequences
/// the hardware would send back, echo included when enabled.
#[derive(Debug)]
pub struct VirtualIc705 {
    address: u8,
    frequency_hz: u64,
    mode_byte: u8,
    squelch_open: bool,
    s_meter: u16,
    squelch_level: u16,
    /// Mirror the half-duplex bus by echoing requests before replying
    echo: bool,
    codec: CivCodec,
}

impl VirtualIc705 {
    /// Create a radio at the factory CI-V address, tuned to 2 m
    pub fn new() -> Self {
        Self {
            address: IC705_ADDR,
            frequency_hz: 145_500_000,
            mode_byte: 0x05, // FM
            squelch_open: false,
            s_meter: 0,
            squelch_level: 100,
            echo: true,
            codec: CivCodec::new(),
        }
    }

    /// Use a non-factory CI-V address
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Disable the half-duplex request echo
    pub fn without_echo(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Current tuned frequency
    pub fn frequency_hz(&self) -> u64 {
        self.frequency_hz
    }

    /// Retune the radio (as the scan function would)
    pub fn set_frequency(&mut self, hz: u64) {
        self.frequency_hz = hz;
    }

    /// Open or close the squelch
    pub fn set_squelch_open(&mut self, open: bool) {
        self.squelch_open = open;
    }

    /// Whether the squelch is open
    pub fn squelch_open(&self) -> bool {
        self.squelch_open
    }

    /// Set the S-meter reading (0..=255)
    pub fn set_s_meter(&mut self, level: u16) {
        self.s_meter = level;
    }

    /// Squelch threshold last written by the controller
    pub fn squelch_level(&self) -> u16 {
        self.squelch_level
    }

    /// Consume controller bytes, returning the byte sequences to put on
    /// the wire in order.
    pub fn handle_bytes(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.codec.push_bytes(data);

        let mut out = Vec::new();
        while let Some(frame) = self.codec.next_frame() {
            if frame.to != self.address && frame.to != 0x00 {
                debug!(to = frame.to, "ignoring frame for another radio");
                continue;
            }
            if self.echo {
                out.push(reassemble(&frame));
            }
            out.push(self.answer(&frame));
        }
        out
    }

    fn answer(&mut self, frame: &CivFrame) -> Vec<u8> {
        match frame.cmd {
            cmd::READ_FREQUENCY => {
                self.reply(cmd::READ_FREQUENCY, &bcd::encode_frequency(self.frequency_hz))
            }
            cmd::SET_FREQUENCY => {
                if frame.data.len() >= 5 {
                    self.frequency_hz = bcd::decode_frequency(&frame.data);
                    self.ack()
                } else {
                    self.nak()
                }
            }
            cmd::READ_MODE => {
                let mode = self.mode_byte;
                self.reply(cmd::READ_MODE, &[mode, 0x01])
            }
            cmd::SET_MODE => match frame.data.first() {
                Some(&mode) => {
                    self.mode_byte = mode;
                    self.ack()
                }
                None => self.nak(),
            },
            cmd::SET_LEVEL => match frame.subcommand_data(cmd::SUB_SQUELCH_LEVEL) {
                Some(payload) => {
                    self.squelch_level = bcd::decode_level(payload);
                    self.ack()
                }
                None => self.nak(),
            },
            cmd::READ_STATUS => {
                if frame.subcommand_data(cmd::SUB_SQUELCH_STATUS).is_some() {
                    let open = u8::from(self.squelch_open);
                    self.reply(cmd::READ_STATUS, &[cmd::SUB_SQUELCH_STATUS, open])
                } else if frame.subcommand_data(cmd::SUB_S_METER).is_some() {
                    let level = bcd::encode_level(self.s_meter);
                    self.reply(
                        cmd::READ_STATUS,
                        &[cmd::SUB_S_METER, level[0], level[1]],
                    )
                } else {
                    self.nak()
                }
            }
            _ => self.nak(),
        }
    }

    fn reply(&self, command: u8, data: &[u8]) -> Vec<u8> {
        let mut frame = vec![0xFE, 0xFE, CONTROLLER_ADDR, self.address, command];
        frame.extend_from_slice(data);
        frame.push(0xFD);
        frame
    }

    fn ack(&self) -> Vec<u8> {
        self.reply(spot_protocol::ACK, &[])
    }

    fn nak(&self) -> Vec<u8> {
        self.reply(spot_protocol::NAK, &[])
    }
}

impl Default for VirtualIc705 {
    fn default() -> Self {
        Self::new()
    }
}

/// Rebuild the wire form of a parsed frame (for the request echo)
fn reassemble(frame: &CivFrame) -> Vec<u8> {
    let mut wire = vec![0xFE, 0xFE, frame.to, frame.from, frame.cmd];
    wire.extend_from_slice(&frame.data);
    wire.push(0xFD);
    wire
}

/// Shared handle to a spawned virtual radio
#[derive(Clone)]
pub struct SimHandle {
    inner: Arc<Mutex<VirtualIc705>>,
}

impl SimHandle {
    /// Open or close the squelch mid-run
    pub fn set_squelch_open(&self, open: bool) {
        self.inner.lock().expect("sim lock poisoned").set_squelch_open(open);
    }

    /// Retune the radio mid-run
    pub fn set_frequency(&self, hz: u64) {
        self.inner.lock().expect("sim lock poisoned").set_frequency(hz);
    }

    /// Set the S-meter reading mid-run
    pub fn set_s_meter(&self, level: u16) {
        self.inner.lock().expect("sim lock poisoned").set_s_meter(level);
    }

    /// Current tuned frequency
    pub fn frequency_hz(&self) -> u64 {
        self.inner.lock().expect("sim lock poisoned").frequency_hz()
    }

    /// Squelch threshold last written by the controller
    pub fn squelch_level(&self) -> u16 {
        self.inner.lock().expect("sim lock poisoned").squelch_level()
    }
}

/// Run a virtual radio over a byte stream (normally one end of
/// `tokio::io::duplex`), returning a handle for mid-run state changes.
///
/// The task ends when the stream closes.
pub fn spawn<T>(radio: VirtualIc705, io: T) -> SimHandle
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let shared = Arc::new(Mutex::new(radio));
    let handle = SimHandle {
        inner: Arc::clone(&shared),
    };
    tokio::spawn(run_wire(shared, io));
    handle
}

async fn run_wire<T>(state: Arc<Mutex<VirtualIc705>>, mut io: T)
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut buf = [0u8; 256];
    loop {
        let n = match io.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        let replies = {
            let mut radio = state.lock().expect("sim lock poisoned");
            radio.handle_bytes(&buf[..n])
        };
        for wire in replies {
            if io.write_all(&wire).await.is_err() {
                return;
            }
        }
    }
    debug!("virtual radio wire closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use spot_protocol::{build_request, parse};

    fn last_frame(replies: &[Vec<u8>]) -> CivFrame {
        parse(replies.last().expect("some reply")).expect("parseable reply")
    }

    #[test]
    fn test_frequency_query() {
        let mut radio = VirtualIc705::new().without_echo();
        radio.set_frequency(144_500_000);

        let replies = radio.handle_bytes(&build_request(IC705_ADDR, cmd::READ_FREQUENCY, None, &[]));
        assert_eq!(replies.len(), 1);
        let frame = last_frame(&replies);
        assert_eq!(frame.cmd, cmd::READ_FREQUENCY);
        assert_eq!(frame.frequency_hz(), 144_500_000);
    }

    #[test]
    fn test_set_frequency_acks_and_retunes() {
        let mut radio = VirtualIc705::new().without_echo();
        let payload = bcd::encode_frequency(7_074_000);

        let replies =
            radio.handle_bytes(&build_request(IC705_ADDR, cmd::SET_FREQUENCY, None, &payload));
        assert!(last_frame(&replies).is_ack());
        assert_eq!(radio.frequency_hz(), 7_074_000);
    }

    #[test]
    fn test_squelch_poll_tracks_state() {
        let mut radio = VirtualIc705::new().without_echo();
        let request = build_request(
            IC705_ADDR,
            cmd::READ_STATUS,
            Some(cmd::SUB_SQUELCH_STATUS),
            &[],
        );

        let closed = last_frame(&radio.handle_bytes(&request));
        assert_eq!(closed.data, vec![cmd::SUB_SQUELCH_STATUS, 0x00]);

        radio.set_squelch_open(true);
        let open = last_frame(&radio.handle_bytes(&request));
        assert_eq!(open.data, vec![cmd::SUB_SQUELCH_STATUS, 0x01]);
    }

    #[test]
    fn test_s_meter_is_big_endian_bcd() {
        let mut radio = VirtualIc705::new().without_echo();
        radio.set_s_meter(241);

        let replies = radio.handle_bytes(&build_request(
            IC705_ADDR,
            cmd::READ_STATUS,
            Some(cmd::SUB_S_METER),
            &[],
        ));
        assert_eq!(last_frame(&replies).data, vec![cmd::SUB_S_METER, 0x02, 0x41]);
    }

    #[test]
    fn test_echo_precedes_reply() {
        let mut radio = VirtualIc705::new();
        let request = build_request(IC705_ADDR, cmd::READ_FREQUENCY, None, &[]);

        let replies = radio.handle_bytes(&request);
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0], request);
        assert_eq!(last_frame(&replies).from, IC705_ADDR);
    }

    #[test]
    fn test_ignores_other_addresses() {
        let mut radio = VirtualIc705::new().without_echo();
        let replies = radio.handle_bytes(&build_request(0x94, cmd::READ_FREQUENCY, None, &[]));
        assert!(replies.is_empty());
    }

    #[test]
    fn test_unknown_command_naks() {
        let mut radio = VirtualIc705::new().without_echo();
        let replies = radio.handle_bytes(&build_request(IC705_ADDR, 0x1C, Some(0x01), &[]));
        assert!(last_frame(&replies).is_nak());
    }

    #[test]
    fn test_squelch_level_write() {
        let mut radio = VirtualIc705::new().without_echo();
        let payload = bcd::encode_level(180);
        let replies = radio.handle_bytes(&build_request(
            IC705_ADDR,
            cmd::SET_LEVEL,
            Some(cmd::SUB_SQUELCH_LEVEL),
            &payload,
        ));
        assert!(last_frame(&replies).is_ack());
        assert_eq!(radio.squelch_level(), 180);
    }
}
