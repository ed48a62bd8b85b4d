//! Serialized CI-V client for the control link
//!
//! Generic over the byte stream so real serial ports and simulated radios
//! share one code path; real connections use `tokio_serial::SerialStream`.
//!
//! The CI-V bus is half duplex with exactly one outstanding command
//! allowed, so every operation here is a full write-turnaround-read
//! exchange under one internal lock. Timeouts are part of normal
//! operation (the radio ignores commands while busy) and come back as
//! `Ok(None)`; only real I/O failures surface as errors.

use std::time::Duration;

use spot_protocol::{bcd, build_request, cmd, CivCodec, CivFrame, CONTROLLER_ADDR};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info, warn};

use crate::error::ScanError;

/// Minimum turnaround before the radio starts replying
const TURNAROUND: Duration = Duration::from_millis(50);
/// Deadline for a complete reply, measured after the turnaround
const READ_TIMEOUT: Duration = Duration::from_secs(1);
/// Staging buffer for one exchange
const STAGING_LEN: usize = 256;

/// Operating modes of the IC-705
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Lsb,
    Usb,
    Am,
    Cw,
    Rtty,
    Fm,
    Wfm,
    Dv,
}

impl Mode {
    /// CI-V mode byte for command 0x06
    pub fn civ_byte(self) -> u8 {
        match self {
            Mode::Lsb => 0x00,
            Mode::Usb => 0x01,
            Mode::Am => 0x02,
            Mode::Cw => 0x03,
            Mode::Rtty => 0x04,
            Mode::Fm => 0x05,
            Mode::Wfm => 0x06,
            Mode::Dv => 0x17,
        }
    }

    /// Decode a CI-V mode byte from a command 0x04 reply
    pub fn from_civ(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Mode::Lsb),
            0x01 => Some(Mode::Usb),
            0x02 => Some(Mode::Am),
            0x03 => Some(Mode::Cw),
            0x04 => Some(Mode::Rtty),
            0x05 => Some(Mode::Fm),
            0x06 => Some(Mode::Wfm),
            0x17 => Some(Mode::Dv),
            _ => None,
        }
    }
}

struct Link<T> {
    io: T,
    codec: CivCodec,
    staging: [u8; STAGING_LEN],
}

/// Request/response client owning the control link
pub struct RadioClient<T> {
    link: Mutex<Link<T>>,
    radio_addr: u8,
}

impl RadioClient<SerialStream> {
    /// Open the serial control link: 8-N-1, no handshake, 1 s timeouts.
    ///
    /// On success a frequency read runs as a liveness probe; a silent
    /// radio logs a warning but the port stays open.
    pub async fn open_serial(
        port_name: &str,
        baud_rate: u32,
        radio_addr: u8,
    ) -> Result<Self, ScanError> {
        let stream = tokio_serial::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open_native_async()
            .map_err(|e| ScanError::IoUnavailable(format!("{port_name}: {e}")))?;

        let client = Self::new(stream, radio_addr);
        match client.read_frequency().await? {
            Some(hz) => info!(port = port_name, hz, "radio control link up"),
            None => warn!(port = port_name, "radio did not answer liveness probe"),
        }
        Ok(client)
    }
}

impl<T> RadioClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-open byte stream
    pub fn new(io: T, radio_addr: u8) -> Self {
        Self {
            link: Mutex::new(Link {
                io,
                codec: CivCodec::new(),
                staging: [0u8; STAGING_LEN],
            }),
            radio_addr,
        }
    }

    /// CI-V address this client talks to
    pub fn radio_addr(&self) -> u8 {
        self.radio_addr
    }

    /// Read the tuned frequency in hertz (command 0x03)
    pub async fn read_frequency(&self) -> Result<Option<u64>, ScanError> {
        let reply = self.exchange(cmd::READ_FREQUENCY, None, &[]).await?;
        Ok(reply
            .filter(|f| f.cmd == cmd::READ_FREQUENCY && f.data.len() >= 5)
            .map(|f| f.frequency_hz()))
    }

    /// Tune to a frequency (command 0x05); echoes the frequency back on ACK
    pub async fn set_frequency(&self, hz: u64) -> Result<Option<u64>, ScanError> {
        let payload = bcd::encode_frequency(hz);
        let reply = self.exchange(cmd::SET_FREQUENCY, None, &payload).await?;
        Ok(reply.filter(CivFrame::is_ack).map(|_| hz))
    }

    /// Select an operating mode with the default filter (command 0x06)
    pub async fn set_mode(&self, mode: Mode) -> Result<bool, ScanError> {
        let reply = self
            .exchange(cmd::SET_MODE, None, &[mode.civ_byte(), 0x01])
            .await?;
        Ok(reply.is_some_and(|f| f.is_ack()))
    }

    /// Read the current operating mode (command 0x04)
    pub async fn read_mode(&self) -> Result<Option<Mode>, ScanError> {
        let reply = self.exchange(cmd::READ_MODE, None, &[]).await?;
        Ok(reply
            .filter(|f| f.cmd == cmd::READ_MODE)
            .and_then(|f| f.data.first().copied())
            .and_then(Mode::from_civ))
    }

    /// Set the squelch threshold, 0..=255 (command 0x14 sub 0x03)
    pub async fn set_squelch_level(&self, level: u16) -> Result<bool, ScanError> {
        let payload = bcd::encode_level(level.min(255));
        let reply = self
            .exchange(cmd::SET_LEVEL, Some(cmd::SUB_SQUELCH_LEVEL), &payload)
            .await?;
        Ok(reply.is_some_and(|f| f.is_ack()))
    }

    /// Read the S-meter (command 0x15 sub 0x02), big-endian BCD pair
    pub async fn read_s_meter(&self) -> Result<Option<u16>, ScanError> {
        let reply = self
            .exchange(cmd::READ_STATUS, Some(cmd::SUB_S_METER), &[])
            .await?;
        Ok(reply
            .as_ref()
            .and_then(|f| f.subcommand_data(cmd::SUB_S_METER))
            .map(bcd::decode_level))
    }

    /// Poll the squelch (command 0x15 sub 0x01): `Some(true)` when open,
    /// `None` when the radio did not answer in time
    pub async fn is_squelch_open(&self) -> Result<Option<bool>, ScanError> {
        let reply = self
            .exchange(cmd::READ_STATUS, Some(cmd::SUB_SQUELCH_STATUS), &[])
            .await?;
        Ok(reply
            .as_ref()
            .and_then(|f| f.subcommand_data(cmd::SUB_SQUELCH_STATUS))
            .map(|data| data.first() == Some(&0x01)))
    }

    /// Run one full command/response exchange under the link lock.
    ///
    /// Returns the last complete non-echo frame read before the deadline,
    /// or `None` on timeout.
    async fn exchange(
        &self,
        command: u8,
        subcmd: Option<u8>,
        data: &[u8],
    ) -> Result<Option<CivFrame>, ScanError> {
        let mut link = self.link.lock().await;
        let Link { io, codec, staging } = &mut *link;
        codec.clear();

        let wire = build_request(self.radio_addr, command, subcmd, data);
        io.write_all(&wire).await?;
        io.flush().await?;

        // The radio needs a moment before its reply hits the wire.
        tokio::time::sleep(TURNAROUND).await;

        let deadline = Instant::now() + READ_TIMEOUT;
        let mut reply: Option<CivFrame> = None;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let n = match tokio::time::timeout(remaining, io.read(&mut staging[..])).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => n,
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => break,
            };

            codec.push_bytes(&staging[..n]);
            while let Some(frame) = codec.next_frame() {
                // The bus echoes our own request back; keep the last frame
                // that did not originate from this controller.
                if frame.from != CONTROLLER_ADDR {
                    reply = Some(frame);
                }
            }
            if reply.is_some() {
                break;
            }
        }

        if reply.is_none() {
            debug!(command = format_args!("0x{command:02X}"), "exchange timed out");
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spot_protocol::IC705_ADDR;

    #[tokio::test]
    async fn test_read_frequency_skips_echo() {
        let (client_io, mut radio_io) = tokio::io::duplex(256);
        let client = RadioClient::new(client_io, IC705_ADDR);

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = radio_io.read(&mut buf).await.unwrap();
            // Half-duplex echo of the request, then the actual reply.
            radio_io.write_all(&buf[..n]).await.unwrap();
            radio_io
                .write_all(&[
                    0xFE, 0xFE, 0xE0, 0xA4, 0x03, 0x00, 0x50, 0x45, 0x44, 0x01, 0xFD,
                ])
                .await
                .unwrap();
        });

        assert_eq!(client.read_frequency().await.unwrap(), Some(144_500_000));
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_squelch_poll_decodes_both_states() {
        let (client_io, mut radio_io) = tokio::io::duplex(256);
        let client = RadioClient::new(client_io, IC705_ADDR);

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            for payload in [0x01u8, 0x00u8] {
                let _ = radio_io.read(&mut buf).await.unwrap();
                radio_io
                    .write_all(&[0xFE, 0xFE, 0xE0, 0xA4, 0x15, 0x01, payload, 0xFD])
                    .await
                    .unwrap();
            }
        });

        assert_eq!(client.is_squelch_open().await.unwrap(), Some(true));
        assert_eq!(client.is_squelch_open().await.unwrap(), Some(false));
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_silent_radio_times_out_to_none() {
        let (client_io, _radio_io) = tokio::io::duplex(256);
        let client = RadioClient::new(client_io, IC705_ADDR);

        assert_eq!(client.read_frequency().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_frequency_wants_ack() {
        let (client_io, mut radio_io) = tokio::io::duplex(256);
        let client = RadioClient::new(client_io, IC705_ADDR);

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let _ = radio_io.read(&mut buf).await.unwrap();
            radio_io
                .write_all(&[0xFE, 0xFE, 0xE0, 0xA4, 0xFB, 0xFD])
                .await
                .unwrap();
            let _ = radio_io.read(&mut buf).await.unwrap();
            radio_io
                .write_all(&[0xFE, 0xFE, 0xE0, 0xA4, 0xFA, 0xFD])
                .await
                .unwrap();
        });

        assert_eq!(
            client.set_frequency(144_500_000).await.unwrap(),
            Some(144_500_000)
        );
        // NAK means the radio refused; no frequency comes back.
        assert_eq!(client.set_frequency(1).await.unwrap(), None);
        responder.await.unwrap();
    }
}
