//! Command channel: one datagram socket, one request at a time
//!
//! The channel owns the UDP socket to the gimbal and the 16-bit sequence counter.
//! Each [`request`](CommandChannel::request) is a single attempt:
//!
//! ```text
//! Idle -> Sent -> Acked(payload)
//!              -> TimedOut
//! ```
//!
//! While waiting, every inbound datagram is decoded. Invalid datagrams and valid
//! frames that do not match the request (other command ids, telemetry streamed on
//! the same socket) are dropped and polling continues inside the same timeout
//! budget. The device does not reliably echo sequence numbers, so replies are
//! matched by command id, never by sequence. Because of that, requests must not
//! overlap; `&mut self` on every request enforces one outstanding request per
//! channel.
//!
//! Retries are left to the caller: a timed out request is reported
//! as [`RequestOutcome::TimedOut`] and the caller decides whether to send again
//! (with a fresh sequence number).
//!
//! # Example
//!
//! ```no_run
//! use hardware::gimbal::{CommandChannel, RequestOutcome};
//!
//! let mut channel = CommandChannel::connect("192.168.144.25:37260")?;
//! match channel.request(0x0D, &[], true)? {
//!     RequestOutcome::Acked(payload) => println!("reply: {payload:02X?}"),
//!     RequestOutcome::TimedOut => println!("no reply"),
//!     RequestOutcome::Sent => unreachable!(),
//! }
//! # Ok::<(), hardware::gimbal::GimbalError>(())
//! ```

use std::io::ErrorKind;
use std::net::{ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::frame::{self, Frame};
use super::{GimbalError, GimbalResult};

/// Default UDP port of the gimbal.
pub const DEFAULT_PORT: u16 = 37260;

/// Factory default address of the gimbal.
pub const DEFAULT_GIMBAL_IP: &str = "192.168.144.25";

/// Default acknowledgement timeout.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(350);

/// Large enough for any frame the device sends.
const RECV_BUFFER_LEN: usize = 2048;

/// Result of a single request attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Sent without asking for a reply
    Sent,
    /// A matching reply arrived; carries its payload
    Acked(Vec<u8>),
    /// No matching reply within the timeout
    TimedOut,
}

/// Which inbound frames count as the reply to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyFilter {
    pub command_id: u8,
    /// Require the is-ack ctrl bit
    pub require_ack: bool,
    /// Minimum payload length; shorter replies are ignored
    pub min_payload: usize,
}

impl ReplyFilter {
    /// Acknowledgement of `command_id`: is-ack bit set, any payload.
    pub fn ack(command_id: u8) -> Self {
        Self {
            command_id,
            require_ack: true,
            min_payload: 0,
        }
    }

    /// Any frame carrying `command_id` with at least `min_payload` bytes.
    pub fn reply(command_id: u8, min_payload: usize) -> Self {
        Self {
            command_id,
            require_ack: false,
            min_payload,
        }
    }

    pub fn with_min_payload(mut self, min_payload: usize) -> Self {
        self.min_payload = min_payload;
        self
    }

    pub fn matches(&self, frame: &Frame) -> bool {
        frame.command_id == self.command_id
            && (!self.require_ack || frame.is_ack())
            && frame.payload.len() >= self.min_payload
    }
}

/// Datagram channel to one gimbal.
pub struct CommandChannel {
    socket: UdpSocket,
    sequence: u16,
    timeout: Duration,
}

impl CommandChannel {
    /// Bind an ephemeral local port and connect it to the gimbal at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`GimbalError::ConnectionFailed`] if the socket cannot be bound or
    /// the address does not resolve.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> GimbalResult<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| GimbalError::ConnectionFailed(format!("Failed to bind: {e}")))?;
        socket
            .connect(addr)
            .map_err(|e| GimbalError::ConnectionFailed(format!("Failed to connect: {e}")))?;

        debug!("Gimbal channel bound to {:?}", socket.local_addr().ok());
        Ok(Self::from_socket(socket))
    }

    /// Connect to the gimbal at `ip` on [`DEFAULT_PORT`].
    pub fn connect_default_port(ip: &str) -> GimbalResult<Self> {
        Self::connect(format!("{ip}:{DEFAULT_PORT}"))
    }

    /// Wrap an already connected socket.
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket,
            sequence: 0,
            timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    /// Set the acknowledgement timeout for subsequent requests.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sequence number the next request will carry.
    pub fn peek_sequence(&self) -> u16 {
        self.sequence
    }

    /// Consume the next sequence number, wrapping modulo 65536.
    fn next_sequence(&mut self) -> u16 {
        let seq = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        seq
    }

    /// Send one command and, if `want_ack`, wait for its acknowledgement.
    ///
    /// The acknowledgement must carry the same command id and the is-ack bit.
    /// Timeouts are an outcome, not an error; only socket failures are errors.
    pub fn request(
        &mut self,
        command_id: u8,
        payload: &[u8],
        want_ack: bool,
    ) -> GimbalResult<RequestOutcome> {
        let reply = want_ack.then(|| ReplyFilter::ack(command_id));
        self.exchange(command_id, payload, reply)
    }

    /// Send one command and wait for the first frame accepted by `reply`.
    ///
    /// With `reply == None` the frame is sent without the ack-requested bit and
    /// the call returns [`RequestOutcome::Sent`] immediately.
    pub fn exchange(
        &mut self,
        command_id: u8,
        payload: &[u8],
        reply: Option<ReplyFilter>,
    ) -> GimbalResult<RequestOutcome> {
        let bytes = frame::encode(command_id, payload, self.sequence, reply.is_some())?;
        let sequence = self.next_sequence();

        trace!("Gimbal send seq={sequence} cmd=0x{command_id:02X}: {bytes:02X?}");
        self.socket.send(&bytes)?;

        match reply {
            None => Ok(RequestOutcome::Sent),
            Some(filter) => self.await_reply(filter),
        }
    }

    fn await_reply(&mut self, filter: ReplyFilter) -> GimbalResult<RequestOutcome> {
        let deadline = Instant::now() + self.timeout;
        let mut buf = [0u8; RECV_BUFFER_LEN];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("Gimbal cmd=0x{:02X} timed out", filter.command_id);
                return Ok(RequestOutcome::TimedOut);
            }
            self.socket.set_read_timeout(Some(remaining))?;

            match self.socket.recv(&mut buf) {
                Ok(n) => match frame::decode(&buf[..n]) {
                    Ok(frame) if filter.matches(&frame) => {
                        trace!(
                            "Gimbal recv seq={} cmd=0x{:02X} payload={:02X?}",
                            frame.sequence,
                            frame.command_id,
                            frame.payload
                        );
                        return Ok(RequestOutcome::Acked(frame.payload));
                    }
                    Ok(frame) => {
                        trace!(
                            "Discarding unrelated frame cmd=0x{:02X} ctrl={:?}",
                            frame.command_id,
                            frame.ctrl
                        );
                    }
                    Err(e) => trace!("Discarding invalid datagram: {e}"),
                },
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    debug!("Gimbal cmd=0x{:02X} timed out", filter.command_id);
                    return Ok(RequestOutcome::TimedOut);
                }
                // ICMP port unreachable from an earlier send; the link is lossy, keep waiting
                Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                    debug!("Gimbal unreachable while waiting for reply: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
