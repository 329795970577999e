//! Websocket client transport over a non-blocking TCP stream.
//!
//! Connection and the opening handshake happen on the first service call so
//! the driver can report "waiting for connection" first. Once open, the
//! socket is switched to non-blocking mode. Each accepted write becomes one
//! websocket frame of at most `max_fragment` bytes; a line that does not fit
//! is sent as a text frame followed by continuation frames, so the peer still
//! sees exactly one message per line.
//!
//! The opening handshake offers a subprotocol and carries the host as its
//! `Origin`. A close frame from the peer, or a write that finds the peer
//! gone, ends the connection as an ordinary disconnect.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::num::NonZeroUsize;
use std::time::Duration;

#[cfg(unix)]
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::{debug, trace};
use tungstenite::client::IntoClientRequest;
use tungstenite::error::ProtocolError;
use tungstenite::handshake::HandshakeError;
use tungstenite::handshake::client::Request;
use tungstenite::http::HeaderValue;
use tungstenite::http::header::{ORIGIN, SEC_WEBSOCKET_PROTOCOL};
use tungstenite::protocol::frame::Frame;
use tungstenite::protocol::frame::coding::{Data, OpCode};
use tungstenite::{Message, WebSocket};
use url::Url;

use super::poll::{self, Readiness};
use super::{TRANSPORT_TARGET, Transport, TransportError, TransportEvent};
use crate::endpoint::Destination;

type WsError = tungstenite::Error;

/// Tuning knobs for [`WebSocketTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TransportSettings {
    /// Most bytes accepted by one write attempt, i.e. one frame.
    pub(crate) max_fragment: NonZeroUsize,
    /// Upper bound for the TCP connect and for the opening handshake.
    pub(crate) connect_timeout: Duration,
    /// Upper bound for the closing handshake.
    pub(crate) close_timeout: Duration,
    /// Subprotocol offered in the opening handshake, if any.
    pub(crate) subprotocol: Option<String>,
}

enum Phase {
    Connecting,
    Open(Box<WebSocket<TcpStream>>),
    Closed,
}

/// Real transport backed by `tungstenite`.
pub(crate) struct WebSocketTransport {
    destination: Destination,
    request: Option<Request>,
    addresses: Vec<SocketAddr>,
    settings: TransportSettings,
    phase: Phase,
    writable_requested: bool,
}

impl WebSocketTransport {
    /// Validates the URL, builds the handshake request, and resolves the
    /// destination without connecting.
    pub(crate) fn prepare(
        destination: &Destination,
        settings: TransportSettings,
    ) -> Result<Self, TransportError> {
        let url = destination
            .url()
            .map_err(|source| TransportError::InvalidUrl {
                endpoint: destination.to_string(),
                source,
            })?;
        let request = handshake_request(&url, destination.host(), settings.subprotocol.as_deref())
            .map_err(|source| TransportError::InvalidRequest {
                endpoint: destination.to_string(),
                source: Box::new(source),
            })?;
        let addresses =
            resolve(destination).map_err(|source| TransportError::Resolve {
                endpoint: destination.to_string(),
                source,
            })?;
        Ok(Self {
            destination: destination.clone(),
            request: Some(request),
            addresses,
            settings,
            phase: Phase::Connecting,
            writable_requested: false,
        })
    }

    fn establish(&mut self) -> TransportEvent {
        let Some(request) = self.request.take() else {
            self.phase = Phase::Closed;
            return TransportEvent::ConnectionError(String::from("connection already attempted"));
        };
        match open_socket(&self.addresses, request, self.settings.connect_timeout) {
            Ok((socket, subprotocol)) => {
                debug!(
                    target: TRANSPORT_TARGET,
                    endpoint = %self.destination,
                    subprotocol = subprotocol.as_deref().unwrap_or("none"),
                    "opening handshake complete"
                );
                self.phase = Phase::Open(Box::new(socket));
                TransportEvent::Established
            }
            Err(reason) => {
                self.phase = Phase::Closed;
                TransportEvent::ConnectionError(reason)
            }
        }
    }

    fn service_open(&mut self, timeout: Duration) -> Result<Vec<TransportEvent>, TransportError> {
        let Phase::Open(socket) = &mut self.phase else {
            return Ok(vec![TransportEvent::Closed]);
        };
        let mut events = Vec::new();

        let outcome = pump_socket(socket, self.writable_requested, timeout, &mut events);
        let disconnected = match outcome {
            Ok(SocketState::Open { writable }) => {
                if writable && self.writable_requested {
                    self.writable_requested = false;
                    events.push(TransportEvent::Writable);
                }
                false
            }
            Ok(SocketState::Disconnected) => true,
            Err(ServiceFailure::Poll(source)) => {
                return Err(TransportError::Poll {
                    endpoint: self.destination.to_string(),
                    source,
                });
            }
            Err(ServiceFailure::Socket(source)) => {
                return Err(TransportError::Service {
                    endpoint: self.destination.to_string(),
                    source: Box::new(source),
                });
            }
        };

        if disconnected {
            debug!(
                target: TRANSPORT_TARGET,
                endpoint = %self.destination,
                "connection closed"
            );
            self.phase = Phase::Closed;
            self.writable_requested = false;
            events.push(TransportEvent::Closed);
        }
        Ok(events)
    }
}

impl Transport for WebSocketTransport {
    fn service(&mut self, timeout: Duration) -> Result<Vec<TransportEvent>, TransportError> {
        match self.phase {
            Phase::Connecting => Ok(vec![self.establish()]),
            Phase::Open(_) => self.service_open(timeout),
            Phase::Closed => Ok(vec![TransportEvent::Closed]),
        }
    }

    fn request_writable(&mut self) {
        self.writable_requested = true;
    }

    fn send_text(&mut self, data: &[u8], continuation: bool) -> Result<usize, TransportError> {
        let Phase::Open(socket) = &mut self.phase else {
            return Err(TransportError::NotConnected {
                endpoint: self.destination.to_string(),
            });
        };

        let accepted = data.len().min(self.settings.max_fragment.get());
        let chunk = data.get(..accepted).unwrap_or(data);
        let opcode = if continuation {
            OpCode::Data(Data::Continue)
        } else {
            OpCode::Data(Data::Text)
        };
        let frame = Frame::message(chunk.to_vec(), opcode, accepted == data.len());

        match write_frame(socket, frame) {
            Ok(FrameWrite::Queued) => {
                trace!(
                    target: TRANSPORT_TARGET,
                    accepted,
                    requested = data.len(),
                    continuation,
                    "frame queued"
                );
                Ok(accepted)
            }
            Ok(FrameWrite::BufferFull) => Ok(0),
            Ok(FrameWrite::PeerGone) => {
                debug!(
                    target: TRANSPORT_TARGET,
                    endpoint = %self.destination,
                    "peer went away during a write"
                );
                // The next service call reports the close.
                self.phase = Phase::Closed;
                self.writable_requested = false;
                Ok(0)
            }
            Err(source) => Err(TransportError::Write {
                endpoint: self.destination.to_string(),
                source: Box::new(source),
            }),
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let Phase::Open(socket) = &mut self.phase else {
            return Ok(());
        };
        let result = close_gracefully(socket, self.settings.close_timeout);
        self.phase = Phase::Closed;
        self.writable_requested = false;
        result.map_err(|source| TransportError::Close {
            endpoint: self.destination.to_string(),
            source: Box::new(source),
        })
    }
}

enum FrameWrite {
    Queued,
    BufferFull,
    PeerGone,
}

/// Queues `frame` and tries to flush it without blocking.
fn write_frame(socket: &mut WebSocket<TcpStream>, frame: Frame) -> Result<FrameWrite, WsError> {
    match socket.write(Message::Frame(frame)) {
        Ok(()) => {}
        Err(WsError::WriteBufferFull(_)) => return Ok(FrameWrite::BufferFull),
        // The frame is buffered; the next service call keeps flushing it.
        Err(error) if is_would_block(&error) => return Ok(FrameWrite::Queued),
        Err(error) if is_disconnect(&error) => return Ok(FrameWrite::PeerGone),
        Err(error) => return Err(error),
    }
    match socket.flush() {
        Err(error) if is_disconnect(&error) => Ok(FrameWrite::PeerGone),
        Err(error) if !is_would_block(&error) => Err(error),
        _ => Ok(FrameWrite::Queued),
    }
}

enum SocketState {
    Open { writable: bool },
    Disconnected,
}

enum ServiceFailure {
    Poll(io::Error),
    Socket(WsError),
}

/// Flushes queued output, waits for readiness, and drains inbound frames.
fn pump_socket(
    socket: &mut WebSocket<TcpStream>,
    writable_requested: bool,
    timeout: Duration,
    events: &mut Vec<TransportEvent>,
) -> Result<SocketState, ServiceFailure> {
    let Some(mut backlog) = flush_output(socket)? else {
        return Ok(SocketState::Disconnected);
    };

    let want_write = backlog || writable_requested;
    let Readiness { readable, writable } =
        poll::wait(socket.get_ref(), want_write, timeout).map_err(ServiceFailure::Poll)?;

    if writable && backlog {
        let Some(still_pending) = flush_output(socket)? else {
            return Ok(SocketState::Disconnected);
        };
        backlog = still_pending;
    }
    if readable && drain_inbound(socket, events)? {
        return Ok(SocketState::Disconnected);
    }
    Ok(SocketState::Open {
        writable: writable && !backlog,
    })
}

/// Returns `Some(true)` while output is still queued, `None` on disconnect.
fn flush_output(socket: &mut WebSocket<TcpStream>) -> Result<Option<bool>, ServiceFailure> {
    match socket.flush() {
        Ok(()) => Ok(Some(false)),
        Err(error) if is_would_block(&error) => Ok(Some(true)),
        Err(error) if is_disconnect(&error) => Ok(None),
        Err(error) => Err(ServiceFailure::Socket(error)),
    }
}

/// Reads until the socket would block. Returns true when the peer is gone
/// or has started the closing handshake.
fn drain_inbound(
    socket: &mut WebSocket<TcpStream>,
    events: &mut Vec<TransportEvent>,
) -> Result<bool, ServiceFailure> {
    loop {
        match socket.read() {
            Ok(Message::Close(frame)) => {
                debug!(
                    target: TRANSPORT_TARGET,
                    reason = ?frame,
                    "peer started closing handshake"
                );
                // Best effort: the reply is already queued by tungstenite.
                if let Err(error) = socket.flush() {
                    debug!(target: TRANSPORT_TARGET, %error, "close reply not flushed");
                }
                return Ok(true);
            }
            Ok(message) => events.push(TransportEvent::Inbound { len: message.len() }),
            Err(error) if is_would_block(&error) => return Ok(false),
            Err(error) if is_disconnect(&error) => return Ok(true),
            Err(error) => return Err(ServiceFailure::Socket(error)),
        }
    }
}

fn close_gracefully(
    socket: &mut WebSocket<TcpStream>,
    timeout: Duration,
) -> Result<(), WsError> {
    let stream = socket.get_mut();
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    match socket.close(None) {
        Ok(()) => {}
        Err(error) if is_disconnect(&error) => return Ok(()),
        Err(error) => return Err(error),
    }
    loop {
        match socket.read() {
            Ok(_) => {}
            Err(error) if is_disconnect(&error) => return Ok(()),
            Err(error) => return Err(error),
        }
    }
}

/// Upgrade request for `url` offering `subprotocol`, with `origin` as the
/// `Origin` header.
fn handshake_request(
    url: &Url,
    origin: &str,
    subprotocol: Option<&str>,
) -> Result<Request, WsError> {
    let mut request = url.as_str().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert(ORIGIN, HeaderValue::from_str(origin)?);
    if let Some(name) = subprotocol {
        headers.insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_str(name)?);
    }
    Ok(request)
}

/// Connects and completes the opening handshake. Also returns the
/// subprotocol the server accepted.
fn open_socket(
    addresses: &[SocketAddr],
    request: Request,
    timeout: Duration,
) -> Result<(WebSocket<TcpStream>, Option<String>), String> {
    let stream = connect_tcp(addresses, timeout).map_err(|error| error.to_string())?;
    stream
        .set_read_timeout(Some(timeout))
        .and_then(|()| stream.set_write_timeout(Some(timeout)))
        .map_err(|error| error.to_string())?;

    let (socket, response) =
        tungstenite::client::client(request, stream).map_err(|error| match error {
            HandshakeError::Interrupted(_) => String::from("opening handshake timed out"),
            HandshakeError::Failure(failure) => failure.to_string(),
        })?;

    let connected = socket.get_ref();
    connected
        .set_read_timeout(None)
        .and_then(|()| connected.set_write_timeout(None))
        .and_then(|()| connected.set_nonblocking(true))
        .map_err(|error| error.to_string())?;
    let subprotocol = response
        .headers()
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    Ok((socket, subprotocol))
}

#[cfg(unix)]
fn connect_tcp(addresses: &[SocketAddr], timeout: Duration) -> io::Result<TcpStream> {
    let mut last_error = None;
    for address in addresses {
        let socket = Socket::new(Domain::for_address(*address), Type::STREAM, Some(Protocol::TCP))?;
        match socket.connect_timeout(&SockAddr::from(*address), timeout) {
            Ok(()) => {
                let stream: TcpStream = socket.into();
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(error) => last_error = Some(error),
        }
    }
    Err(last_error.unwrap_or_else(no_addresses))
}

#[cfg(not(unix))]
fn connect_tcp(addresses: &[SocketAddr], timeout: Duration) -> io::Result<TcpStream> {
    let mut last_error = None;
    for address in addresses {
        match TcpStream::connect_timeout(address, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(error) => last_error = Some(error),
        }
    }
    Err(last_error.unwrap_or_else(no_addresses))
}

fn resolve(destination: &Destination) -> io::Result<Vec<SocketAddr>> {
    let addresses: Vec<SocketAddr> = (destination.host(), destination.port())
        .to_socket_addrs()?
        .collect();
    if addresses.is_empty() {
        return Err(no_addresses());
    }
    Ok(addresses)
}

fn no_addresses() -> io::Error {
    io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses")
}

fn is_would_block(error: &WsError) -> bool {
    matches!(error, WsError::Io(source) if source.kind() == io::ErrorKind::WouldBlock)
}

fn is_disconnect(error: &WsError) -> bool {
    match error {
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(
            ProtocolError::ResetWithoutClosingHandshake | ProtocolError::SendAfterClosing,
        ) => true,
        WsError::Io(source) => matches!(
            source.kind(),
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}
