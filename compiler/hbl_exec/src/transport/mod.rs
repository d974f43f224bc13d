//! Message transport for `MPISend` / `MPIReceive`.
//!
//! A message is a signed 64-bit little-endian length followed by the UTF-8
//! bytes of the text. A negative length marks an error payload. Bytes after
//! the header travel in chunks of at most [`CHUNK_SIZE`].

use std::collections::VecDeque;
use std::string::FromUtf8Error;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::{silent_handler, Session};


/// Largest chunk handed to [`Transport::send_chunk`] in one call.
pub const CHUNK_SIZE: usize = 4096;

const HEADER_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No message is pending from node {0}")]
    Empty(i64),

    #[error("Message header needs {HEADER_LEN} bytes, received {0}")]
    Header(usize),

    #[error("Received message is not valid UTF-8")]
    Utf8(#[from] FromUtf8Error),
}

/// Point-to-point byte transport between this process and worker nodes.
pub trait Transport {
    fn send_chunk(&mut self, node: i64, bytes: &[u8]) -> Result<(), TransportError>;

    /// Receive exactly `len` bytes from `node`, or from whichever node has
    /// data when `node` is `None`. Returns the sending node.
    fn receive_chunk(&mut self, node: Option<i64>, len: usize) -> Result<(i64, Vec<u8>), TransportError>;
}

/// A received message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub sender: i64,
    pub text: String,
    pub is_error: bool,
}

pub fn encode_header(len: usize, is_error: bool) -> [u8; HEADER_LEN] {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let signed = if is_error { -len } else { len };
    signed.to_le_bytes()
}

/// Payload length and error flag of a header.
pub fn decode_header(bytes: &[u8]) -> Result<(usize, bool), TransportError> {
    let header: [u8; HEADER_LEN] = bytes
        .try_into()
        .map_err(|_| TransportError::Header(bytes.len()))?;
    let signed = i64::from_le_bytes(header);
    let len = usize::try_from(signed.unsigned_abs()).unwrap_or(usize::MAX);
    Ok((len, signed < 0))
}

pub fn send_string(
    transport: &mut dyn Transport,
    node: i64,
    text: &str,
    is_error: bool,
) -> Result<(), TransportError> {
    transport.send_chunk(node, &encode_header(text.len(), is_error))?;
    for chunk in text.as_bytes().chunks(CHUNK_SIZE) {
        transport.send_chunk(node, chunk)?;
    }
    tracing::debug!(node, bytes = text.len(), is_error, "sent message");
    Ok(())
}

pub fn receive_string(transport: &mut dyn Transport, from: Option<i64>) -> Result<Message, TransportError> {
    let (sender, header) = transport.receive_chunk(from, HEADER_LEN)?;
    let (len, is_error) = decode_header(&header)?;
    let mut bytes = Vec::with_capacity(len);
    while bytes.len() < len {
        let want = (len - bytes.len()).min(CHUNK_SIZE);
        let (_, chunk) = transport.receive_chunk(Some(sender), want)?;
        bytes.extend_from_slice(&chunk);
    }
    tracing::debug!(sender, bytes = len, is_error, "received message");
    Ok(Message {
        sender,
        text: String::from_utf8(bytes)?,
        is_error,
    })
}

/// In-process stand-in for worker nodes.
///
/// Every complete message sent to a node is run as batch code in a fresh
/// [`Session`]; the result (or the error text, flagged as an error) is
/// queued as that node's reply.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    inbound: FxHashMap<i64, Vec<u8>>,
    replies: FxHashMap<i64, VecDeque<u8>>,
    order: VecDeque<i64>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every complete frame buffered for `node`.
    fn drain_frames(&mut self, node: i64) -> Result<(), TransportError> {
        loop {
            let Some(pending) = self.inbound.get_mut(&node) else {
                return Ok(());
            };
            if pending.len() < HEADER_LEN {
                return Ok(());
            }
            let (len, _) = decode_header(&pending[..HEADER_LEN])?;
            let Some(end) = HEADER_LEN.checked_add(len).filter(|end| *end <= pending.len()) else {
                return Ok(());
            };
            let frame: Vec<u8> = pending.drain(..end).skip(HEADER_LEN).collect();
            let code = String::from_utf8(frame)?;
            let (text, is_error) = run_remote(&code);

            let queue = self.replies.entry(node).or_default();
            queue.extend(encode_header(text.len(), is_error));
            queue.extend(text.as_bytes());
            self.order.push_back(node);
        }
    }
}

fn run_remote(code: &str) -> (String, bool) {
    let mut worker = Session::builder().print_handler(silent_handler()).build();
    match worker.run_source(code) {
        Ok(value) => (value.to_text(), false),
        Err(err) => (err.to_string(), true),
    }
}

impl Transport for LoopbackTransport {
    fn send_chunk(&mut self, node: i64, bytes: &[u8]) -> Result<(), TransportError> {
        self.inbound.entry(node).or_default().extend_from_slice(bytes);
        self.drain_frames(node)
    }

    fn receive_chunk(&mut self, node: Option<i64>, len: usize) -> Result<(i64, Vec<u8>), TransportError> {
        let replies = &self.replies;
        self.order
            .retain(|n| replies.get(n).is_some_and(|queue| !queue.is_empty()));
        let node = match node {
            Some(n) => n,
            None => *self.order.front().ok_or(TransportError::Empty(-1))?,
        };
        let queue = self
            .replies
            .get_mut(&node)
            .filter(|queue| queue.len() >= len)
            .ok_or(TransportError::Empty(node))?;
        Ok((node, queue.drain(..len).collect()))
    }
}
