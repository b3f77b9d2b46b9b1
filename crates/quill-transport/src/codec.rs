//! Wire encoding for the Scribe `Log` call.
//!
//! Thrift binary protocol with a strict message header, carried in framed
//! transport: every message is preceded by its length as a 4-byte
//! big-endian integer. Only the `Log` call and its reply are encoded; any
//! other field a peer sends is skipped.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use quill_core::{LogEntry, ResultCode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, TransportError};

/// Length of the frame prefix.
pub const FRAME_HEADER_LEN: usize = 4;

/// Name of the only RPC this harness issues.
pub const LOG_METHOD: &str = "Log";

const VERSION_1: u32 = 0x8001_0000;
const VERSION_MASK: u32 = 0xffff_0000;

// Nested containers deeper than this are rejected while skipping.
const MAX_SKIP_DEPTH: usize = 64;

/// Thrift message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Request.
    Call = 1,
    /// Normal response.
    Reply = 2,
    /// `TApplicationException` response.
    Exception = 3,
    /// Request without a response.
    Oneway = 4,
}

impl MessageType {
    fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Call),
            2 => Ok(Self::Reply),
            3 => Ok(Self::Exception),
            4 => Ok(Self::Oneway),
            other => Err(TransportError::protocol(format!(
                "unknown message type {other}"
            ))),
        }
    }
}

mod ttype {
    pub const STOP: u8 = 0;
    pub const BOOL: u8 = 2;
    pub const BYTE: u8 = 3;
    pub const DOUBLE: u8 = 4;
    pub const I16: u8 = 6;
    pub const I32: u8 = 8;
    pub const I64: u8 = 10;
    pub const STRING: u8 = 11;
    pub const STRUCT: u8 = 12;
    pub const MAP: u8 = 13;
    pub const SET: u8 = 14;
    pub const LIST: u8 = 15;
}

/// A decoded `Log` request, as a server would see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCall {
    /// Sequence id to echo in the reply.
    pub seqid: i32,
    /// Entries in submission order.
    pub entries: Vec<LogEntry>,
}

fn put_binary(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_i32(bytes.len() as i32);
    buf.put_slice(bytes);
}

fn put_field(buf: &mut BytesMut, kind: u8, id: i16) {
    buf.put_u8(kind);
    buf.put_i16(id);
}

fn put_message_header(buf: &mut BytesMut, name: &str, kind: MessageType, seqid: i32) {
    buf.put_u32(VERSION_1 | kind as u32);
    put_binary(buf, name.as_bytes());
    buf.put_i32(seqid);
}

/// Encodes a `Log(list<LogEntry>)` call.
#[must_use]
pub fn encode_log_call(seqid: i32, entries: &[LogEntry]) -> Bytes {
    let body: usize = entries
        .iter()
        .map(|e| e.category().len() + e.message().len() + 16)
        .sum();
    let mut buf = BytesMut::with_capacity(32 + body);

    put_message_header(&mut buf, LOG_METHOD, MessageType::Call, seqid);
    put_field(&mut buf, ttype::LIST, 1);
    buf.put_u8(ttype::STRUCT);
    buf.put_i32(entries.len() as i32);
    for entry in entries {
        put_field(&mut buf, ttype::STRING, 1);
        put_binary(&mut buf, entry.category().as_bytes());
        put_field(&mut buf, ttype::STRING, 2);
        put_binary(&mut buf, entry.message());
        buf.put_u8(ttype::STOP);
    }
    buf.put_u8(ttype::STOP);
    buf.freeze()
}

/// Encodes a successful `Log` reply carrying `code`.
#[must_use]
pub fn encode_log_reply(seqid: i32, code: ResultCode) -> Bytes {
    let mut buf = BytesMut::with_capacity(32);
    put_message_header(&mut buf, LOG_METHOD, MessageType::Reply, seqid);
    put_field(&mut buf, ttype::I32, 0);
    buf.put_i32(code.as_i32());
    buf.put_u8(ttype::STOP);
    buf.freeze()
}

/// Encodes a `TApplicationException` reply.
#[must_use]
pub fn encode_exception(seqid: i32, name: &str, kind: i32, message: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(32 + message.len());
    put_message_header(&mut buf, name, MessageType::Exception, seqid);
    put_field(&mut buf, ttype::STRING, 1);
    put_binary(&mut buf, message.as_bytes());
    put_field(&mut buf, ttype::I32, 2);
    buf.put_i32(kind);
    buf.put_u8(ttype::STOP);
    buf.freeze()
}

/// Bounds-checked reader over one message payload.
struct Decoder {
    buf: Bytes,
}

impl Decoder {
    const fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(TransportError::protocol(format!(
                "truncated message: need {n} bytes, have {}",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn i16(&mut self) -> Result<i16> {
        self.need(2)?;
        Ok(self.buf.get_i16())
    }

    fn i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.buf.get_i32())
    }

    fn binary(&mut self) -> Result<Bytes> {
        let len = self.i32()?;
        let len = usize::try_from(len)
            .map_err(|_| TransportError::protocol(format!("negative length {len}")))?;
        self.need(len)?;
        Ok(self.buf.split_to(len))
    }

    fn string(&mut self) -> Result<String> {
        let raw = self.binary()?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| TransportError::protocol("string is not valid UTF-8"))
    }

    fn size(&mut self) -> Result<usize> {
        let size = self.i32()?;
        usize::try_from(size)
            .map_err(|_| TransportError::protocol(format!("negative container size {size}")))
    }

    fn message_header(&mut self) -> Result<(String, MessageType, i32)> {
        let first = self.i32()?;
        if first < 0 {
            let word = first as u32;
            if word & VERSION_MASK != VERSION_1 {
                return Err(TransportError::protocol(format!(
                    "bad protocol version {:#010x}",
                    word & VERSION_MASK
                )));
            }
            let kind = MessageType::from_u8((word & 0xff) as u8)?;
            let name = self.string()?;
            let seqid = self.i32()?;
            Ok((name, kind, seqid))
        } else {
            // non-strict header: the first word is the name length
            let len = first as usize;
            self.need(len)?;
            let name = String::from_utf8(self.buf.split_to(len).to_vec())
                .map_err(|_| TransportError::protocol("method name is not valid UTF-8"))?;
            let kind = MessageType::from_u8(self.u8()?)?;
            let seqid = self.i32()?;
            Ok((name, kind, seqid))
        }
    }

    fn field_header(&mut self) -> Result<Option<(u8, i16)>> {
        let kind = self.u8()?;
        if kind == ttype::STOP {
            return Ok(None);
        }
        Ok(Some((kind, self.i16()?)))
    }

    fn skip(&mut self, kind: u8, depth: usize) -> Result<()> {
        if depth > MAX_SKIP_DEPTH {
            return Err(TransportError::protocol("nesting too deep"));
        }
        match kind {
            ttype::BOOL | ttype::BYTE => self.advance(1),
            ttype::I16 => self.advance(2),
            ttype::I32 => self.advance(4),
            ttype::DOUBLE | ttype::I64 => self.advance(8),
            ttype::STRING => self.binary().map(drop),
            ttype::STRUCT => {
                while let Some((field, _)) = self.field_header()? {
                    self.skip(field, depth + 1)?;
                }
                Ok(())
            }
            ttype::MAP => {
                let key = self.u8()?;
                let value = self.u8()?;
                for _ in 0..self.size()? {
                    self.skip(key, depth + 1)?;
                    self.skip(value, depth + 1)?;
                }
                Ok(())
            }
            ttype::SET | ttype::LIST => {
                let elem = self.u8()?;
                for _ in 0..self.size()? {
                    self.skip(elem, depth + 1)?;
                }
                Ok(())
            }
            other => Err(TransportError::protocol(format!("unknown field type {other}"))),
        }
    }

    fn advance(&mut self, n: usize) -> Result<()> {
        self.need(n)?;
        self.buf.advance(n);
        Ok(())
    }

    fn application_exception(&mut self) -> Result<TransportError> {
        let mut message = String::new();
        let mut kind = 0;
        while let Some((field, id)) = self.field_header()? {
            match (id, field) {
                (1, ttype::STRING) => message = self.string()?,
                (2, ttype::I32) => kind = self.i32()?,
                _ => self.skip(field, 0)?,
            }
        }
        Ok(TransportError::Application { kind, message })
    }

    fn log_entry(&mut self) -> Result<LogEntry> {
        let mut category = String::new();
        let mut message = Bytes::new();
        while let Some((field, id)) = self.field_header()? {
            match (id, field) {
                (1, ttype::STRING) => category = self.string()?,
                (2, ttype::STRING) => message = self.binary()?,
                _ => self.skip(field, 0)?,
            }
        }
        Ok(LogEntry::new(category, message.to_vec()))
    }
}

fn check_method(name: &str) -> Result<()> {
    if name == LOG_METHOD {
        Ok(())
    } else {
        Err(TransportError::protocol(format!(
            "expected method {LOG_METHOD}, got {name}"
        )))
    }
}

/// Decodes the reply to a `Log` call issued with `expected_seqid`.
pub fn decode_log_reply(payload: Bytes, expected_seqid: i32) -> Result<ResultCode> {
    let mut dec = Decoder::new(payload);
    let (name, kind, seqid) = dec.message_header()?;

    if kind == MessageType::Exception {
        return Err(dec.application_exception()?);
    }
    if kind != MessageType::Reply {
        return Err(TransportError::protocol(format!(
            "expected a reply, got {kind:?}"
        )));
    }
    check_method(&name)?;
    if seqid != expected_seqid {
        return Err(TransportError::protocol(format!(
            "sequence id mismatch: sent {expected_seqid}, got {seqid}"
        )));
    }

    let mut success = None;
    while let Some((field, id)) = dec.field_header()? {
        if id == 0 && field == ttype::I32 {
            success = Some(dec.i32()?);
        } else {
            dec.skip(field, 0)?;
        }
    }

    success
        .map(ResultCode::from)
        .ok_or_else(|| TransportError::protocol("Log reply carried no result"))
}

/// Decodes a `Log` call.
pub fn decode_log_call(payload: Bytes) -> Result<LogCall> {
    let mut dec = Decoder::new(payload);
    let (name, kind, seqid) = dec.message_header()?;
    if !matches!(kind, MessageType::Call | MessageType::Oneway) {
        return Err(TransportError::protocol(format!(
            "expected a call, got {kind:?}"
        )));
    }
    check_method(&name)?;

    let mut entries = Vec::new();
    while let Some((field, id)) = dec.field_header()? {
        if id == 1 && field == ttype::LIST {
            let elem = dec.u8()?;
            let size = dec.size()?;
            if elem != ttype::STRUCT {
                return Err(TransportError::protocol(format!(
                    "expected list<struct>, got element type {elem}"
                )));
            }
            entries.reserve(size.min(4096));
            for _ in 0..size {
                entries.push(dec.log_entry()?);
            }
        } else {
            dec.skip(field, 0)?;
        }
    }

    Ok(LogCall { seqid, entries })
}

/// Writes one length-prefixed frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.put_u32(payload.len() as u32);
    frame.put_slice(payload);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed frame, refusing payloads above `max_frame_bytes`.
///
/// Returns `None` if the peer closed the stream before a new frame began.
pub async fn read_frame<R>(
    reader: &mut R,
    max_frame_bytes: usize,
    scratch: &mut BytesMut,
) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let length = u32::from_be_bytes(header) as usize;
    if length > max_frame_bytes {
        return Err(TransportError::FrameTooLarge {
            length,
            max: max_frame_bytes,
        });
    }

    scratch.clear();
    scratch.resize(length, 0);
    reader.read_exact(&mut scratch[..]).await?;
    Ok(Some(scratch.split().freeze()))
}
