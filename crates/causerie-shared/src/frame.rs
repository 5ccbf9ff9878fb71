//! Fixed-layout conferencing frames.
//!
//! Every message between the conferencing client and server is one
//! [`Frame`], transmitted as an indivisible 1132-byte unit: a u32 type
//! tag, a u32 advisory payload size, then three zero-padded byte fields
//! (source, session, data). Integer fields are little-endian. Reads and
//! writes always cross the full frame boundary; a short read means the
//! peer went away.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::{FRAME_LEN, MAX_NAME};
use crate::error::FrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageType {
    Login = 1,
    LoginAck = 2,
    LoginNak = 3,
    Exit = 4,
    Join = 5,
    JoinAck = 6,
    JoinNak = 7,
    LeaveSession = 8,
    NewSession = 9,
    NewSessionAck = 10,
    Message = 11,
    Query = 12,
    QueryAck = 13,
}

impl TryFrom<u32> for MessageType {
    type Error = FrameError;

    fn try_from(tag: u32) -> Result<Self, FrameError> {
        Ok(match tag {
            1 => Self::Login,
            2 => Self::LoginAck,
            3 => Self::LoginNak,
            4 => Self::Exit,
            5 => Self::Join,
            6 => Self::JoinAck,
            7 => Self::JoinNak,
            8 => Self::LeaveSession,
            9 => Self::NewSession,
            10 => Self::NewSessionAck,
            11 => Self::Message,
            12 => Self::Query,
            13 => Self::QueryAck,
            other => return Err(FrameError::BadType(other)),
        })
    }
}

/// In-memory form of one wire frame.
///
/// `size` mirrors the advisory length field; receivers must not trust it
/// for framing. Text shorter than its field is NUL-terminated on the wire
/// and trimmed again on decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: MessageType,
    pub size: u32,
    pub source: String,
    pub session: String,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(
        kind: MessageType,
        source: impl Into<String>,
        session: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        let data = data.into();
        Self {
            kind,
            size: data.len() as u32,
            source: source.into(),
            session: session.into(),
            data,
        }
    }

    /// A server reply carrying only a type tag and a payload.
    pub fn reply(kind: MessageType, data: impl Into<Vec<u8>>) -> Self {
        Self::new(kind, "", "", data)
    }

    pub fn login(id: &str, password: &str) -> Self {
        Self::new(MessageType::Login, id, "", password.as_bytes())
    }

    pub fn data_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut buf = [0u8; FRAME_LEN];
        buf[0..4].copy_from_slice(&(self.kind as u32).to_le_bytes());
        buf[4..8].copy_from_slice(&self.size.to_le_bytes());
        copy_padded(&mut buf[8..8 + MAX_NAME], self.source.as_bytes());
        copy_padded(&mut buf[8 + MAX_NAME..8 + 2 * MAX_NAME], self.session.as_bytes());
        copy_padded(&mut buf[8 + 2 * MAX_NAME..], &self.data);
        buf
    }

    pub fn decode(buf: &[u8; FRAME_LEN]) -> Result<Self, FrameError> {
        let kind = u32::from_le_bytes(buf[0..4].try_into().unwrap_or_default());
        let kind = MessageType::try_from(kind)?;
        let size = u32::from_le_bytes(buf[4..8].try_into().unwrap_or_default());
        let source = decode_name(&buf[8..8 + MAX_NAME])?;
        let session = decode_name(&buf[8 + MAX_NAME..8 + 2 * MAX_NAME])?;
        let data = trim_nul(&buf[8 + 2 * MAX_NAME..]).to_vec();
        Ok(Self {
            kind,
            size,
            source,
            session,
            data,
        })
    }
}

/// Copy `src` into `dst`, truncating to leave at least one trailing NUL.
fn copy_padded(dst: &mut [u8], src: &[u8]) {
    let n = src.len().min(dst.len().saturating_sub(1));
    dst[..n].copy_from_slice(&src[..n]);
}

fn trim_nul(field: &[u8]) -> &[u8] {
    match field.iter().position(|&b| b == 0) {
        Some(end) => &field[..end],
        None => field,
    }
}

fn decode_name(field: &[u8]) -> Result<String, FrameError> {
    std::str::from_utf8(trim_nul(field))
        .map(str::to_owned)
        .map_err(|_| FrameError::BadText)
}

/// Read exactly one frame. EOF anywhere inside the 1132-byte extent is
/// reported as [`FrameError::Closed`].
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, FrameError> {
    let mut buf = [0u8; FRAME_LEN];
    reader.read_exact(&mut buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            FrameError::Closed
        } else {
            FrameError::Io(e)
        }
    })?;
    Frame::decode(&buf)
}

/// Write one frame in full.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
) -> Result<(), FrameError> {
    writer.write_all(&frame.encode()).await?;
    writer.flush().await?;
    Ok(())
}
