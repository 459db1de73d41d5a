// Copyright © 2026 The network-transport-tcp Contributors
//
// This file is part of network-transport-tcp, distributed under the terms of
// the MIT license. For full terms see the included LICENSE file.

//! Bit-exact wire framing: big-endian `u32`s, length-prefixed byte strings, and the small
//! set of control tags multiplexed onto the same stream as lightweight-connection data.

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::FIRST_NONRESERVED_LIGHTWEIGHT_ID;

/// `(heavyweight_id << 32) | lightweight_id`, the label attached to user-visible events.
pub type ConnectionId = u64;

pub fn make_connection_id(heavyweight: u64, lightweight: u32) -> ConnectionId {
    (heavyweight << 32) | lightweight as u64
}

pub fn split_connection_id(id: ConnectionId) -> (u64, u32) {
    (id >> 32, (id & 0xffff_ffff) as u32)
}

/// Control tags carried as a full `u32` word when that word is below
/// [`FIRST_NONRESERVED_LIGHTWEIGHT_ID`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlHeader {
    CreateNewConnection = 0,
    CloseConnection = 1,
    CloseSocket = 2,
    CloseEndPoint = 3,
    ProbeSocket = 4,
    ProbeSocketAck = 5,
}

impl ControlHeader {
    pub fn from_u32(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::CreateNewConnection),
            1 => Some(Self::CloseConnection),
            2 => Some(Self::CloseSocket),
            3 => Some(Self::CloseEndPoint),
            4 => Some(Self::ProbeSocket),
            5 => Some(Self::ProbeSocketAck),
            _ => None,
        }
    }
}

/// Response word sent back over the handshake socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeResponse {
    Accepted = 0,
    Invalid = 1,
    Crossed = 2,
    HostMismatch = 3,
}

impl HandshakeResponse {
    pub fn from_u32(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::Accepted),
            1 => Some(Self::Invalid),
            2 => Some(Self::Crossed),
            3 => Some(Self::HostMismatch),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("length-prefixed field of {actual} bytes exceeds the configured limit of {max}")]
    TooLong { actual: u32, max: u32 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Is this word a lightweight connection id rather than a control tag?
pub fn is_lightweight_id(word: u32) -> bool {
    word >= FIRST_NONRESERVED_LIGHTWEIGHT_ID
}

pub async fn read_u32<R: AsyncReadExt + Unpin>(r: &mut R) -> Result<u32, CodecError> {
    Ok(r.read_u32().await?)
}

pub async fn write_u32<W: AsyncWriteExt + Unpin>(w: &mut W, v: u32) -> Result<(), CodecError> {
    w.write_u32(v).await?;
    Ok(())
}

/// Read a `u32` length followed by that many bytes, rejecting lengths over `max_len`.
pub async fn read_length_prefixed<R: AsyncReadExt + Unpin>(
    r: &mut R,
    max_len: u32,
) -> Result<Bytes, CodecError> {
    let len = read_u32(r).await?;
    if len > max_len {
        return Err(CodecError::TooLong { actual: len, max: max_len });
    }
    let mut buf = BytesMut::with_capacity(len as usize);
    buf.resize(len as usize, 0);
    r.read_exact(&mut buf).await?;
    Ok(buf.freeze())
}

pub async fn write_length_prefixed<W: AsyncWriteExt + Unpin>(
    w: &mut W,
    bytes: &[u8],
) -> Result<(), CodecError> {
    write_u32(w, bytes.len() as u32).await?;
    w.write_all(bytes).await?;
    Ok(())
}

/// Read a length-prefixed UTF-8 string (used for the handshake's peer-address field).
pub async fn read_length_prefixed_string<R: AsyncReadExt + Unpin>(
    r: &mut R,
    max_len: u32,
) -> Result<String, CodecError> {
    let bytes = read_length_prefixed(r, max_len).await?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| CodecError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

pub async fn write_length_prefixed_string<W: AsyncWriteExt + Unpin>(
    w: &mut W,
    s: &str,
) -> Result<(), CodecError> {
    write_length_prefixed(w, s.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_round_trips() {
        let id = make_connection_id(7, 1025);
        assert_eq!(split_connection_id(id), (7, 1025));
    }

    #[test]
    fn control_header_round_trips_known_tags() {
        for tag in 0..=5u32 {
            assert!(ControlHeader::from_u32(tag).is_some());
        }
        assert!(ControlHeader::from_u32(6).is_none());
    }

    #[test]
    fn lightweight_ids_start_at_1024() {
        assert!(!is_lightweight_id(1023));
        assert!(is_lightweight_id(1024));
    }

    #[tokio::test]
    async fn length_prefixed_bytes_round_trip() {
        let mut buf = Vec::new();
        write_length_prefixed(&mut buf, b"hello").await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let out = read_length_prefixed(&mut cursor, 1000).await.unwrap();
        assert_eq!(&out[..], b"hello");
    }

    #[tokio::test]
    async fn over_long_payload_is_rejected() {
        let mut buf = Vec::new();
        write_length_prefixed(&mut buf, &vec![0u8; 10]).await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_length_prefixed(&mut cursor, 5).await.unwrap_err();
        assert!(matches!(err, CodecError::TooLong { .. }));
    }
}
