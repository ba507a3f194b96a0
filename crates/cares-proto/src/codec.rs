//! Frame encoding and decoding utilities.

use rkyv::api::high::{HighDeserializer, HighSerializer, HighValidator};
use rkyv::bytecheck::CheckBytes;
use rkyv::rancor::Error as RkyvError;
use rkyv::ser::allocator::ArenaHandle;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};

use crate::error::ProtocolError;

/// Frame header size in bytes.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Maximum message size (4 MiB).
///
/// Large enough for any container output the orchestrator forwards,
/// small enough to bound per-connection buffering.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Message type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    /// Cluster membership message (join, metrics, commands).
    Cluster = 0x01,
    /// Function execution message.
    Function = 0x02,
}

impl MessageType {
    /// Creates a message type from a numeric value.
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x01 => Some(Self::Cluster),
            0x02 => Some(Self::Function),
            _ => None,
        }
    }

    /// Returns the numeric value of this message type.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Frame header for protocol messages.
///
/// Wire format (8 bytes, big-endian):
/// - Bytes 0-1: Protocol version (u16)
/// - Bytes 2-3: Message type (u16)
/// - Bytes 4-7: Payload length (u32)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Protocol version.
    pub version: u16,
    /// Message type discriminant.
    pub message_type: MessageType,
    /// Length of the payload in bytes.
    pub payload_len: u32,
}

impl FrameHeader {
    /// Creates a new frame header at the current protocol version.
    #[must_use]
    pub const fn new(message_type: MessageType, payload_len: u32) -> Self {
        Self {
            version: crate::version::CURRENT,
            message_type,
            payload_len,
        }
    }

    /// Encodes the frame header to bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        buf[0..2].copy_from_slice(&self.version.to_be_bytes());
        buf[2..4].copy_from_slice(&self.message_type.as_u16().to_be_bytes());
        buf[4..8].copy_from_slice(&self.payload_len.to_be_bytes());
        buf
    }

    /// Decodes a frame header from bytes.
    pub fn decode(bytes: &[u8; FRAME_HEADER_SIZE]) -> Result<Self, ProtocolError> {
        let version = u16::from_be_bytes([bytes[0], bytes[1]]);
        let message_type_raw = u16::from_be_bytes([bytes[2], bytes[3]]);
        let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

        if version < crate::version::MIN_SUPPORTED || version > crate::version::CURRENT {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let message_type = MessageType::from_u16(message_type_raw)
            .ok_or(ProtocolError::UnknownMessageType(message_type_raw))?;

        Ok(Self {
            version,
            message_type,
            payload_len,
        })
    }

    /// Validates the payload length against the message size limit.
    pub fn validate_payload_len(&self) -> Result<(), ProtocolError> {
        let len = self.payload_len as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: len,
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(())
    }
}

/// Codec for encoding and decoding protocol messages.
#[derive(Debug, Default)]
pub struct Codec {
    /// Reusable buffer for encoding.
    buffer: Vec<u8>,
}

impl Codec {
    /// Creates a new codec.
    #[must_use]
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates a codec with pre-allocated buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encodes an envelope to a complete frame (header + payload).
    pub fn encode<T>(
        &mut self,
        envelope: &crate::Envelope<T>,
        message_type: MessageType,
    ) -> Result<&[u8], ProtocolError>
    where
        T: Archive,
        crate::Envelope<T>: for<'a> Serialize<HighSerializer<AlignedVec, ArenaHandle<'a>, RkyvError>>,
    {
        let payload = rkyv::to_bytes::<RkyvError>(envelope)
            .map_err(|e| ProtocolError::Serialisation(e.to_string()))?;

        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        let header = FrameHeader::new(message_type, payload.len() as u32);
        self.buffer.clear();
        self.buffer.extend_from_slice(&header.encode());
        self.buffer.extend_from_slice(&payload);

        Ok(&self.buffer)
    }

    /// Decodes a message from payload bytes (without the frame header).
    pub fn decode<T>(bytes: &[u8]) -> Result<T, ProtocolError>
    where
        T: Archive,
        T::Archived: for<'a> CheckBytes<HighValidator<'a, RkyvError>>
            + Deserialize<T, HighDeserializer<RkyvError>>,
    {
        rkyv::from_bytes::<T, RkyvError>(bytes)
            .map_err(|e| ProtocolError::Deserialisation(e.to_string()))
    }
}
