//! 와이어 패킷 정의
//!
//! 고정 25바이트 헤더 (network byte order) + 불투명 페이로드:
//!
//! ```text
//! [TYPE:1][SEQ:4][PAYLOAD_LEN:4][BYTES_SENT:8][TOTAL_SIZE:8][PAYLOAD:N]
//! ```
//!
//! UDP에서는 데이터그램 경계가 곧 패킷 경계이므로 하나의 데이터그램이
//! 정확히 하나의 패킷이다.

use bytes::Bytes;

use crate::{Error, Result};

/// 헤더 길이 (바이트)
pub const HEADER_LEN: usize = 25;

/// 패킷 타입 (1바이트 ASCII 판별자)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// 데이터 청크 ('D')
    Data,

    /// 스트림 종료 ('E')
    End,

    /// 메타데이터/컨트롤 응답 ('I')
    Info,

    /// 스트림 에러 ('X')
    Error,

    /// 알 수 없는 타입 (forward compatibility, 원시 바이트 보존)
    Unknown(u8),
}

impl PacketType {
    pub fn as_byte(self) -> u8 {
        match self {
            PacketType::Data => b'D',
            PacketType::End => b'E',
            PacketType::Info => b'I',
            PacketType::Error => b'X',
            PacketType::Unknown(b) => b,
        }
    }

    pub fn from_byte(b: u8) -> Self {
        match b {
            b'D' => PacketType::Data,
            b'E' => PacketType::End,
            b'I' => PacketType::Info,
            b'X' => PacketType::Error,
            other => PacketType::Unknown(other),
        }
    }
}

/// 와이어 패킷
#[derive(Debug, Clone)]
pub struct Packet {
    /// 패킷 타입
    pub packet_type: PacketType,

    /// 스트림 내 시퀀스 번호 (DATA는 0부터 1씩 증가)
    pub sequence: u32,

    /// 이 패킷 이전까지 전송된 누적 페이로드 바이트 (진행률 표시용)
    pub bytes_sent: u64,

    /// 원본 전체 크기 (바이트)
    pub total_size: u64,

    /// 페이로드 (엔진은 내용을 해석하지 않음)
    pub payload: Bytes,
}

impl Packet {
    /// DATA 패킷 생성
    pub fn data(sequence: u32, payload: Bytes, bytes_sent: u64, total_size: u64) -> Self {
        Self {
            packet_type: PacketType::Data,
            sequence,
            bytes_sent,
            total_size,
            payload,
        }
    }

    /// END 패킷 생성 (마지막 DATA 이후 도달한 시퀀스 값 전달)
    pub fn end(sequence: u32, bytes_sent: u64, total_size: u64) -> Self {
        Self {
            packet_type: PacketType::End,
            sequence,
            bytes_sent,
            total_size,
            payload: Bytes::new(),
        }
    }

    /// INFO 패킷 생성 (total_size는 수신측 버퍼 초기화에 사용)
    pub fn info(payload: Bytes, total_size: u64) -> Self {
        Self {
            packet_type: PacketType::Info,
            sequence: 0,
            bytes_sent: 0,
            total_size,
            payload,
        }
    }

    /// ERROR 패킷 생성
    pub fn error(payload: Bytes) -> Self {
        Self {
            packet_type: PacketType::Error,
            sequence: 0,
            bytes_sent: 0,
            total_size: 0,
            payload,
        }
    }

    /// 패킷을 바이트로 직렬화
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.push(self.packet_type.as_byte());
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.bytes_sent.to_be_bytes());
        buf.extend_from_slice(&self.total_size.to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// 바이트에서 패킷 역직렬화
    ///
    /// - 25바이트 미만이면 `TruncatedPacket`
    /// - 선언된 payload_length보다 남은 바이트가 적으면 `TruncatedPacket`
    /// - 남은 바이트가 더 많으면 `MalformedPacket`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::TruncatedPacket {
                got: bytes.len(),
                need: HEADER_LEN,
            });
        }

        let packet_type = PacketType::from_byte(bytes[0]);
        let sequence = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let payload_len = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
        let bytes_sent = u64::from_be_bytes([
            bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15], bytes[16],
        ]);
        let total_size = u64::from_be_bytes([
            bytes[17], bytes[18], bytes[19], bytes[20], bytes[21], bytes[22], bytes[23], bytes[24],
        ]);

        let remaining = bytes.len() - HEADER_LEN;
        if remaining < payload_len {
            return Err(Error::TruncatedPacket {
                got: bytes.len(),
                need: HEADER_LEN + payload_len,
            });
        }
        if remaining > payload_len {
            return Err(Error::MalformedPacket {
                declared: payload_len,
                got: remaining,
            });
        }

        Ok(Self {
            packet_type,
            sequence,
            bytes_sent,
            total_size,
            payload: Bytes::copy_from_slice(&bytes[HEADER_LEN..]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_roundtrip() {
        let pkt = Packet::data(42, Bytes::from_static(b"hello world"), 1234, 99999);
        let restored = Packet::decode(&pkt.encode()).unwrap();

        assert_eq!(restored.packet_type, PacketType::Data);
        assert_eq!(restored.sequence, 42);
        assert_eq!(restored.bytes_sent, 1234);
        assert_eq!(restored.total_size, 99999);
        assert_eq!(restored.payload.as_ref(), b"hello world");
    }

    #[test]
    fn test_end_roundtrip_empty_payload() {
        let pkt = Packet::end(10, 5000, 5000);
        let restored = Packet::decode(&pkt.encode()).unwrap();

        assert_eq!(restored.packet_type, PacketType::End);
        assert_eq!(restored.sequence, 10);
        assert!(restored.payload.is_empty());
    }

    #[test]
    fn test_short_datagram_is_truncated() {
        let err = Packet::decode(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, Error::TruncatedPacket { got: 10, .. }));
    }

    #[test]
    fn test_truncated_payload() {
        let pkt = Packet::data(0, Bytes::from(vec![7u8; 100]), 0, 100);
        let mut bytes = pkt.encode();
        bytes.truncate(HEADER_LEN + 50);

        let err = Packet::decode(&bytes).unwrap_err();
        assert!(matches!(err, Error::TruncatedPacket { .. }));
    }

    #[test]
    fn test_excess_payload_is_malformed() {
        let pkt = Packet::data(0, Bytes::from_static(b"abc"), 0, 3);
        let mut bytes = pkt.encode();
        bytes.extend_from_slice(b"trailing");

        let err = Packet::decode(&bytes).unwrap_err();
        assert!(matches!(err, Error::MalformedPacket { declared: 3, got: 11 }));
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let mut bytes = Packet::end(1, 0, 0).encode();
        bytes[0] = b'Z';

        let pkt = Packet::decode(&bytes).unwrap();
        assert_eq!(pkt.packet_type, PacketType::Unknown(b'Z'));
        assert_eq!(pkt.packet_type.as_byte(), b'Z');
    }
}
