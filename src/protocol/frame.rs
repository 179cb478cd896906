use super::crc::calc_crc;
use super::write::DcbEntry;
use crate::{Error, Result};

/// Operation code of a DCB read request.
pub const READ_OPCODE: u8 = 0x93;
/// Operation code of a DCB write request.
pub const WRITE_OPCODE: u8 = 0xA3;
/// Leading byte of every response, acknowledging both reads and writes.
pub const READ_ACK: u8 = 0x94;

/// Bytes in front of the payload of a request: opcode, length and pin.
const REQUEST_HEADER_LENGTH: usize = 5;
/// Bytes in front of the DCB of a response: code, length, start address and byte count.
const RESPONSE_HEADER_LENGTH: usize = 7;
const CHECKSUM_LENGTH: usize = 2;

/// Number of leading bytes a transport must read to learn the full frame length.
pub const LENGTH_PREFIX: usize = 3;

/// Payload of a read request, asking for the whole DCB.
const FULL_RANGE: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

/// Returns the frame length declared in the first [`LENGTH_PREFIX`] bytes.
pub fn declared_length(prefix: &[u8; LENGTH_PREFIX]) -> usize {
    usize::from(u16::from_le_bytes([prefix[1], prefix[2]]))
}

fn validate_checksum(buffer: &[u8]) -> Result<u16> {
    let split = buffer.len() - CHECKSUM_LENGTH;
    let calculated = calc_crc(&buffer[..split]);
    let received = u16::from_le_bytes([buffer[split], buffer[split + 1]]);
    if received != calculated {
        log::warn!(
            "Invalid checksum - calculated={:04X} received={:04X} buffer={:02X?}",
            calculated,
            received,
            buffer
        );
        return Err(Error::ChecksumMismatch {
            calculated,
            received,
        });
    }
    Ok(received)
}

fn assemble(operation: u8, length: u16, pin: u16, payload: &[u8]) -> Vec<u8> {
    let mut tx_buffer = Vec::with_capacity(usize::from(length));
    tx_buffer.push(operation);
    tx_buffer.extend_from_slice(&length.to_le_bytes());
    tx_buffer.extend_from_slice(&pin.to_le_bytes());
    tx_buffer.extend_from_slice(payload);
    let crc = calc_crc(&tx_buffer);
    tx_buffer.extend_from_slice(&crc.to_le_bytes());
    log::trace!("assembled frame: {:02X?}", tx_buffer);
    tx_buffer
}

/// Builds a complete request frame: header, payload and trailing checksum.
pub fn build_frame(operation: u8, pin: u16, payload: &[u8]) -> Result<Vec<u8>> {
    let length = REQUEST_HEADER_LENGTH + payload.len() + CHECKSUM_LENGTH;
    let declared = u16::try_from(length).map_err(|_| Error::FrameTooLong(length))?;
    Ok(assemble(operation, declared, pin, payload))
}

/// Request for the full device control block.
pub fn read_request(pin: u16) -> Vec<u8> {
    const LENGTH: u16 = (REQUEST_HEADER_LENGTH + FULL_RANGE.len() + CHECKSUM_LENGTH) as u16;
    assemble(READ_OPCODE, LENGTH, pin, &FULL_RANGE)
}

/// Request writing every entry in one frame, in the given order.
pub fn write_request(pin: u16, entries: &[DcbEntry]) -> Result<Vec<u8>> {
    let count = u8::try_from(entries.len()).map_err(|_| Error::FrameTooLong(entries.len()))?;
    let mut payload = vec![count];
    for entry in entries {
        entry.encode_into(&mut payload)?;
    }
    build_frame(WRITE_OPCODE, pin, &payload)
}

/// A validated response frame, borrowing its DCB from the received bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame<'a> {
    pub code: u8,
    pub frame_length: u16,
    pub start_address: u16,
    pub byte_count: u16,
    pub dcb: &'a [u8],
    pub checksum: u16,
}

impl<'a> ResponseFrame<'a> {
    /// Validates code, length and checksum of one complete response.
    pub fn parse(rx_buffer: &'a [u8]) -> Result<Self> {
        let code = *rx_buffer.first().ok_or(Error::LengthMismatch {
            declared: RESPONSE_HEADER_LENGTH + CHECKSUM_LENGTH,
            actual: 0,
        })?;
        if code != READ_ACK {
            log::warn!("Invalid response code {:02X}", code);
            return Err(Error::InvalidResponseCode(code));
        }
        if rx_buffer.len() < RESPONSE_HEADER_LENGTH + CHECKSUM_LENGTH {
            log::warn!("Response too short - received={}", rx_buffer.len());
            return Err(Error::LengthMismatch {
                declared: RESPONSE_HEADER_LENGTH + CHECKSUM_LENGTH,
                actual: rx_buffer.len(),
            });
        }
        let frame_length = u16::from_le_bytes([rx_buffer[1], rx_buffer[2]]);
        if usize::from(frame_length) != rx_buffer.len() {
            log::warn!(
                "Invalid frame length - declared={} received={}",
                frame_length,
                rx_buffer.len()
            );
            return Err(Error::LengthMismatch {
                declared: frame_length.into(),
                actual: rx_buffer.len(),
            });
        }
        let checksum = validate_checksum(rx_buffer)?;

        let byte_count = u16::from_le_bytes([rx_buffer[5], rx_buffer[6]]);
        let dcb = &rx_buffer[RESPONSE_HEADER_LENGTH..rx_buffer.len() - CHECKSUM_LENGTH];
        if usize::from(byte_count) != dcb.len() {
            log::debug!(
                "Byte count {} differs from DCB size {}",
                byte_count,
                dcb.len()
            );
        }
        Ok(Self {
            code,
            frame_length,
            start_address: u16::from_le_bytes([rx_buffer[3], rx_buffer[4]]),
            byte_count,
            dcb,
            checksum,
        })
    }
}
