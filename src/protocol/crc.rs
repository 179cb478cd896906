//! CRC-16/CCITT as computed by the thermostat firmware, one nibble at a time.

const LOOKUP: [u16; 16] = [
    0x0000, 0x1021, 0x2042, 0x3063, 0x4084, 0x50A5, 0x60C6, 0x70E7, 0x8108, 0x9129, 0xA14A,
    0xB16B, 0xC18C, 0xD1AD, 0xE1CE, 0xF1EF,
];

const INITIAL: u16 = 0xFFFF;

fn crc16_4bits(crc: u16, nibble: u8) -> u16 {
    (crc << 4) ^ LOOKUP[usize::from((crc >> 12) as u8 ^ nibble)]
}

/// Computes the frame checksum over `buffer`.
///
/// The result is transmitted little-endian as the last two bytes of a frame.
pub fn calc_crc(buffer: &[u8]) -> u16 {
    buffer.iter().fold(INITIAL, |crc, b| {
        let crc = crc16_4bits(crc, b >> 4);
        crc16_4bits(crc, b & 0x0F)
    })
}
