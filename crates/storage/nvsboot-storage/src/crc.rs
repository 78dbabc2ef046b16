//! CRC32 used by page headers, entry headers and string payloads
//!
//! Reflected CRC-32 (polynomial 0x04C11DB7) with a zero initial register and
//! a final xor of 0xFFFFFFFF. Host tools produce the same value with
//! `zlib.crc32(data, 0xFFFFFFFF)`.

use crc::{Algorithm, Crc, Digest};

/// CRC parameters of the partition format
pub const CRC_32_NVS: Algorithm<u32> = Algorithm {
    width: 32,
    poly: 0x04c1_1db7,
    init: 0x0000_0000,
    refin: true,
    refout: true,
    xorout: 0xffff_ffff,
    check: 0xd202_d277,
    residue: 0xdebb_20e3,
};

static NVS_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_NVS);

/// Checksum of a contiguous buffer
pub fn crc32(data: &[u8]) -> u32 {
    NVS_CRC.checksum(data)
}

/// Incremental checksum for data read piece by piece
pub fn digest() -> Digest<'static, u32> {
    NVS_CRC.digest()
}

/// Checksum over several non-contiguous pieces
pub fn crc32_parts(parts: &[&[u8]]) -> u32 {
    let mut digest = digest();
    for part in parts {
        digest.update(part);
    }
    digest.finalize()
}
