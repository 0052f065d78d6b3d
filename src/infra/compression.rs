//! Zlib compression and decompression of stored objects.

/// Compresses data into a zlib stream.
pub fn compress(data: &[u8]) -> Vec<u8> {
    // Level 6 is zlib's default and what git writes.
    miniz_oxide::deflate::compress_to_vec_zlib(data, 6)
}

/// Decompresses a zlib stream.
///
/// Returns `None` if the stream is empty, carries an invalid zlib header,
/// or is corrupted or truncated. Callers map `None` to their own error.
pub fn decompress(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < 2 || !is_valid_zlib_header(data[0], data[1]) {
        return None;
    }

    miniz_oxide::inflate::decompress_to_vec_zlib(data).ok()
}

/// Validates a zlib header.
///
/// - The compression method (low 4 bits of CMF) must be 8 (DEFLATE)
/// - The window size (high 4 bits of CMF) must be at most 7
/// - (CMF * 256 + FLG) must be a multiple of 31
fn is_valid_zlib_header(cmf: u8, flg: u8) -> bool {
    if cmf & 0x0F != 8 {
        return false;
    }
    if (cmf >> 4) & 0x0F > 7 {
        return false;
    }
    ((cmf as u16) * 256 + (flg as u16)) % 31 == 0
}
