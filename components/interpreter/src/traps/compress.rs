//! Compression and checksum traps over byte arrays

use std::io::{Read, Write};
use std::sync::Arc;

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::{Compression, Crc};

use bytecode_system::TrapId;
use core_types::{Fault, Word, NIL};

use super::Guard;
use crate::runtime::Runtime;
use crate::strings;

fn zlib_compress(data: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).ok()?;
    encoder.finish().ok()
}

fn zlib_uncompress(data: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut out).ok()?;
    Some(out)
}

fn gzip_compress(data: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).ok()?;
    encoder.finish().ok()
}

fn gzip_uncompress(data: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out).ok()?;
    Some(out)
}

/// CRC-32 of `data`.
pub(crate) fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

pub(super) fn trap(rt: &Arc<Runtime>, state: &mut Guard<'_>, trap: TrapId) -> Result<(), Fault> {
    use TrapId::*;
    let memory = rt.memory();
    let handle = state.pop_int()?;
    let input = if handle == NIL {
        None
    } else {
        Some(strings::bytes_of(&*strings::array_block(memory, handle)?))
    };

    let output = match (trap, input) {
        (Crc32Bytes, input) => {
            state.push_int(input.map_or(0, |data| crc32(&data) as Word));
            return Ok(());
        }
        (CompressZlibBytes, Some(data)) => zlib_compress(&data),
        (UncompressZlibBytes, Some(data)) => zlib_uncompress(&data),
        (CompressGzipBytes, Some(data)) => gzip_compress(&data),
        (UncompressGzipBytes, Some(data)) => gzip_uncompress(&data),
        // Brotli has no codec here
        _ => None,
    };

    match output {
        Some(bytes) => {
            let array = strings::new_byte_array(memory, state, &bytes)?;
            state.push_int(array);
        }
        None => state.push_int(NIL),
    }
    Ok(())
}
