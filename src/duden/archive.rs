//! C8: the Duden block-indexed archive (`.bof`/`.idx` pair). Articles are
//! stored compressed in fixed-size (8192-byte decompressed) blocks; the
//! `.idx` file is a flat array of `u32` offsets into the `.bof` file, one
//! per block boundary, with the archive's total decompressed size appended
//! as a trailing sentinel entry. Decompressing a block is comparatively
//! expensive, so the reader keeps a one-block cache -- the access pattern
//! during a conversion run is heavily sequential (headings within one block
//! get pulled one after another).

use std::io::{Read, Seek, SeekFrom};

use crate::duden::inflate::inflate;
use crate::error::{Error, Result};

/// Decompressed block size every Duden archive block inflates to (`g_DecodedBofBlockSize`).
pub const BLOCK_SIZE: usize = 0x2000;

pub struct Archive<R> {
    bof: R,
    /// Block-start offsets into the `.bof` file, one per block, *including*
    /// the one-past-the-end offset needed to size the final block (i.e. this
    /// is the index as read off disk, before the decompressed-size sentinel
    /// is popped off).
    index: Vec<u32>,
    decoded_size: u32,
    cache: Option<(usize, Vec<u8>)>,
}

impl<R: Read + Seek> Archive<R> {
    pub fn new(bof: R, mut index: Vec<u32>) -> Result<Self> {
        let decoded_size = index.pop().ok_or_else(|| Error::parse("duden .idx file is empty"))?;
        Ok(Self { bof, index, decoded_size, cache: None })
    }

    /// Parse a `.idx` file: a flat array of little-endian `u32` block-start
    /// offsets, terminated implicitly by the file's length (no count
    /// prefix). The final entry is the archive's total decompressed size,
    /// not a block offset -- popped off by `Archive::new`.
    pub fn parse_index(data: &[u8]) -> Result<Vec<u32>> {
        if data.len() % 4 != 0 {
            return Err(Error::parse("duden .idx file size is not a multiple of 4"));
        }
        Ok(data.chunks_exact(4).map(|c| u32::from_le_bytes(c.try_into().unwrap())).collect())
    }

    pub fn decoded_size(&self) -> u32 {
        self.decoded_size
    }

    /// Decompress block `index` into the cache, or return `false` if the
    /// block's declared compressed size is zero (the archive's
    /// end-of-stream sentinel).
    fn read_block(&mut self, index: usize) -> Result<bool> {
        if self.cache.as_ref().map(|(n, _)| *n) == Some(index) {
            return Ok(true);
        }
        let offset = match self.index.get(index) {
            Some(&o) => o,
            None => return Ok(false),
        };
        let next = match self.index.get(index + 1) {
            Some(&o) => o,
            None => return Ok(false),
        };
        let size = next.saturating_sub(offset);
        if size == 0 {
            return Ok(false);
        }
        self.bof.seek(SeekFrom::Start(offset as u64))?;
        let mut compressed = vec![0u8; size as usize];
        self.bof.read_exact(&mut compressed)?;
        let decompressed = inflate(&compressed, BLOCK_SIZE)?;
        if decompressed.len() > BLOCK_SIZE {
            return Err(Error::decode("duden decoded block exceeds 8192 bytes"));
        }
        self.cache = Some((index, decompressed));
        Ok(true)
    }

    /// Read `size` bytes of decoded archive content starting at the logical
    /// (decoded) byte offset `plain_offset`, draining across block
    /// boundaries. `size == u32::MAX` reads to the end of the archive --
    /// the reference relies on unsigned wraparound for this (`size` never
    /// reaches the accumulated output length), which Rust cannot replicate
    /// without risking an overflow panic, so it is handled as an explicit
    /// "read everything" sentinel here instead.
    pub fn read(&mut self, plain_offset: u32, size: u32) -> Result<Vec<u8>> {
        if plain_offset >= self.decoded_size {
            return Err(Error::decode("duden archive read starts past end of decoded data"));
        }
        let read_to_end = size == u32::MAX;
        let target: usize = if read_to_end {
            (self.decoded_size - plain_offset) as usize
        } else {
            size as usize
        };

        let mut output = Vec::with_capacity(target.min(1 << 20));
        let mut block = (plain_offset as usize) / BLOCK_SIZE;
        let mut offset_in_block = (plain_offset as usize) % BLOCK_SIZE;
        while output.len() != target && self.read_block(block)? {
            let decoded = &self.cache.as_ref().unwrap().1;
            if offset_in_block >= decoded.len() {
                break;
            }
            let want = target - output.len();
            let avail = decoded.len() - offset_in_block;
            let take = want.min(avail);
            output.extend_from_slice(&decoded[offset_in_block..offset_in_block + take]);
            block += 1;
            offset_in_block = 0;
        }
        Ok(output)
    }

    /// Read a NUL-terminated string starting at the logical byte offset
    /// `plain_offset`.
    pub fn read_cstring(&mut self, plain_offset: u32) -> Result<Vec<u8>> {
        // No declared length; read in growing chunks until a NUL turns up
        // or the archive ends.
        let mut chunk_size: u32 = 256;
        loop {
            let buf = self.read(plain_offset, chunk_size)?;
            if let Some(end) = buf.iter().position(|&b| b == 0) {
                return Ok(buf[..end].to_vec());
            }
            if (buf.len() as u32) < chunk_size {
                return Ok(buf);
            }
            chunk_size = chunk_size.saturating_mul(4);
        }
    }

    pub fn block_count(&self) -> usize {
        self.index.len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_flat_u32_index() {
        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&50u32.to_le_bytes());
        data.extend_from_slice(&4096u32.to_le_bytes());
        let entries = Archive::<Cursor<Vec<u8>>>::parse_index(&data).unwrap();
        assert_eq!(entries, vec![0, 50, 4096]);
    }

    #[test]
    fn rejects_truncated_index() {
        let data = vec![0u8; 3];
        assert!(Archive::<Cursor<Vec<u8>>>::parse_index(&data).is_err());
    }

    #[test]
    fn pops_trailing_decoded_size_sentinel() {
        let index = vec![0u32, 10u32, 123u32];
        let archive = Archive::new(Cursor::new(Vec::<u8>::new()), index).unwrap();
        assert_eq!(archive.decoded_size(), 123);
        assert_eq!(archive.block_count(), 1);
    }
}
