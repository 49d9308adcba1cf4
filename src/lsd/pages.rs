//! C5: heading page traversal and the overlay resource section.
//!
//! LSD heading pages form a B-tree, but headings only ever live in leaf
//! pages; the reference reader does not walk the tree structure to find a
//! specific heading, it scans every leaf page in file order once and keeps
//! the flat list -- this crate does the same (`scan_headings`), trading a
//! small amount of up-front I/O for a much simpler, allocation-light
//! traversal than a recursive B-tree walk would need.

use std::io::{Read, Seek};

use flate2::read::ZlibDecoder;

use crate::bitstream::{BitRead, BitReadExt, BitReader, ByteSource};
use crate::error::{Error, Result};
use crate::lsd::dialect::read_unicode_string;
use crate::lsd::heading::ArticleHeading;

/// One page's header: `is_leaf` (1 bit) then five 16-bit fields, byte-aligned
/// after. Mirrors `CachePage::loadHeader` field-for-field: `isLeaf, number,
/// prev, parent, next, headingsCount`.
#[derive(Debug, Clone, Copy)]
pub struct PageHeader {
    pub is_leaf: bool,
    pub page_number: u16,
    pub prev_page: u16,
    pub parent_page: u16,
    pub next_page: u16,
    pub headings_count: u16,
}

impl PageHeader {
    fn read<S: ByteSource>(r: &mut BitReader<S>) -> Result<Self> {
        let is_leaf = r.read_bits(1)? != 0;
        let page_number = r.read_bits(16)? as u16;
        let prev_page = r.read_bits(16)? as u16;
        let parent_page = r.read_bits(16)? as u16;
        let next_page = r.read_bits(16)? as u16;
        let headings_count = r.read_bits(16)? as u16;
        r.align_to_byte();
        Ok(PageHeader { is_leaf, page_number, prev_page, parent_page, next_page, headings_count })
    }
}

/// B-tree page size used throughout the format's page chain.
pub const PAGE_SIZE: u64 = 512;

/// Scan every page in `[first_page_offset, pages_end)`, decoding leaf-page
/// entries via `decoder` (`ArticleHeading::Load`, `C6`) and skipping node
/// pages entirely (their entries only carry routing keys, never full
/// headings; `ReadReference1` belongs to a node page's single "first child"
/// reference, not to a leaf entry).
pub fn scan_headings<S: Read + Seek>(
    reader: &mut BitReader<S>,
    decoder: &dyn crate::lsd::dialect::DialectDecoder,
    first_page_offset: u64,
    pages_end: u64,
) -> Result<Vec<ArticleHeading>> {
    let mut headings = Vec::new();
    let mut offset = first_page_offset;
    while offset + PAGE_SIZE <= pages_end {
        reader.seek(offset)?;
        let header = PageHeader::read(reader)?;
        if header.is_leaf {
            let mut known_prefix: Vec<u16> = Vec::new();
            for _ in 0..header.headings_count {
                let heading = ArticleHeading::load(decoder, reader, &known_prefix)?;
                known_prefix = heading.text().to_vec();
                headings.push(heading);
            }
        }
        offset += PAGE_SIZE;
    }
    Ok(headings)
}

/// The overlay resource section: `entries_count` (u32) followed by that many
/// variable-length entries (`OverlayHeading` in `LSDOverlayReader.cpp`):
/// an 8-bit-length-prefixed UTF-16 name, `offset`, a reserved `u32`, the
/// inflated size, and the *exact* compressed stream size. Entries with
/// `inflated_size == 0` are dropped rather than inflated (the reference
/// treats a zero size as "no resource present" for that slot, not an empty
/// blob).
pub struct OverlayEntry {
    pub name: String,
    pub offset: u32,
    pub inflated_size: u32,
    pub stream_size: u32,
}

pub fn read_overlay_entries<S: Read + Seek>(reader: &mut BitReader<S>, count: u32) -> Result<Vec<OverlayEntry>> {
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_len = reader.read_u8()? as usize;
        let name = crate::lsd::dialect::to_display_string(&read_unicode_string(reader, name_len, false)?);
        let offset = reader.read_u32le()?;
        let _reserved = reader.read_u32le()?;
        let inflated_size = reader.read_u32le()?;
        let stream_size = reader.read_u32le()?;
        if inflated_size == 0 {
            continue;
        }
        entries.push(OverlayEntry { name, offset, inflated_size, stream_size });
    }
    Ok(entries)
}

/// Inflate one overlay resource blob located at `entry.offset` relative to
/// `base_offset`, reading exactly `entry.stream_size` compressed bytes and
/// inflating to exactly `entry.inflated_size` bytes.
pub fn inflate_overlay_entry<S: Read + Seek>(
    reader: &mut BitReader<S>,
    base_offset: u64,
    entry: &OverlayEntry,
) -> Result<Vec<u8>> {
    reader.seek(base_offset + entry.offset as u64)?;
    let mut compressed = vec![0u8; entry.stream_size as usize];
    reader.read_some(&mut compressed)?;

    let mut decoder = ZlibDecoder::new(&compressed[..]);
    let mut out = Vec::with_capacity(entry.inflated_size as usize);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::decode(format!("overlay zlib inflate failed: {e}")))?;
    if out.len() != entry.inflated_size as usize {
        return Err(Error::decode("overlay zlib inflate produced unexpected size"));
    }
    Ok(out)
}
