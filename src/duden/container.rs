//! C9: Duden container metadata -- the `.inf` dictionary descriptor, `.hic`
//! heading-index tree, `.fsi` resource directory, and `.ld` heading-range
//! table.
//!
//! `.inf` and `.ld` are line-oriented text; `.hic` and `.fsi` are packed
//! binary. None of the four share a format with each other, so each gets
//! its own parser below rather than a shared line/record abstraction.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek, SeekFrom};

use lazy_static::lazy_static;
use regex::Regex;

use crate::duden::charset::duden_to_utf8;
use crate::error::{Error, Result};

// ---------------------------------------------------------------- .inf ----

/// One dictionary group's files, resolved from an `.inf` group's `F` lines.
#[derive(Debug, Clone)]
pub struct InfDictionary {
    pub title: String,
    pub hic_name: String,
    pub bof_name: String,
    pub idx_name: String,
    pub resources: Vec<InfResource>,
}

/// A resource archive (pictures, sounds, tables) belonging to a dictionary,
/// with its own `.idx` index and an optional `.fsi` name directory -- a
/// resource pack with no `.fsi` is one undifferentiated blob, unpacked as a
/// single named-by-stem resource instead of many named entries.
#[derive(Debug, Clone)]
pub struct InfResource {
    pub bof_name: String,
    pub idx_name: String,
    pub fsi_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InfFile {
    pub version: Option<String>,
    pub dictionaries: Vec<InfDictionary>,
}

/// Parse a `.inf` file: `V` sets the format version line, `T` opens a new
/// dictionary group named by the rest of the line, `F` appends `;`-separated
/// filenames to the current group.
pub fn parse_inf(text: &str) -> Result<InfFile> {
    let mut version = None;
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();

    for line in text.lines() {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            continue;
        }
        let (tag, rest) = line.split_at(1);
        let rest = rest.trim();
        match tag {
            "V" => version = Some(rest.to_string()),
            "T" => groups.push((rest.to_string(), Vec::new())),
            "F" => {
                if let Some((_, files)) = groups.last_mut() {
                    files.extend(rest.split(';').map(str::trim).filter(|s| !s.is_empty()).map(String::from));
                }
            }
            _ => {}
        }
    }

    let mut dictionaries = Vec::new();
    for (title, mut files) in groups {
        let hic_name = take_by_ext(&mut files, ".hic")
            .ok_or_else(|| Error::parse(format!(".inf group {title:?} names no .hic file")))?;
        let bof_name = take_by_ext(&mut files, ".bof")
            .ok_or_else(|| Error::parse(format!(".inf group {title:?} names no .bof file")))?;
        let idx_name = files
            .iter()
            .find(|f| f.to_ascii_lowercase().ends_with(".idx"))
            .cloned()
            .ok_or_else(|| Error::parse(format!(".inf group {title:?} names no .idx file")))?;

        let mut resources = Vec::new();
        while let Some(res_bof) = take_by_ext(&mut files, ".bof") {
            let base = strip_ext(&res_bof);
            let idx_name = files
                .iter()
                .position(|f| f.to_ascii_lowercase().ends_with(".idx") && strip_ext(f) == base)
                .map(|i| files.remove(i))
                .ok_or_else(|| Error::parse(format!(".inf resource {res_bof:?} names no matching .idx file")))?;
            let fsi_name = files
                .iter()
                .position(|f| f.to_ascii_lowercase().ends_with(".fsi") && strip_ext(f) == base)
                .map(|i| files.remove(i));
            resources.push(InfResource { bof_name: res_bof, idx_name, fsi_name });
        }

        dictionaries.push(InfDictionary { title, hic_name, bof_name, idx_name, resources });
    }

    Ok(InfFile { version, dictionaries })
}

fn take_by_ext(files: &mut Vec<String>, ext: &str) -> Option<String> {
    let pos = files.iter().position(|f| f.to_ascii_lowercase().ends_with(ext))?;
    Some(files.remove(pos))
}

fn strip_ext(name: &str) -> String {
    match name.rfind('.') {
        Some(i) => name[..i].to_ascii_lowercase(),
        None => name.to_ascii_lowercase(),
    }
}

// ---------------------------------------------------------------- .hic ----

pub const HIC_MAGIC: &[u8; 34] = b"compressed PC-Bibliothek Hierarchy";

#[derive(Debug, Clone, Copy, Default)]
pub struct HicHeader {
    pub version: u8,
    pub heading_count: u32,
}

/// One entry decoded out of a `.hic` node page.
#[derive(Debug, Clone)]
enum HicNode {
    Leaf { text_offset: u32, entry_type: u8 },
    Child { hic_offset: u32 },
}

/// A leaf heading, in the order it was visited while walking the tree --
/// this order assigns each heading its index for `.ld` lookups.
#[derive(Debug, Clone)]
pub struct HicHeading {
    pub text: String,
    pub entry_type: u8,
    pub text_offset: u32,
}

/// Discriminants a `.hic` leaf's folded-in type byte can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HicEntryType {
    Plain = 1,
    Reference = 2,
    Range = 4,
    Person = 6,
    VariantWith = 7,
    VariantWithout = 8,
    Variant = 10,
    Unknown11 = 11,
}

fn read_u16<R: Read>(r: &mut R) -> Result<u16> {
    let mut b = [0u8; 2];
    r.read_exact(&mut b)?;
    Ok(u16::from_le_bytes(b))
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

fn read_cstring<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut b = [0u8; 1];
    loop {
        r.read_exact(&mut b)?;
        if b[0] == 0 {
            return Ok(out);
        }
        out.push(b[0]);
    }
}

/// Expand one page's headings: a leading byte `< 0x20` means "share this
/// many bytes with the previous heading on this page", otherwise the whole
/// line is a literal heading. Resets at the start of every page.
pub fn decode_heading_prefixes(raw: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let mut prev: Vec<u8> = Vec::new();
    let mut out = Vec::with_capacity(raw.len());
    for line in raw {
        let heading = match line.split_first() {
            Some((&first, rest)) if first < 0x20 => {
                let mut h = prev[..(first as usize).min(prev.len())].to_vec();
                h.extend_from_slice(rest);
                h
            }
            _ => line.clone(),
        };
        prev = heading.clone();
        out.push(heading);
    }
    out
}

/// Parse a `.hic` heading tree: magic, version byte, version-specific
/// packed header, a name field, then a tree of node pages rooted right
/// after the header. Leaves are visited in the tree's natural (sorted)
/// order, which is what gives each one its heading index.
pub fn parse_hic<R: Read + Seek>(mut r: R) -> Result<(HicHeader, Vec<HicHeading>)> {
    let mut magic = [0u8; 34];
    r.read_exact(&mut magic)?;
    if &magic != HIC_MAGIC {
        return Err(Error::parse("bad .hic magic"));
    }
    let mut skip = [0u8; 1];
    r.read_exact(&mut skip)?; // reserved
    r.read_exact(&mut skip)?;
    let version = skip[0];

    // `Hic3Header`/`Hic4Header`/`Hic5Header` in `lib/duden/Duden.cpp`: each
    // version prepends a different number of opaque leading fields before
    // the `(headingCount, blockCount, ..., namelen)` tail that every version
    // shares. Versions 5 and 6 share `Hic5Header` verbatim. `namelen` is
    // always the header's very last byte.
    let (heading_count, name_len) = match version {
        3 => {
            let heading_count = read_u32(&mut r)?;
            let _block_count = read_u32(&mut r)?;
            let mut rest = [0u8; 10]; // unk7(2) unk8(2) unk9(4) unk10(2)
            r.read_exact(&mut rest)?;
            let mut unk11_namelen = [0u8; 2];
            r.read_exact(&mut unk11_namelen)?;
            (heading_count, unk11_namelen[1] as u32)
        }
        4 => {
            let mut leading = [0u8; 10]; // unk0(4) unk1(4) unk3(2)
            r.read_exact(&mut leading)?;
            let _unk4 = read_u32(&mut r)?;
            let heading_count = read_u32(&mut r)?;
            let _block_count = read_u32(&mut r)?;
            let mut rest = [0u8; 10];
            r.read_exact(&mut rest)?;
            let mut unk11_namelen = [0u8; 2];
            r.read_exact(&mut unk11_namelen)?;
            (heading_count, unk11_namelen[1] as u32)
        }
        5 | 6 => {
            let mut leading = [0u8; 14]; // unk0(4) unk1(4) unk2(4) unk3(2)
            r.read_exact(&mut leading)?;
            let _unk4 = read_u32(&mut r)?;
            let heading_count = read_u32(&mut r)?;
            let _block_count = read_u32(&mut r)?;
            let mut rest = [0u8; 10];
            r.read_exact(&mut rest)?;
            let mut unk11_namelen = [0u8; 2];
            r.read_exact(&mut unk11_namelen)?;
            (heading_count, unk11_namelen[1] as u32)
        }
        other => return Err(Error::parse(format!("unsupported .hic version {other}"))),
    };

    if name_len > 0 {
        let mut name = vec![0u8; (name_len - 1) as usize];
        r.read_exact(&mut name)?;
    }
    r.read_exact(&mut skip)?; // name field's trailing reserved byte

    let root_offset = r.stream_position()? as u32;
    let mut queue = vec![root_offset];
    let mut visited = HashSet::new();
    let mut leaves = Vec::new();

    while let Some(offset) = queue.pop() {
        if !visited.insert(offset) {
            continue;
        }
        r.seek(SeekFrom::Start(offset as u64))?;
        let node_size = read_u16(&mut r)?;

        let mut count_byte = [0u8; 1];
        r.read_exact(&mut count_byte)?;
        let count = count_byte[0];
        if version == 6 && count == 0 {
            return Err(Error::parse(".hic node page has zero entries"));
        }

        let mut nodes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let raw = read_u32(&mut r)?;
            if version == 6 {
                r.read_exact(&mut skip)?; // type byte folded into the leaf case below
                let entry_type = skip[0];
                if raw & 1 == 0 {
                    nodes.push(HicNode::Leaf { text_offset: (raw >> 1).wrapping_sub(1), entry_type: entry_type >> 4 });
                } else {
                    read_u32(&mut r)?; // delta, used by the original for binary search; unused here
                    nodes.push(HicNode::Child { hic_offset: raw >> 1 });
                }
            } else if raw & 1 == 0 {
                nodes.push(HicNode::Leaf { text_offset: (raw >> 5).wrapping_sub(1), entry_type: ((raw >> 1) & 0xF) as u8 });
            } else {
                read_u32(&mut r)?; // delta
                nodes.push(HicNode::Child { hic_offset: raw >> 9 });
            }
        }

        let raw_text: Vec<Vec<u8>> = (0..count).map(|_| read_cstring(&mut r)).collect::<Result<_>>()?;
        let decoded = decode_heading_prefixes(&raw_text);

        for (node, text) in nodes.iter().zip(decoded.iter()) {
            match node {
                HicNode::Leaf { text_offset, entry_type } => {
                    leaves.push(HicHeading {
                        text: duden_to_utf8(text)?,
                        entry_type: *entry_type,
                        text_offset: *text_offset,
                    });
                }
                HicNode::Child { hic_offset } => queue.push(*hic_offset),
            }
        }

        r.seek(SeekFrom::Start(offset as u64 + node_size as u64 + 2))?;
    }

    Ok((HicHeader { version, heading_count }, leaves))
}

// ---------------------------------------------------------------- .fsi ----

lazy_static! {
    static ref FSI_STRING: Regex = Regex::new(r"^(?P<name>.+?);(?P<size>\d+)$").unwrap();
}

#[derive(Debug, Clone)]
pub struct FsiEntry {
    pub name: String,
    pub size: u32,
    pub offset: u32,
}

/// Parse a `.fsi` resource directory: a fixed 0x12-byte preamble, then
/// `blockCount` 0x400-byte-aligned blocks, each either a directory block
/// (`type == 0xC`, holding `name;size` entries) or an empty block
/// (`type == 0xB`).
pub fn parse_fsi<R: Read + Seek>(mut r: R) -> Result<Vec<FsiEntry>> {
    r.seek(SeekFrom::Start(0x12))?;
    let block_count = read_u16(&mut r)?;

    let mut entries = Vec::new();
    for i in 1..=block_count {
        r.seek(SeekFrom::Start(i as u64 * 0x400))?;
        let block_type = read_u16(&mut r)?;
        if block_type != 0xC && block_type != 0xB {
            return Err(Error::parse(format!("unrecognised .fsi block type {block_type:#x}")));
        }
        read_u32(&mut r)?; // reserved
        let raw_count = read_u16(&mut r)?;
        if block_type == 0xB {
            continue;
        }
        let mut skip7 = [0u8; 7];
        r.read_exact(&mut skip7)?;

        for _ in 0..(raw_count as usize * 2) {
            let mut peek = [0u8; 4];
            r.read_exact(&mut peek)?;
            if peek == [0xA1, 0xA1, 0xA1, 0xA1] {
                break;
            }
            let offset = u32::from_le_bytes(peek);
            let (_last, s) = parse_fsi_string(&mut r)?;
            if let Some(caps) = FSI_STRING.captures(&s) {
                entries.push(FsiEntry {
                    name: caps["name"].to_string(),
                    size: caps["size"].parse().unwrap_or(0),
                    offset,
                });
            }
        }
    }
    Ok(entries)
}

fn parse_fsi_string<R: Read>(r: &mut R) -> Result<(bool, String)> {
    let mut bytes = Vec::new();
    let mut one = [0u8; 1];
    loop {
        r.read_exact(&mut one)?;
        if one[0] == 0xA1 || one[0] == 0x00 {
            break;
        }
        bytes.push(one[0]);
    }
    Ok((one[0] == 0xA1, duden_to_utf8(&bytes)?))
}

// ----------------------------------------------------------------- .ld ----

lazy_static! {
    static ref LD_RANGE: Regex = Regex::new(r"^.(.*?)\|(.*?)\|(.*?);(\d+);(\d+)$").unwrap();
    static ref LD_DIRECT: Regex = Regex::new(r"^D(.+?) (\d+) (\d+).*$").unwrap();
}

/// One `.ld` table entry: either a named reference definition (`G`/`g`
/// lines) or a direct heading-range -> article-offset mapping (`D` lines).
#[derive(Debug, Clone)]
pub enum LdEntry {
    Reference { kind: String, name: String, code: String },
    Range(LdRange),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdRange {
    /// The resource file this range of offsets belongs to (`D` line's name
    /// field) -- e.g. the `.bof` sibling holding inlined table/picture text.
    pub file_name: String,
    pub first: u32,
    pub last: u32,
    pub offset: u32,
}

impl LdRange {
    pub fn contains(&self, heading_index: u32) -> bool {
        heading_index >= self.first && heading_index <= self.last
    }
}

#[derive(Debug, Clone, Default)]
pub struct LdFile {
    pub references: Vec<LdEntry>,
    pub ranges: Vec<LdRange>,
}

/// Parse a `.ld` table. `G`/`g` lines declare a named reference kind
/// (`kind|name|code`, with a single throwaway character right after the
/// tag eaten by the regex); `D` lines map a heading range to an article
/// offset. A `Web` reference is always implicitly present, matching every
/// dictionary regardless of whether its `.ld` declares one.
pub fn parse_ld(text: &str) -> Result<LdFile> {
    let mut references = vec![LdEntry::Reference { kind: "WEB".into(), name: "Web".into(), code: "W".into() }];
    let mut ranges = Vec::new();

    for line in text.lines() {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            continue;
        }
        match line.as_bytes()[0] {
            b'G' | b'g' => {
                let caps = LD_RANGE
                    .captures(line)
                    .ok_or_else(|| Error::parse(format!("malformed .ld reference line: {line}")))?;
                references.push(LdEntry::Reference {
                    kind: caps[1].to_string(),
                    name: caps[2].to_string(),
                    code: caps[3].to_string(),
                });
            }
            b'D' => {
                let caps = LD_DIRECT
                    .captures(line)
                    .ok_or_else(|| Error::parse(format!("malformed .ld range line: {line}")))?;
                let first: u32 = caps[2].parse().unwrap();
                let count: u32 = caps[3].parse().unwrap();
                ranges.push(LdRange {
                    file_name: caps[1].to_string(),
                    first,
                    last: first + count.saturating_sub(1),
                    offset: first,
                });
            }
            _ => {}
        }
    }

    Ok(LdFile { references, ranges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_inf_groups_and_resources() {
        let text = "V1\nTMy Dict\nFdict.hic;dict.bof;dict.idx\nFpics.bof;pics.idx;pics.fsi\n";
        let inf = parse_inf(text).unwrap();
        assert_eq!(inf.version.as_deref(), Some("1"));
        assert_eq!(inf.dictionaries.len(), 1);
        let d = &inf.dictionaries[0];
        assert_eq!(d.hic_name, "dict.hic");
        assert_eq!(d.bof_name, "dict.bof");
        assert_eq!(d.idx_name, "dict.idx");
        assert_eq!(d.resources.len(), 1);
        assert_eq!(d.resources[0].bof_name, "pics.bof");
        assert_eq!(d.resources[0].idx_name, "pics.idx");
        assert_eq!(d.resources[0].fsi_name.as_deref(), Some("pics.fsi"));
    }

    #[test]
    fn decodes_prefix_compressed_headings() {
        let entries = vec![b"\x00apple".to_vec(), b"\x03ricot".to_vec()];
        let decoded = decode_heading_prefixes(&entries);
        assert_eq!(decoded[0], b"apple");
        assert_eq!(decoded[1], b"appricot");
    }

    #[test]
    fn parses_hic_single_leaf_page() {
        let mut data = Vec::new();
        data.extend_from_slice(HIC_MAGIC);
        data.push(0); // reserved
        data.push(4); // version
        // Hic4Header: unk0, unk1, unk3, unk4, headingCount, blockCount,
        // unk7, unk8, unk9, unk10, unk11, namelen.
        data.extend_from_slice(&0u32.to_le_bytes()); // unk0
        data.extend_from_slice(&0u32.to_le_bytes()); // unk1
        data.extend_from_slice(&0u16.to_le_bytes()); // unk3
        data.extend_from_slice(&0u32.to_le_bytes()); // unk4
        data.extend_from_slice(&1u32.to_le_bytes()); // heading_count
        data.extend_from_slice(&1u32.to_le_bytes()); // block_count
        data.extend_from_slice(&0u16.to_le_bytes()); // unk7
        data.extend_from_slice(&0u16.to_le_bytes()); // unk8
        data.extend_from_slice(&0u32.to_le_bytes()); // unk9
        data.extend_from_slice(&0u16.to_le_bytes()); // unk10
        data.push(0); // unk11
        data.push(2); // namelen
        data.push(b'x'); // name body (name_len - 1 == 1 byte)
        data.push(0); // reserved

        let node_start = data.len();
        let mut node = Vec::new();
        node.push(1u8); // count
        let raw: u32 = (0u32 << 1) | 0; // leaf, text_offset bits = 0 -> (0>>1)-1 wraps
        node.extend_from_slice(&raw.to_le_bytes());
        node.extend_from_slice(b"apple\0");
        let node_size = node.len() as u16;
        data.extend_from_slice(&node_size.to_le_bytes());
        data.extend_from_slice(&node);

        let (header, leaves) = parse_hic(Cursor::new(data)).unwrap();
        assert_eq!(header.version, 4);
        assert_eq!(header.heading_count, 1);
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].text, "apple");
        let _ = node_start;
    }

    #[test]
    fn parses_ld_ranges_and_references() {
        let text = "G.type|Tabellen|T\nD0 5 3 0\nD1 10 2 0\n";
        let ld = parse_ld(text).unwrap();
        assert!(ld.ranges[0].contains(7));
        assert_eq!(ld.ranges[0].file_name, "0");
        assert_eq!(ld.ranges[0].first, 5);
        assert_eq!(ld.ranges[0].last, 7);
        assert!(matches!(&ld.references[0], LdEntry::Reference { name, .. } if name == "Web"));
        assert!(matches!(&ld.references[1], LdEntry::Reference { name, .. } if name == "Tabellen"));
    }

    #[test]
    fn rejects_malformed_ld_range_line() {
        assert!(parse_ld("Dnotvalid").is_err());
    }
}
