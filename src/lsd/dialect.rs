//! C3: the three LSD dialect decoders (User, System, Abbreviation). All
//! three share the `DialectDecoder` contract; they differ in how the
//! article-symbol alphabet maps to literal/copy codes and in whether their
//! state is loaded through an XOR-descrambled view of the stream.

use crate::bitstream::{bit_length, BitRead};
use crate::error::{Error, Result};
use crate::huffman::LenTable;

/// u16 code units, matching the reference's `char16_t` strings -- headings
/// and article bodies are not guaranteed to be valid UTF-16 on their own
/// (surrogate halves can appear mid-copy), so we keep them as raw units
/// until final DSL rendering.
pub type WString = Vec<u16>;

pub fn to_display_string(units: &[u16]) -> String {
    char::decode_utf16(units.iter().copied())
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

pub fn read_unicode_string(bstr: &mut dyn BitRead, len: usize, big_endian: bool) -> Result<WString> {
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        let mut b = [0u8; 2];
        if bstr.read_some(&mut b)? != 2 {
            return Err(Error::decode("unexpected EOF reading unicode string"));
        }
        let ch = if big_endian { u16::from_be_bytes(b) } else { u16::from_le_bytes(b) };
        out.push(ch);
    }
    Ok(out)
}

/// Read the `(len(u32), bits_per_symbol(u8), len x symbol)` alphabet table
/// shared by all three dialects.
fn read_symbols(bstr: &mut dyn BitRead) -> Result<Vec<u32>> {
    let len = bstr.read_bits(32)? as usize;
    let bits_per_symbol = bstr.read_bits(8)?;
    let mut res = Vec::with_capacity(len);
    for _ in 0..len {
        res.push(bstr.read_bits(bits_per_symbol)?);
    }
    Ok(res)
}

/// Shared compact reference-code encoding (§4.3): 2 control bits; `3` means
/// a raw `u32` follows, otherwise the value is packed into `bit_length(huffman_number) - 2`
/// extra bits.
fn read_reference(bstr: &mut dyn BitRead, huffman_number: u32) -> Result<u32> {
    let code = bstr.read_bits(2)?;
    if code == 3 {
        return bstr.read_bits(32);
    }
    let bitlen = bit_length(huffman_number);
    if bitlen < 2 {
        return Err(Error::decode("reference huffman number too small"));
    }
    let rest = bstr.read_bits(bitlen - 2)?;
    Ok((code << (bitlen - 2)) | rest)
}

pub trait DialectDecoder {
    fn read(&mut self, bstr: &mut dyn BitRead) -> Result<()>;
    fn decode_heading(&self, bstr: &mut dyn BitRead, n: usize) -> Result<WString>;
    fn decode_article(&self, bstr: &mut dyn BitRead) -> Result<WString>;
    fn decode_prefix_len(&self, bstr: &mut dyn BitRead) -> Result<u32>;
    fn decode_postfix_len(&self, bstr: &mut dyn BitRead) -> Result<u32>;
    fn read_reference1(&self, bstr: &mut dyn BitRead) -> Result<u32>;
    fn read_reference2(&self, bstr: &mut dyn BitRead) -> Result<u32>;
    fn prefix(&self) -> &[u16];
}

/// Common state shared by User and Abbreviation dialects (they differ only
/// in how the prefix/alphabets are loaded and in the copy-code layout, which
/// happen to be identical between User and Abbreviation once loaded).
struct CommonState {
    prefix: WString,
    article_symbols: Vec<u32>,
    heading_symbols: Vec<u32>,
    lt_articles: LenTable,
    lt_headings: LenTable,
    lt_prefix_lengths: LenTable,
    lt_postfix_lengths: LenTable,
    huffman1_number: u32,
    huffman2_number: u32,
}

impl CommonState {
    fn empty() -> Self {
        // Populated by `read`; these placeholders are never decoded from.
        Self {
            prefix: Vec::new(),
            article_symbols: Vec::new(),
            heading_symbols: Vec::new(),
            lt_articles: LenTable::empty(),
            lt_headings: LenTable::empty(),
            lt_prefix_lengths: LenTable::empty(),
            lt_postfix_lengths: LenTable::empty(),
            huffman1_number: 0,
            huffman2_number: 0,
        }
    }

    fn decode_heading(&self, bstr: &mut dyn BitRead, n: usize) -> Result<WString> {
        let mut res = Vec::with_capacity(n);
        for _ in 0..n {
            let (_, symidx) = self.lt_headings.decode(bstr)?;
            let sym = *self.heading_symbols.get(symidx as usize)
                .ok_or_else(|| Error::decode("heading symbol index out of range"))?;
            if sym > 0xffff {
                return Err(Error::decode("heading alphabet symbol exceeds 0xFFFF"));
            }
            res.push(sym as u16);
        }
        Ok(res)
    }

    fn decode_prefix_len(&self, bstr: &mut dyn BitRead) -> Result<u32> {
        let (_, symidx) = self.lt_prefix_lengths.decode(bstr)?;
        Ok(symidx)
    }

    fn decode_postfix_len(&self, bstr: &mut dyn BitRead) -> Result<u32> {
        let (_, symidx) = self.lt_postfix_lengths.decode(bstr)?;
        Ok(symidx)
    }

    fn read_reference1(&self, bstr: &mut dyn BitRead) -> Result<u32> {
        read_reference(bstr, self.huffman1_number)
    }

    fn read_reference2(&self, bstr: &mut dyn BitRead) -> Result<u32> {
        read_reference(bstr, self.huffman2_number)
    }
}

/// Article-body decode shared between User and Abbreviation: alphabet
/// symbols < 0x10000 are literal code points; [0x10000, 0x10040) copy from
/// the prefix string; >= 0x10040 copy from the output decoded so far.
fn decode_article_user_style(
    bstr: &mut dyn BitRead,
    prefix: &[u16],
    lt_articles: &LenTable,
    article_symbols: &[u32],
) -> Result<WString> {
    let mut len = bstr.read_bits(16)?;
    if len == 0xFFFF {
        len = bstr.read_bits(32)?;
    }
    let mut res: WString = Vec::with_capacity(len as usize);
    while (res.len() as u32) < len {
        let (_, symidx) = lt_articles.decode(bstr)?;
        let sym = *article_symbols.get(symidx as usize)
            .ok_or_else(|| Error::decode("article symbol index out of range"))?;
        if sym >= 0x10000 {
            if sym >= 0x10040 {
                let start = bstr.read_bits(bit_length(len))? as usize;
                let copy_len = (sym - 0x1003d) as usize;
                copy_from_self(&mut res, start, copy_len)?;
            } else {
                let start = bstr.read_bits(bit_length(prefix.len() as u32))? as usize;
                let copy_len = (sym - 0xfffd) as usize;
                copy_from_slice_into(&mut res, prefix, start, copy_len)?;
            }
        } else {
            res.push(sym as u16);
        }
    }
    Ok(res)
}

fn copy_from_slice_into(dst: &mut WString, src: &[u16], start: usize, len: usize) -> Result<()> {
    let end = start.checked_add(len).ok_or_else(|| Error::decode("copy range overflow"))?;
    let slice = src.get(start..end).ok_or_else(|| Error::decode("copy range out of bounds"))?;
    dst.extend_from_slice(slice);
    Ok(())
}

fn copy_from_self(dst: &mut WString, start: usize, len: usize) -> Result<()> {
    let end = start.checked_add(len).ok_or_else(|| Error::decode("copy range overflow"))?;
    if end > dst.len() {
        return Err(Error::decode("self-copy range out of bounds"));
    }
    for i in start..end {
        let c = dst[i];
        dst.push(c);
    }
    Ok(())
}

/// User dialect: the vanilla LSD layout. `legacy` marks the early
/// 0x110001/0x120001/0x131001 sub-versions, which load identically to the
/// regular User dialect (the distinction only matters to the dispatch
/// table, §6); it is kept here so callers can record which family produced
/// a dictionary.
pub struct UserDecoder {
    state: CommonState,
    pub legacy: bool,
}

impl UserDecoder {
    pub fn new(legacy: bool) -> Self {
        Self { state: CommonState::empty(), legacy }
    }
}

impl DialectDecoder for UserDecoder {
    fn read(&mut self, bstr: &mut dyn BitRead) -> Result<()> {
        let len = bstr.read_bits(32)? as usize;
        self.state.prefix = read_unicode_string(bstr, len, true)?;
        self.state.article_symbols = read_symbols(bstr)?;
        self.state.heading_symbols = read_symbols(bstr)?;
        self.state.lt_articles = LenTable::read(bstr)?;
        self.state.lt_headings = LenTable::read(bstr)?;
        self.state.lt_prefix_lengths = LenTable::read(bstr)?;
        self.state.lt_postfix_lengths = LenTable::read(bstr)?;
        self.state.huffman1_number = bstr.read_bits(32)?;
        self.state.huffman2_number = bstr.read_bits(32)?;
        Ok(())
    }
    fn decode_heading(&self, bstr: &mut dyn BitRead, n: usize) -> Result<WString> {
        self.state.decode_heading(bstr, n)
    }
    fn decode_article(&self, bstr: &mut dyn BitRead) -> Result<WString> {
        decode_article_user_style(bstr, &self.state.prefix, &self.state.lt_articles, &self.state.article_symbols)
    }
    fn decode_prefix_len(&self, bstr: &mut dyn BitRead) -> Result<u32> {
        self.state.decode_prefix_len(bstr)
    }
    fn decode_postfix_len(&self, bstr: &mut dyn BitRead) -> Result<u32> {
        self.state.decode_postfix_len(bstr)
    }
    fn read_reference1(&self, bstr: &mut dyn BitRead) -> Result<u32> {
        self.state.read_reference1(bstr)
    }
    fn read_reference2(&self, bstr: &mut dyn BitRead) -> Result<u32> {
        self.state.read_reference2(bstr)
    }
    fn prefix(&self) -> &[u16] {
        &self.state.prefix
    }
}

/// Abbreviation dialect: loads exactly like User, but the prefix string and
/// both alphabets are XORed with constants at load time (0x879A per
/// codepoint for the prefix, 0x1325 per symbol for the alphabets). Once
/// loaded, article decoding proceeds exactly as User.
pub struct AbbreviationDecoder {
    state: CommonState,
}

impl AbbreviationDecoder {
    pub fn new() -> Self {
        Self { state: CommonState::empty() }
    }
}

impl Default for AbbreviationDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectDecoder for AbbreviationDecoder {
    fn read(&mut self, bstr: &mut dyn BitRead) -> Result<()> {
        let len = bstr.read_bits(32)? as usize;
        let mut prefix = Vec::with_capacity(len);
        for _ in 0..len {
            let sym = bstr.read_bits(16)? ^ 0x879A;
            prefix.push(sym as u16);
        }
        self.state.prefix = prefix;
        self.state.article_symbols = read_xored_symbols(bstr)?;
        self.state.heading_symbols = read_xored_symbols(bstr)?;
        self.state.lt_articles = LenTable::read(bstr)?;
        self.state.lt_headings = LenTable::read(bstr)?;
        self.state.lt_prefix_lengths = LenTable::read(bstr)?;
        self.state.lt_postfix_lengths = LenTable::read(bstr)?;
        self.state.huffman1_number = bstr.read_bits(32)?;
        self.state.huffman2_number = bstr.read_bits(32)?;
        Ok(())
    }
    fn decode_heading(&self, bstr: &mut dyn BitRead, n: usize) -> Result<WString> {
        self.state.decode_heading(bstr, n)
    }
    fn decode_article(&self, bstr: &mut dyn BitRead) -> Result<WString> {
        decode_article_user_style(bstr, &self.state.prefix, &self.state.lt_articles, &self.state.article_symbols)
    }
    fn decode_prefix_len(&self, bstr: &mut dyn BitRead) -> Result<u32> {
        self.state.decode_prefix_len(bstr)
    }
    fn decode_postfix_len(&self, bstr: &mut dyn BitRead) -> Result<u32> {
        self.state.decode_postfix_len(bstr)
    }
    fn read_reference1(&self, bstr: &mut dyn BitRead) -> Result<u32> {
        self.state.read_reference1(bstr)
    }
    fn read_reference2(&self, bstr: &mut dyn BitRead) -> Result<u32> {
        self.state.read_reference2(bstr)
    }
    fn prefix(&self) -> &[u16] {
        &self.state.prefix
    }
}

fn read_xored_symbols(bstr: &mut dyn BitRead) -> Result<Vec<u32>> {
    let len = bstr.read_bits(32)? as usize;
    let bits_per_symbol = bstr.read_bits(8)?;
    let mut res = Vec::with_capacity(len);
    for _ in 0..len {
        res.push(bstr.read_bits(bits_per_symbol)? ^ 0x1325);
    }
    Ok(res)
}

/// System dialect. `xoring` selects whether `read` and `decode_article` run
/// through an `XoringSource`-wrapped view of the stream (true for
/// 0x151005-family dictionaries, false for 0x141004).
pub struct SystemDecoder {
    state: CommonState,
    xoring: bool,
}

impl SystemDecoder {
    pub fn new(xoring: bool) -> Self {
        Self { state: CommonState::empty(), xoring }
    }
}

/// Tracks the evolving XOR key across a run of byte reads, independent of
/// `bit_pos` bookkeeping -- the System dialect only ever xors whole-byte
/// fields at a byte boundary, so this plain key tracker (rather than
/// wrapping the stream in a `ByteSource` adapter, which `dyn BitRead` is
/// not) is all that is needed.
struct XorKey(u8);

impl XorKey {
    fn new() -> Self {
        XorKey(0x7f)
    }

    fn unxor_bytes(&mut self, buf: &mut [u8]) {
        for slot in buf.iter_mut() {
            let raw = *slot;
            *slot = raw ^ self.0;
            self.0 = crate::bitstream::XOR_PAD[raw as usize];
        }
    }
}

fn xored_read_bits(bstr: &mut dyn BitRead, key: &mut XorKey, count: u32) -> Result<u32> {
    debug_assert_eq!(count % 8, 0);
    let mut buf = vec![0u8; (count / 8) as usize];
    if bstr.read_some(&mut buf)? != buf.len() {
        return Err(Error::decode("unexpected EOF in xored field"));
    }
    key.unxor_bytes(&mut buf);
    let mut v: u32 = 0;
    for b in &buf {
        v = (v << 8) | (*b as u32);
    }
    Ok(v)
}

impl SystemDecoder {
    fn read_plain(&mut self, bstr: &mut dyn BitRead) -> Result<()> {
        self.read_common(bstr, None)
    }

    fn read_xored(&mut self, bstr: &mut dyn BitRead) -> Result<()> {
        let mut key = XorKey::new();
        self.read_common(bstr, Some(&mut key))
    }

    /// Field order (verbatim from `SystemDictionaryDecoder::Read`, which
    /// differs from User/Abbreviation): prefix string, both alphabets, the
    /// two symbol tables, then **postfix** lengths, a skipped `u32`, then
    /// **prefix** lengths, then the two huffman numbers.
    fn read_common(&mut self, bstr: &mut dyn BitRead, mut key: Option<&mut XorKey>) -> Result<()> {
        let len = read_u32_maybe_xored(bstr, &mut key)? as usize;
        let mut prefix = Vec::with_capacity(len);
        for _ in 0..len {
            let sym = read_u16_maybe_xored(bstr, &mut key)?;
            prefix.push(sym);
        }
        self.state.prefix = prefix;
        self.state.article_symbols = read_symbols_maybe_xored(bstr, &mut key)?;
        self.state.heading_symbols = read_symbols_maybe_xored(bstr, &mut key)?;
        self.state.lt_postfix_lengths = LenTable::read(bstr)?;
        let _skipped = bstr.read_bits(32)?;
        self.state.lt_prefix_lengths = LenTable::read(bstr)?;
        self.state.lt_articles = LenTable::read(bstr)?;
        self.state.lt_headings = LenTable::read(bstr)?;
        self.state.huffman1_number = bstr.read_bits(32)?;
        self.state.huffman2_number = bstr.read_bits(32)?;
        Ok(())
    }

    fn decode_article_plain(&self, bstr: &mut dyn BitRead) -> Result<WString> {
        self.decode_article_common(bstr, None)
    }

    fn decode_article_xored(&self, bstr: &mut dyn BitRead) -> Result<WString> {
        let mut key = XorKey::new();
        self.decode_article_common(bstr, Some(&mut key))
    }

    /// System's copy/literal dispatch is `(sym - 0x80) >= 0x10000` in the
    /// reference, which is true both when `sym < 0x80` (unsigned underflow)
    /// and when `sym >= 0x10080` -- i.e. the literal range is the single
    /// window `[0x80, 0x10080)`, not "everything >= 0x80". Within the copy
    /// branch: `sym <= 0x3F` copies from the prefix (length `sym + 3`),
    /// else it copies from the output decoded so far (length `sym - 0x3D`).
    fn decode_article_common(&self, bstr: &mut dyn BitRead, mut key: Option<&mut XorKey>) -> Result<WString> {
        let mut len = read_u16_maybe_xored(bstr, &mut key)? as u32;
        if len == 0xFFFF {
            len = read_u32_maybe_xored(bstr, &mut key)?;
        }
        let mut res: WString = Vec::with_capacity(len as usize);
        while (res.len() as u32) < len {
            let (_, symidx) = self.state.lt_articles.decode(bstr)?;
            let sym = *self.state.article_symbols.get(symidx as usize)
                .ok_or_else(|| Error::decode("article symbol index out of range"))?;
            let copy_branch = sym < 0x80 || sym >= 0x10080;
            if copy_branch {
                if sym <= 0x3F {
                    let copy_len = (sym + 3) as usize;
                    let start = bstr.read_bits(bit_length(self.state.prefix.len() as u32))? as usize;
                    copy_from_slice_into(&mut res, &self.state.prefix, start, copy_len)?;
                } else {
                    let copy_len = (sym - 0x3D) as usize;
                    let start = bstr.read_bits(bit_length(len))? as usize;
                    copy_from_self(&mut res, start, copy_len)?;
                }
            } else {
                res.push((sym - 0x80) as u16);
            }
        }
        Ok(res)
    }
}

fn read_u32_maybe_xored(bstr: &mut dyn BitRead, key: &mut Option<&mut XorKey>) -> Result<u32> {
    match key {
        Some(k) => xored_read_bits(bstr, k, 32),
        None => bstr.read_bits(32),
    }
}

fn read_u16_maybe_xored(bstr: &mut dyn BitRead, key: &mut Option<&mut XorKey>) -> Result<u16> {
    let v = match key {
        Some(k) => xored_read_bits(bstr, k, 16)?,
        None => bstr.read_bits(16)?,
    };
    Ok(v as u16)
}

fn read_symbols_maybe_xored(bstr: &mut dyn BitRead, key: &mut Option<&mut XorKey>) -> Result<Vec<u32>> {
    let len = read_u32_maybe_xored(bstr, key)? as usize;
    let bits_per_symbol = match key {
        Some(k) => xored_read_bits(bstr, k, 8)?,
        None => bstr.read_bits(8)?,
    };
    let mut res = Vec::with_capacity(len);
    for _ in 0..len {
        let sym = match key {
            Some(k) => xored_read_bits(bstr, k, ((bits_per_symbol + 7) / 8) * 8)?,
            None => bstr.read_bits(bits_per_symbol)?,
        };
        res.push(sym);
    }
    Ok(res)
}

impl DialectDecoder for SystemDecoder {
    fn read(&mut self, bstr: &mut dyn BitRead) -> Result<()> {
        if self.xoring {
            self.read_xored(bstr)
        } else {
            self.read_plain(bstr)
        }
    }
    fn decode_heading(&self, bstr: &mut dyn BitRead, n: usize) -> Result<WString> {
        self.state.decode_heading(bstr, n)
    }
    fn decode_article(&self, bstr: &mut dyn BitRead) -> Result<WString> {
        if self.xoring {
            self.decode_article_xored(bstr)
        } else {
            self.decode_article_plain(bstr)
        }
    }
    fn decode_prefix_len(&self, bstr: &mut dyn BitRead) -> Result<u32> {
        self.state.decode_prefix_len(bstr)
    }
    fn decode_postfix_len(&self, bstr: &mut dyn BitRead) -> Result<u32> {
        self.state.decode_postfix_len(bstr)
    }
    fn read_reference1(&self, bstr: &mut dyn BitRead) -> Result<u32> {
        self.state.read_reference1(bstr)
    }
    fn read_reference2(&self, bstr: &mut dyn BitRead) -> Result<u32> {
        self.state.read_reference2(bstr)
    }
    fn prefix(&self) -> &[u16] {
        &self.state.prefix
    }
}
