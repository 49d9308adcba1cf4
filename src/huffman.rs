//! Canonical Huffman length table, built the way the reference decoder
//! builds it -- not via canonical-code derivation, but by placing each
//! symbol at the first free leaf slot found by depth-first search (left
//! before right) at its declared depth. This is correctness-equivalent to
//! the textbook canonical construction, and is what `LenTable::placeSymidx`
//! in the reference actually does.

use crate::bitstream::{bit_length, BitRead, BitReadExt};
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug)]
struct Node {
    left: i32,
    right: i32,
    parent: i32,
}

/// A canonical Huffman tree decoding to symbol indices (not raw symbols --
/// callers look the index up in their own alphabet).
pub struct LenTable {
    nodes: Vec<Node>,
    next_free: usize,
}

impl LenTable {
    /// An empty table with no placed symbols, used as a placeholder before
    /// a dialect decoder's `read` populates its four tables.
    pub fn empty() -> Self {
        LenTable { nodes: Vec::new(), next_free: 0 }
    }

    /// Read the wire encoding: `count(u32), bits_per_len(u8)`, then `count`
    /// pairs of `(symbol_index: ceil(log2(count)) bits, length: bits_per_len bits)`.
    pub fn read(bitstr: &mut dyn BitRead) -> Result<Self> {
        let count = bitstr.read_bits(32)? as usize;
        let bits_per_len = bitstr.read_bits(8)?;
        if count == 0 {
            return Err(Error::decode("huffman length table with zero symbols"));
        }
        let idx_bits = bit_length(count as u32);

        let mut nodes = vec![Node { left: 0, right: 0, parent: -1 }; count - 1];
        let root_idx = nodes.len() - 1;
        let mut table = LenTable { nodes, next_free: 0 };

        for _ in 0..count {
            let symidx = bitstr.read_bits(idx_bits)? as i32;
            let len = bitstr.read_bits(bits_per_len)?;
            if len == 0 {
                return Err(Error::decode("huffman symbol with zero code length"));
            }
            table.place_symidx(symidx, root_idx, len)?;
        }
        Ok(table)
    }

    /// Place `symidx` at depth `len` below `node_idx`, preferring the left
    /// branch, creating intermediate nodes on demand. Returns whether a free
    /// slot was found (over-subscribed tables simply leave later symbols
    /// unplaced at that branch and retry the other side, matching the
    /// reference's silent tolerance of odd tables).
    fn place_symidx(&mut self, symidx: i32, node_idx: usize, len: u32) -> Result<bool> {
        if len == 1 {
            if self.nodes[node_idx].left == 0 {
                self.nodes[node_idx].left = -1 - symidx;
                return Ok(true);
            }
            if self.nodes[node_idx].right == 0 {
                self.nodes[node_idx].right = -1 - symidx;
                return Ok(true);
            }
            return Ok(false);
        }
        if self.nodes[node_idx].left == 0 {
            self.spawn_child(node_idx, true)?;
        }
        if self.nodes[node_idx].left > 0 {
            let child = (self.nodes[node_idx].left - 1) as usize;
            if self.place_symidx(symidx, child, len - 1)? {
                return Ok(true);
            }
        }
        if self.nodes[node_idx].right == 0 {
            self.spawn_child(node_idx, false)?;
        }
        if self.nodes[node_idx].right > 0 {
            let child = (self.nodes[node_idx].right - 1) as usize;
            if self.place_symidx(symidx, child, len - 1)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn spawn_child(&mut self, parent_idx: usize, left: bool) -> Result<()> {
        if self.next_free >= self.nodes.len() {
            return Err(Error::decode("huffman length table overflowed its node pool"));
        }
        let new_idx = self.next_free;
        self.nodes[new_idx] = Node { left: 0, right: 0, parent: parent_idx as i32 };
        self.next_free += 1;
        if left {
            self.nodes[parent_idx].left = new_idx as i32 + 1;
        } else {
            self.nodes[parent_idx].right = new_idx as i32 + 1;
        }
        Ok(())
    }

    /// Walk the tree bit by bit (0 = left, 1 = right) until a leaf (negative
    /// child) is reached. Returns `(code_length, symbol_index)`.
    pub fn decode(&self, bitstr: &mut dyn BitRead) -> Result<(u32, u32)> {
        let mut node_idx = self.nodes.len() - 1;
        let mut len = 0u32;
        loop {
            len += 1;
            let bit = bitstr.read_bits(1)?;
            let child = if bit == 1 { self.nodes[node_idx].right } else { self.nodes[node_idx].left };
            if child < 0 {
                return Ok((len, (-1 - child) as u32));
            }
            if child == 0 {
                return Err(Error::decode("huffman code walked into an unplaced leaf"));
            }
            node_idx = (child - 1) as usize;
        }
    }

    /// Maximum depth of any placed symbol.
    pub fn max_len(&self) -> u32 {
        let mut max = 0u32;
        for node in &self.nodes {
            for child in [node.left, node.right] {
                if child < 0 {
                    let mut depth = 1u32;
                    let mut p = node.parent;
                    while p >= 0 {
                        depth += 1;
                        p = self.nodes[p as usize].parent;
                    }
                    max = max.max(depth);
                }
            }
        }
        max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::BitReader;
    use std::io::Cursor;

    /// Encodes a length table the same way `LenTable::read` expects, then
    /// checks that every symbol decodes back via its assigned code.
    fn build_table(pairs: &[(u32, u32)]) -> (Vec<u8>, u32) {
        let count = pairs.len() as u32;
        let bits_per_len = pairs.iter().map(|(_, l)| *l).max().unwrap_or(1).max(1) + 1;
        let idx_bits = bit_length(count);
        let mut bits: Vec<bool> = Vec::new();
        let push_bits = |bits: &mut Vec<bool>, mut v: u32, n: u32| {
            let mut tmp = Vec::new();
            for _ in 0..n {
                tmp.push((v & 1) == 1);
                v >>= 1;
            }
            tmp.reverse();
            bits.extend(tmp);
        };
        push_bits(&mut bits, count, 32);
        push_bits(&mut bits, bits_per_len, 8);
        for (idx, len) in pairs {
            push_bits(&mut bits, *idx, idx_bits);
            push_bits(&mut bits, *len, bits_per_len);
        }
        while bits.len() % 8 != 0 {
            bits.push(false);
        }
        let mut bytes = Vec::new();
        for chunk in bits.chunks(8) {
            let mut b = 0u8;
            for bit in chunk {
                b = (b << 1) | (*bit as u8);
            }
            bytes.push(b);
        }
        (bytes, idx_bits)
    }

    #[test]
    fn three_symbol_table_round_trips() {
        // lengths: A=1, B=2, C=2 is a valid full code (0, 10, 11).
        let pairs = [(0u32, 1u32), (1, 2), (2, 2)];
        let (bytes, _) = build_table(&pairs);
        let mut reader = BitReader::new(Cursor::new(bytes));
        let table = LenTable::read(&mut reader).unwrap();

        // Re-read from a fresh stream built from the codes directly.
        let code_bits: Vec<(u32, u32)> = vec![(0, 1), (0b10, 2), (0b11, 2)];
        for (expect_idx, (code, len)) in code_bits.iter().enumerate() {
            let mut bits = Vec::new();
            for i in (0..*len).rev() {
                bits.push(((code >> i) & 1) as u8);
            }
            while bits.len() % 8 != 0 {
                bits.push(0);
            }
            let mut byte = 0u8;
            for (i, b) in bits.iter().enumerate() {
                if i < 8 {
                    byte = (byte << 1) | b;
                }
            }
            let mut r = BitReader::new(Cursor::new(vec![byte]));
            let (len_out, sym) = table.decode(&mut r).unwrap();
            assert_eq!(len_out, *len);
            assert_eq!(sym, expect_idx as u32);
        }
    }
}
