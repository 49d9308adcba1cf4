//! # dictcodec
//!
//! Decode Lingvo LSD/LSA and Duden dictionary archives into a heading/article
//! model suitable for DSL export.
//!
//! * `bitstream` -- random-access byte stream, MSB-first bit reader, XOR
//!   descrambling adapter.
//! * `huffman` -- the canonical Huffman length table shared by every LSD
//!   dialect.
//! * `lsd` -- Lingvo LSD/LSA container: dialect decoders, header, heading
//!   page traversal.
//! * `duden` -- Duden archive format: custom DEFLATE variant, block-indexed
//!   archive, container metadata, charset transcoding, article text parser.
//! * `dsl` -- thin DSL serialization interface consumed by both formats.
//!
//! ## Buffer Example
//!
//! ```rs
//! use dictcodec::lsd::LsdDictionary;
//! use std::io::Cursor;
//! let data: Vec<u8> = std::fs::read("some_input_path.lsd").expect("read failed");
//! let dict = LsdDictionary::open(Cursor::new(data)).expect("open failed");
//! eprintln!("{}", dict.name);
//! ```

pub mod bitstream;
pub mod dsl;
pub mod duden;
pub mod error;
pub mod huffman;
pub mod langcodes;
pub mod lsd;

pub use error::{Error, Result};
