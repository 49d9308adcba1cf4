//! Duden dictionary support: custom DEFLATE, block-indexed archive,
//! container metadata, charset transcoding, article text parser and
//! reference resolution, heading grouping.

pub mod archive;
pub mod assembly;
pub mod charset;
pub mod container;
pub mod convert;
pub mod inflate;
pub mod render;
pub mod text;

pub use archive::Archive;
pub use assembly::{group_hic_entries, Article};
pub use container::{
    decode_heading_prefixes, parse_fsi, parse_hic, parse_inf, parse_ld, FsiEntry, HicEntryType, HicHeader,
    HicHeading, InfDictionary, InfFile, InfResource, LdEntry, LdFile, LdRange,
};
pub use convert::{convert_dictionary, ConvertedArticle};
