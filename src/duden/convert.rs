//! Top-level Duden pipeline: wires the container/archive/text modules
//! together into full articles, the same glue the reference's conversion
//! driver provides over its own `HicParser`/`Archive`/`TextRun` pieces
//! (`lib/duden/Writer.cpp`, `lib/duden/Duden.cpp::convert`).

use std::io::{Read, Seek};

use crate::duden::archive::Archive;
use crate::duden::assembly::group_hic_entries;
use crate::duden::charset::duden_to_utf8;
use crate::duden::container::{parse_hic, parse_ld, HicHeading, LdFile};
use crate::duden::render::render_tree;
use crate::duden::text::parser::parse as parse_text;
use crate::duden::text::reference::{resolve_references, HeadingIndex};
use crate::error::Result;

/// One converted article ready for `dsl::DslWriter`: its grouped heading
/// lines and the already-rendered DSL body text.
pub struct ConvertedArticle {
    pub headings: Vec<String>,
    pub body: String,
}

/// Decode every article in one `.hic`/`.bof`/`.idx`/`.ld` quartet. `ld_text`
/// may be empty -- some dictionaries carry no `.ld` table, in which case
/// cross-references that don't resolve through the `.hic` heading order are
/// simply left unresolved rather than failing the whole conversion.
pub fn convert_dictionary<H: Read + Seek, B: Read + Seek>(
    hic: H,
    bof: B,
    idx_data: &[u8],
    ld_text: &str,
) -> Result<Vec<ConvertedArticle>> {
    let (_header, leaves) = parse_hic(hic)?;
    let ld = if ld_text.is_empty() { LdFile::default() } else { parse_ld(ld_text)? };
    let index = Archive::<B>::parse_index(idx_data)?;
    let mut archive = Archive::new(bof, index)?;

    let heading_index = build_heading_index(&leaves);
    let articles = group_hic_entries(&leaves);

    let mut out = Vec::with_capacity(articles.len());
    for article in &articles {
        let offset = article.offset.max(0) as u32;
        let size = if article.size < 0 { u32::MAX } else { article.size as u32 };
        let raw = archive.read(offset, size)?;
        let text = duden_to_utf8(&raw)?;
        let mut tree = parse_text(&text)?;
        resolve_references(&mut tree, &heading_index, &ld, &mut archive);
        let body = render_tree(&tree);
        out.push(ConvertedArticle { headings: article.headings.clone(), body });
    }
    Ok(out)
}

/// Each leaf's position in the `.hic` tree's visit order is the numeric
/// index `\S{N}` placeholders reference.
fn build_heading_index(leaves: &[HicHeading]) -> HeadingIndex {
    let pairs: Vec<(u32, String)> =
        leaves.iter().enumerate().map(|(i, h)| (i as u32, h.text.clone())).collect();
    HeadingIndex::build(&pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duden::inflate::encode_literals_for_test;
    use std::io::Cursor;

    fn build_hic(headings: &[(&str, u8, u32)]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(crate::duden::container::HIC_MAGIC);
        data.push(0); // reserved
        data.push(4); // version
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&(headings.len() as u32).to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.push(0);
        data.push(1); // namelen == 1 -> zero-byte name body
        data.push(0); // name field's trailing reserved byte

        let mut node = Vec::new();
        node.push(headings.len() as u8);
        for (_, entry_type, text_offset) in headings {
            let raw = ((text_offset + 1) << 5) | ((*entry_type as u32) << 1);
            node.extend_from_slice(&raw.to_le_bytes());
        }
        for (text, _, _) in headings {
            node.extend_from_slice(text.as_bytes());
            node.push(0);
        }
        let node_size = node.len() as u16;
        data.extend_from_slice(&node_size.to_le_bytes());
        data.extend_from_slice(&node);
        data
    }

    #[test]
    fn converts_single_article_with_no_references() {
        let hic = build_hic(&[("Apfel", 1, 0)]);
        let block = encode_literals_for_test(b"a nice fruit");
        let idx = {
            let mut v = Vec::new();
            v.extend_from_slice(&0u32.to_le_bytes());
            v.extend_from_slice(&(block.len() as u32).to_le_bytes());
            v.extend_from_slice(&12u32.to_le_bytes());
            v
        };
        let articles = convert_dictionary(Cursor::new(hic), Cursor::new(block), &idx, "").unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].headings, vec!["Apfel"]);
        assert_eq!(articles[0].body, "a nice fruit");
    }
}
