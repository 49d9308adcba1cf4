//! C12: reference resolution. Two rewriting passes over a parsed article's
//! tree -- a Resolver that turns each `ReferencePlaceholder`/`InlineSound`
//! into its typed final form by consulting the `.ld` reference table, and
//! an Inliner that follows `TableReference`/`PictureReference` offsets back
//! into the resource archive and re-parses the nested caption/table text it
//! finds there -- then the Resolver runs once more so references newly
//! uncovered inside an inlined caption get resolved too.

use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::duden::archive::Archive;
use crate::duden::charset::duden_to_utf8;
use crate::duden::container::{LdEntry, LdFile, LdRange};
use crate::duden::text::parser::parse as parse_text;
use crate::duden::text::tree::{InlineSoundName, NodeId, NodeKind, Tree};
use crate::error::Result;

/// Maps a heading index to the heading text it resolves to, built once per
/// dictionary and shared across every article's resolution pass.
pub struct HeadingIndex {
    by_index: HashMap<u32, String>,
}

impl HeadingIndex {
    pub fn build(headings: &[(u32, String)]) -> Self {
        let mut by_index = HashMap::new();
        for (idx, text) in headings {
            by_index.insert(*idx, text.clone());
        }
        HeadingIndex { by_index }
    }

    pub fn lookup(&self, idx: u32) -> Option<&str> {
        self.by_index.get(&idx).map(|s| s.as_str())
    }
}

/// Run the full C12 pipeline over `tree` in place: resolve, inline, resolve
/// again.
pub fn resolve_references<R: Read + Seek>(
    tree: &mut Tree,
    headings: &HeadingIndex,
    ld: &LdFile,
    archive: &mut Archive<R>,
) {
    resolve_pass(tree, headings, ld);
    inline_pass(tree, archive);
    resolve_pass(tree, headings, ld);
}

/// Rewrite every still-unresolved `ReferencePlaceholder`/`InlineSound` node
/// in `tree` into its typed final form.
fn resolve_pass(tree: &mut Tree, headings: &HeadingIndex, ld: &LdFile) {
    let ids: Vec<_> = (0..tree.len()).collect();
    for id in ids {
        match tree.get(id).kind.clone() {
            NodeKind::ReferencePlaceholder { id: rid, .. } => {
                if let Some(new_kind) = resolve_placeholder(tree, id, rid, headings, ld) {
                    tree.get_mut(id).kind = new_kind;
                }
            }
            NodeKind::InlineSound { names } if names.is_empty() => {
                let names = resolve_inline_sound(tree, id);
                tree.get_mut(id).kind = NodeKind::InlineSound { names };
            }
            _ => {}
        }
    }
}

fn resolve_placeholder(
    tree: &Tree,
    node: NodeId,
    id: Option<crate::duden::text::tree::ReferenceId>,
    headings: &HeadingIndex,
    ld: &LdFile,
) -> Option<NodeKind> {
    let segments = tree.get(node).children.clone();
    let first_segment = *segments.first()?;
    let id = id?;

    if id.code.is_empty() {
        if id.num == -1 {
            return None;
        }
        let heading = u32::try_from(id.num).ok().and_then(|idx| headings.lookup(idx)).map(|s| s.to_string());
        return Some(NodeKind::ArticleReference { caption: first_segment, offset: id.num, heading });
    }

    let mut chars = id.code.chars();
    let prefix = chars.next()?;
    let rest: String = chars.collect();

    if prefix == 'I' {
        let mut secondary = None;
        if segments.len() > 2 {
            let marker = tree.plain_text(segments[1]);
            if marker == "T" {
                let mut file = tree.plain_text(segments[2]);
                replace_adp_with_wav(&mut file);
                secondary = Some(file);
            }
        }
        return Some(NodeKind::InlineImage { name: rest, secondary });
    }

    let entry = ld.references.iter().find_map(|e| match e {
        LdEntry::Reference { name, code, .. } if code == &rest => Some(name.as_str()),
        _ => None,
    })?;
    if prefix != 'M' {
        return None;
    }
    match entry {
        "Tabellen" => {
            let (file_name, offset) = find_resource_file(&ld.ranges, id.num)?;
            Some(NodeKind::TableReference { offset: offset as i64, file_name, caption: first_segment, content: None, mt: None })
        }
        "Bilder" => {
            let (file_name, offset) = find_resource_file(&ld.ranges, id.num)?;
            let caption = *segments.last()?;
            Some(NodeKind::PictureReference { offset: offset as i64, file_name, caption, description: None })
        }
        "Web" => {
            let caption = first_segment;
            let url = tree.plain_text(*segments.last()?);
            Some(NodeKind::WebReference { url, caption })
        }
        _ => None,
    }
}

/// `FILE.EXT` or `FILE.EXT "LABEL"` per child segment; `.adp` is always
/// rewritten to `.wav`.
fn resolve_inline_sound(tree: &Tree, node: NodeId) -> Vec<InlineSoundName> {
    tree.get(node)
        .children
        .iter()
        .map(|&segment| {
            let text = tree.plain_text(segment);
            let (mut file, label) = match text.find(" \"") {
                Some(idx) => (text[..idx].to_string(), text[idx + 2..].trim_end_matches('"').to_string()),
                None => (text, String::new()),
            };
            replace_adp_with_wav(&mut file);
            InlineSoundName { file, label }
        })
        .collect()
}

fn replace_adp_with_wav(name: &mut String) {
    if let Some(stripped) = name.strip_suffix(".adp").or_else(|| name.strip_suffix(".ADP")) {
        *name = format!("{stripped}.wav");
    }
}

fn find_resource_file(ranges: &[LdRange], offset: i64) -> Option<(String, u32)> {
    let offset = u32::try_from(offset).ok()?;
    ranges.iter().find(|r| r.contains(offset)).map(|r| (r.file_name.clone(), offset - r.first))
}

/// Follow every still-unfilled `TableReference`/`PictureReference` offset
/// into the resource archive and attach its inlined caption/content.
fn inline_pass<R: Read + Seek>(tree: &mut Tree, archive: &mut Archive<R>) {
    let ids: Vec<_> = (0..tree.len()).collect();
    for id in ids {
        match tree.get(id).kind.clone() {
            NodeKind::PictureReference { offset, description: None, .. } => {
                if let Ok(lines) = read_info_lines(archive, offset) {
                    if let Some(desc) = parse_picture_description(tree, &lines) {
                        if let NodeKind::PictureReference { description, .. } = &mut tree.get_mut(id).kind {
                            *description = Some(desc);
                        }
                    }
                }
            }
            NodeKind::TableReference { offset, content: None, .. } => {
                if let Ok(lines) = read_info_lines(archive, offset) {
                    if let Some((content, mt)) = parse_table_content(tree, &lines) {
                        if let NodeKind::TableReference { content: content_slot, mt: mt_slot, .. } = &mut tree.get_mut(id).kind {
                            *content_slot = Some(content);
                            *mt_slot = mt;
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// Resource info blocks are small; one generous fixed-size read covers the
/// whole attribute/description (or `@C%MT=`/table) block in practice.
const INFO_BLOCK_READ_SIZE: u32 = 4096;

fn read_info_lines<R: Read + Seek>(archive: &mut Archive<R>, offset: i64) -> Result<Vec<String>> {
    let offset = u32::try_from(offset).unwrap_or(0);
    let raw = archive.read(offset, INFO_BLOCK_READ_SIZE)?;
    let text = duden_to_utf8(&raw)?;
    Ok(text.split('\n').map(|l| l.trim_end_matches('\r').to_string()).collect())
}

/// `@C%CR=`/`@C%File=`/`@C%Type=` attribute lines, then a description line.
fn parse_picture_description(tree: &mut Tree, lines: &[String]) -> Option<NodeId> {
    for line in lines.iter().skip(1) {
        if line.starts_with("@C%") {
            continue;
        }
        let sub = parse_text(line).ok()?;
        return Some(graft_subtree(tree, &sub));
    }
    None
}

/// `@C%MT="..."` then raw table text up to a line starting with `\S{;:`.
fn parse_table_content(tree: &mut Tree, lines: &[String]) -> Option<(NodeId, Option<String>)> {
    let mut mt = None;
    let mut raw_table = String::new();
    for line in lines {
        if let Some(rest) = line.strip_prefix("@C%MT=") {
            mt = Some(rest.trim_matches('"').to_string());
            continue;
        }
        raw_table.push_str(line);
        raw_table.push('\n');
        if line.starts_with("\\S{;:") {
            break;
        }
    }
    let sub = parse_text(&raw_table).ok()?;
    Some((graft_subtree(tree, &sub), mt))
}

/// Copy a freshly parsed sub-tree's root children into a new detached node
/// in `tree` and return that node's id.
fn graft_subtree(tree: &mut Tree, sub: &Tree) -> NodeId {
    let host = tree.new_detached(NodeKind::Root);
    copy_children(tree, sub, sub.root(), host);
    host
}

fn copy_children(tree: &mut Tree, sub: &Tree, sub_id: NodeId, host_id: NodeId) {
    for &child in &sub.get(sub_id).children {
        let new_id = tree.push_child(host_id, sub.get(child).kind.clone());
        copy_children(tree, sub, child, new_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duden::text::parser::parse;
    use std::io::Cursor;

    fn make_archive() -> Archive<Cursor<Vec<u8>>> {
        Archive::new(Cursor::new(Vec::new()), vec![0]).unwrap()
    }

    #[test]
    fn resolves_plain_heading_index_into_article_reference() {
        let mut tree = parse(r"see \S{Diskettenformat;:5}").unwrap();
        let headings = HeadingIndex::build(&[(5, "target heading".to_string())]);
        let ld = LdFile::default();
        let mut archive = make_archive();
        resolve_references(&mut tree, &headings, &ld, &mut archive);
        let root = tree.root();
        let last = *tree.get(root).children.last().unwrap();
        match &tree.get(last).kind {
            NodeKind::ArticleReference { offset, heading, .. } => {
                assert_eq!(*offset, 5);
                assert_eq!(heading.as_deref(), Some("target heading"));
            }
            other => panic!("expected article reference node, got {other:?}"),
        }
    }

    #[test]
    fn worked_example_resolves_to_offset_without_ld_ranges() {
        let mut tree = parse(r"\S{Diskettenformat;:025004230}").unwrap();
        let headings = HeadingIndex::build(&[]);
        let ld = LdFile::default();
        let mut archive = make_archive();
        resolve_references(&mut tree, &headings, &ld, &mut archive);
        let root = tree.root();
        let last = *tree.get(root).children.last().unwrap();
        match &tree.get(last).kind {
            NodeKind::ArticleReference { offset, heading, caption } => {
                assert_eq!(*offset, 25004230);
                assert!(heading.is_none());
                assert_eq!(tree.plain_text(*caption), "Diskettenformat");
            }
            other => panic!("expected article reference node, got {other:?}"),
        }
    }

    #[test]
    fn leaves_placeholder_with_no_id_unresolved() {
        let mut tree = parse(r"see \S{123}").unwrap();
        let headings = HeadingIndex::build(&[]);
        let ld = LdFile::default();
        let mut archive = make_archive();
        resolve_references(&mut tree, &headings, &ld, &mut archive);
        let root = tree.root();
        let last = *tree.get(root).children.last().unwrap();
        assert!(matches!(&tree.get(last).kind, NodeKind::ReferencePlaceholder { .. }));
    }

    #[test]
    fn resolves_web_reference() {
        let mut tree = parse(r"\S{Example;.MW:1}").unwrap();
        let headings = HeadingIndex::build(&[]);
        let mut ld = LdFile::default();
        ld.references.push(LdEntry::Reference { kind: "web".into(), name: "Web".into(), code: "W".into() });
        let mut archive = make_archive();
        resolve_references(&mut tree, &headings, &ld, &mut archive);
        let root = tree.root();
        let last = *tree.get(root).children.last().unwrap();
        match &tree.get(last).kind {
            NodeKind::WebReference { url, caption } => {
                assert_eq!(url, "Example");
                let _ = caption;
            }
            other => panic!("expected web reference node, got {other:?}"),
        }
    }

    #[test]
    fn resolves_inline_image_with_secondary_sound_and_adp_rewrite() {
        let mut tree = parse(r"\S{cap;.IPic;T;sound.adp}").unwrap();
        let headings = HeadingIndex::build(&[]);
        let ld = LdFile::default();
        let mut archive = make_archive();
        resolve_references(&mut tree, &headings, &ld, &mut archive);
        let root = tree.root();
        let last = *tree.get(root).children.last().unwrap();
        match &tree.get(last).kind {
            NodeKind::InlineImage { name, secondary } => {
                assert_eq!(name, "Pic");
                assert_eq!(secondary.as_deref(), Some("sound.wav"));
            }
            other => panic!("expected inline image node, got {other:?}"),
        }
    }
}
