//! Renders a parsed article tree into DSL markup text.
//!
//! Maps the typed tree the parser and reference resolver produce into text
//! `dsl::DslWriter` can write out, using DSL's own `[b]`/`[i]`/`[u]`/
//! `[sup]`/`[sub]`/`[ref]` tag vocabulary (the same tag family GoldenDict
//! and Lingvo both already recognise) rather than inventing a new one.

use crate::duden::text::tree::{Alignment, NodeId, NodeKind, Tree};

/// Render `id` and its subtree into `out`.
pub fn render(tree: &Tree, id: NodeId, out: &mut String) {
    match &tree.get(id).kind {
        NodeKind::Root => render_children(tree, id, out),
        NodeKind::Plain(s) => out.push_str(s),
        NodeKind::LineBreak => out.push('\n'),
        NodeKind::SoftLineBreak => out.push(' '),
        NodeKind::Tab => out.push('\t'),
        NodeKind::Bold => wrap(tree, id, out, "b"),
        NodeKind::Italic => wrap(tree, id, out, "i"),
        NodeKind::BoldItalic => wrap(tree, id, out, "b"), // nested Bold>Italic handled by the sticky rewrite
        NodeKind::Underline => wrap(tree, id, out, "u"),
        NodeKind::Superscript => wrap(tree, id, out, "sup"),
        NodeKind::Subscript => wrap(tree, id, out, "sub"),
        NodeKind::Addendum => wrap(tree, id, out, "com"),
        NodeKind::Color(rgb) => {
            out.push_str(&format!("[c {rgb}]"));
            render_children(tree, id, out);
            out.push_str("[/c]");
        }
        NodeKind::Alignment(a) => {
            let name = match a {
                Alignment::Left => "left",
                Alignment::Right => "right",
                Alignment::Center => "center",
            };
            out.push_str(&format!("[align {name}]"));
            render_children(tree, id, out);
            out.push_str("[/align]");
        }
        NodeKind::WebLink(url) => {
            out.push_str(&format!("[url]{url}[/url]"));
        }
        NodeKind::WebReference { url, caption } => {
            out.push_str(&format!("[url]{url}[/url]"));
            render(tree, *caption, out);
        }
        NodeKind::Id(_) => {} // anchor point, carries no visible text
        NodeKind::Table(_) | NodeKind::TableRow => render_children(tree, id, out),
        NodeKind::TableCell => {
            render_children(tree, id, out);
            out.push('\t');
        }
        NodeKind::TableTag { .. } => {} // layout/border metadata, nothing to render
        NodeKind::ReferencePlaceholder { .. } => {
            // Still unresolved after C12 -- fall back to its raw segment text
            // instead of dropping the reference silently.
            out.push_str("[ref]");
            render_children(tree, id, out);
            out.push_str("[/ref]");
        }
        NodeKind::ReferenceSegment => render_children(tree, id, out),
        NodeKind::InlineSound { names } => {
            for name in names {
                out.push_str(&format!("[s]{}[/s]", name.file));
            }
        }
        NodeKind::ArticleReference { caption, heading, .. } => {
            let mut caption_text = String::new();
            render(tree, *caption, &mut caption_text);
            match heading {
                Some(h) if h != &caption_text => out.push_str(&format!("[ref]{h}[/ref]")),
                Some(h) => out.push_str(&format!("[ref]{h}[/ref] ({caption_text})")),
                None => out.push_str(&format!("[ref]{caption_text}[/ref]")),
            }
        }
        NodeKind::PictureReference { file_name, .. } => out.push_str(&format!("[<<<{file_name}>>>]")),
        NodeKind::TableReference { file_name, content, .. } => match content {
            Some(content) => render(tree, *content, out),
            None => out.push_str(&format!("[<<<{file_name}>>>]")),
        },
        NodeKind::InlineImage { name, secondary } => {
            out.push_str(&format!("[<<<{name}>>>]"));
            if let Some(sound) = secondary {
                out.push_str(&format!("[s]{sound}[/s]"));
            }
        }
        NodeKind::Sticky(_) => {} // resolved away by the sticky rewrite before rendering
    }
}

fn wrap(tree: &Tree, id: NodeId, out: &mut String, tag: &str) {
    out.push_str(&format!("[{tag}]"));
    render_children(tree, id, out);
    out.push_str(&format!("[/{tag}]"));
}

fn render_children(tree: &Tree, id: NodeId, out: &mut String) {
    for &child in &tree.get(id).children {
        render(tree, child, out);
    }
}

/// Render a whole tree's root to a single DSL body string.
pub fn render_tree(tree: &Tree) -> String {
    let mut out = String::new();
    render(tree, tree.root(), &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duden::text::parser::parse;

    #[test]
    fn renders_bold_span_as_dsl_tag() {
        let tree = parse(r"a \b{bold} b").unwrap();
        assert_eq!(render_tree(&tree), "a [b]bold[/b] b");
    }

    #[test]
    fn renders_resolved_article_reference_by_differing_heading() {
        let mut t = crate::duden::text::tree::Tree::new();
        let root = t.root();
        let caption = t.new_detached(NodeKind::Plain("Diskettenformat".into()));
        t.push_child(root, NodeKind::ArticleReference { caption, offset: 25004230, heading: Some("Target".into()) });
        assert_eq!(render_tree(&t), "[ref]Target[/ref]");
    }

    #[test]
    fn renders_resolved_article_reference_matching_its_own_caption() {
        let mut t = crate::duden::text::tree::Tree::new();
        let root = t.root();
        let caption = t.new_detached(NodeKind::Plain("Diskettenformat".into()));
        t.push_child(root, NodeKind::ArticleReference {
            caption,
            offset: 25004230,
            heading: Some("Diskettenformat".into()),
        });
        assert_eq!(render_tree(&t), "[ref]Diskettenformat[/ref] (Diskettenformat)");
    }

    #[test]
    fn renders_unresolved_reference_placeholder_by_its_segment_text() {
        let tree = parse(r"see \S{123}").unwrap();
        assert_eq!(render_tree(&tree), "see [ref]123[/ref]");
    }
}
