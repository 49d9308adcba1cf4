//! C11: hand-written recursive-descent parser turning a charset-decoded
//! Duden article string into a `Tree`.
//!
//! The format is backslash-escape based, not tag-based: `\b{...}` bold,
//! `\i{...}`/`\s{...}` italic, `\u{...}` underline, `\sup{...}`/`\sub{...}`
//! super/subscript, `\eb{N}...\ee` an addendum block, `\tab{...}` a table,
//! `\F{NAME}...\F{NAME_}` a named formatting scope (color, alignment, web
//! links), `\S{...}` a cross-reference placeholder, `\w{...}` an inline
//! sound reference. A leading `@` switches to a second, single-character
//! control dispatch (`@@` literal `@`, `@S` superscript arrow, bare digits
//! a "sticky" formatting marker paired up by `rewrite_sticky_formatting`
//! once the whole article has been parsed).

use crate::duden::text::tree::{Alignment, NodeId, NodeKind, ReferenceId, TableTagKind, Tree};
use crate::error::{Error, Result};

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    tree: Tree,
    scopes: Vec<(String, NodeId)>,
}

pub fn parse(text: &str) -> Result<Tree> {
    let mut p = Parser { chars: text.chars().peekable(), tree: Tree::new(), scopes: Vec::new() };
    let root = p.tree.root();
    p.parse_children(root, false)?;
    if let Some((name, _)) = p.scopes.last() {
        return Err(Error::parse(format!("unterminated \\F{{{name}}} scope")));
    }
    rewrite_sticky_formatting(&mut p.tree, root);
    Ok(p.tree)
}

impl<'a> Parser<'a> {
    /// Parse node content until EOF, or (if `until_brace`) an unescaped
    /// `}` closing the span -- consumed, not pushed back.
    fn parse_children(&mut self, parent: NodeId, until_brace: bool) -> Result<()> {
        let mut text_run = String::new();
        loop {
            match self.chars.peek().copied() {
                None => {
                    self.flush_text(parent, &mut text_run);
                    if until_brace {
                        return Err(Error::parse("unterminated escape span in duden article text"));
                    }
                    return Ok(());
                }
                Some('}') if until_brace => {
                    self.chars.next();
                    self.flush_text(parent, &mut text_run);
                    return Ok(());
                }
                Some('\\') => {
                    self.flush_text(parent, &mut text_run);
                    self.parse_backslash(parent)?;
                }
                Some('@') => {
                    self.flush_text(parent, &mut text_run);
                    self.parse_at(parent)?;
                }
                Some('~') => {
                    self.chars.next();
                    text_run.push('\u{a0}');
                }
                Some('\r') | Some('\n') => {
                    self.chars.next();
                    if self.chars.peek() == Some(&'\n') {
                        self.chars.next();
                    }
                    self.flush_text(parent, &mut text_run);
                    self.tree.push_child(parent, NodeKind::SoftLineBreak);
                }
                Some(c) => {
                    self.chars.next();
                    text_run.push(c);
                }
            }
        }
    }

    /// Parse one `;`-delimited run's body into `parent`: identical to
    /// `parse_children`, but stops (without consuming) at a top-level `;`
    /// or `}` instead of requiring a brace of its own.
    fn parse_segment_body(&mut self, parent: NodeId) -> Result<()> {
        let mut text_run = String::new();
        loop {
            match self.chars.peek().copied() {
                None => return Err(Error::parse("unterminated reference segment in duden article text")),
                Some(';') | Some('}') => {
                    self.flush_text(parent, &mut text_run);
                    return Ok(());
                }
                Some('\\') => {
                    self.flush_text(parent, &mut text_run);
                    self.parse_backslash(parent)?;
                }
                Some('@') => {
                    self.flush_text(parent, &mut text_run);
                    self.parse_at(parent)?;
                }
                Some('~') => {
                    self.chars.next();
                    text_run.push('\u{a0}');
                }
                Some('\r') | Some('\n') => {
                    self.chars.next();
                    if self.chars.peek() == Some(&'\n') {
                        self.chars.next();
                    }
                    self.flush_text(parent, &mut text_run);
                    self.tree.push_child(parent, NodeKind::SoftLineBreak);
                }
                Some(c) => {
                    self.chars.next();
                    text_run.push(c);
                }
            }
        }
    }

    fn flush_text(&mut self, parent: NodeId, buf: &mut String) {
        if !buf.is_empty() {
            self.tree.push_child(parent, NodeKind::Plain(std::mem::take(buf)));
        }
    }

    fn take_word(&mut self) -> String {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphabetic() {
                out.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        out
    }

    /// Read a run of decimal digits, returning `-1` (the "absent" sentinel
    /// used throughout reference ids) when none are present.
    fn take_number(&mut self) -> i64 {
        let mut digits = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        if digits.is_empty() {
            -1
        } else {
            digits.parse().unwrap_or(-1)
        }
    }

    /// `from[-to]`, defaulting `to` to `from` when no dash follows.
    fn take_range(&mut self) -> (i64, i64) {
        let from = self.take_number();
        let to = if self.chars.peek().copied() == Some('-') {
            self.chars.next();
            self.take_number()
        } else {
            from
        };
        (from, to)
    }

    /// Try to consume `s` literally. Non-destructive on failure: the
    /// stream is left exactly where it was if `s` doesn't match.
    fn try_literal(&mut self, s: &str) -> bool {
        let save = self.chars.clone();
        for expected in s.chars() {
            if self.chars.next() != Some(expected) {
                self.chars = save;
                return false;
            }
        }
        true
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.chars.next() == Some(c) {
            Ok(())
        } else {
            Err(Error::parse(format!("expected {c:?} in duden article text")))
        }
    }

    /// Read a balanced `{...}` span as raw text (no nested escape parsing);
    /// used for `\F{...}`, `\eb{...}`.
    fn read_braced(&mut self) -> Result<String> {
        self.expect('{')?;
        let mut depth = 1u32;
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some('{') => {
                    depth += 1;
                    out.push('{');
                }
                Some('}') => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push('}');
                }
                Some(c) => out.push(c),
                None => return Err(Error::parse("unterminated brace in duden article text")),
            }
        }
    }

    fn parse_backslash(&mut self, parent: NodeId) -> Result<()> {
        self.chars.next(); // consume '\'
        match self.chars.peek().copied() {
            Some('\\') => {
                self.chars.next();
                self.tree.push_child(parent, NodeKind::LineBreak);
                return Ok(());
            }
            Some('{') => {
                self.chars.next();
                self.tree.push_child(parent, NodeKind::Plain("{".into()));
                return Ok(());
            }
            Some('\'') => {
                self.chars.next();
                self.tree.push_child(parent, NodeKind::Plain("'".into()));
                return Ok(());
            }
            _ => {}
        }

        let word = self.take_word();
        match word.as_str() {
            "b" => self.parse_span(parent, NodeKind::Bold),
            "i" | "s" => self.parse_span(parent, NodeKind::Italic),
            "u" => self.parse_span(parent, NodeKind::Underline),
            "sup" => self.parse_span(parent, NodeKind::Superscript),
            "sub" => self.parse_span(parent, NodeKind::Subscript),
            "tab" => self.parse_table(parent),
            "S" => self.parse_reference(parent),
            "w" => self.parse_inline_sound(parent),
            "eb" => {
                self.read_braced()?; // nesting level, unused once parsed
                let node = self.tree.push_child(parent, NodeKind::Addendum);
                self.scopes.push(("eb".into(), node));
                Ok(())
            }
            "ee" => {
                match self.scopes.pop() {
                    Some((name, _)) if name == "eb" => Ok(()),
                    Some(other) => Err(Error::parse(format!("\\ee closes \\eb but innermost open scope is {other:?}"))),
                    None => Err(Error::parse("\\ee with no open \\eb")),
                }
            }
            "F" => {
                let name = self.read_braced()?;
                self.parse_f_scope(parent, &name)
            }
            "" => Err(Error::parse("bare backslash in duden article text")),
            other => Err(Error::parse(format!("unrecognised escape \\{other} in duden article text"))),
        }
    }

    fn parse_span(&mut self, parent: NodeId, kind: NodeKind) -> Result<()> {
        self.expect('{')?;
        let node = self.tree.push_child(parent, kind);
        self.parse_children(node, true)
    }

    /// `\S{seg;seg;...}` or `\S{seg;.CODE:num[-num2][:from[-to]]}`: the
    /// first `;`-delimited run is always a plain `ReferenceSegment` child;
    /// if a `;` follows it, what comes next is the id suffix, optionally
    /// more segments, and an optional trailing range.
    fn parse_reference(&mut self, parent: NodeId) -> Result<()> {
        self.expect('{')?;
        let node = self.tree.push_child(parent, NodeKind::ReferencePlaceholder { id: None, range: None });
        self.parse_reference_segment(node)?;

        if self.chars.peek().copied() == Some(';') {
            self.chars.next();
            let id = self.parse_reference_id()?;
            while self.chars.peek().copied() == Some(';') {
                self.chars.next();
                self.parse_reference_segment(node)?;
            }
            let range = if self.chars.peek().copied() == Some(':') {
                self.chars.next();
                Some(self.take_range())
            } else {
                None
            };
            if let NodeKind::ReferencePlaceholder { id: id_slot, range: range_slot } = &mut self.tree.get_mut(node).kind
            {
                *id_slot = Some(id);
                *range_slot = range;
            }
        }

        self.expect('}')
    }

    /// `[.CODE][:num[-num2]]`.
    fn parse_reference_id(&mut self) -> Result<ReferenceId> {
        let mut code = String::new();
        if self.chars.peek().copied() == Some('.') {
            self.chars.next();
            while let Some(&c) = self.chars.peek() {
                if c == ':' || c == ';' || c == '}' {
                    break;
                }
                code.push(c);
                self.chars.next();
            }
        }
        let mut num = -1i64;
        let mut num2 = -1i64;
        if self.chars.peek().copied() == Some(':') {
            self.chars.next();
            num = self.take_number();
            if self.chars.peek().copied() == Some('-') {
                self.chars.next();
                num2 = self.take_number();
            }
        }
        Ok(ReferenceId { code, num, num2 })
    }

    fn parse_reference_segment(&mut self, parent: NodeId) -> Result<()> {
        let segment = self.tree.push_child(parent, NodeKind::ReferenceSegment);
        self.parse_segment_body(segment)
    }

    /// `\w{name1;name2;...}`: each `;`-delimited run is a raw segment,
    /// split into file/label pairs once `C12` resolves it.
    fn parse_inline_sound(&mut self, parent: NodeId) -> Result<()> {
        self.expect('{')?;
        let node = self.tree.push_child(parent, NodeKind::InlineSound { names: Vec::new() });
        loop {
            self.parse_reference_segment(node)?;
            match self.chars.peek().copied() {
                Some(';') => {
                    self.chars.next();
                }
                Some('}') => {
                    self.chars.next();
                    return Ok(());
                }
                _ => return Err(Error::parse("unterminated \\w{} inline sound reference")),
            }
        }
    }

    fn parse_table(&mut self, parent: NodeId) -> Result<()> {
        self.expect('{')?;
        let table = self.tree.push_child(parent, NodeKind::Table(None));
        let mut rows = vec![self.tree.push_child(table, NodeKind::TableRow)];
        let mut cells = vec![self.tree.push_child(*rows.last().unwrap(), NodeKind::TableCell)];
        let mut column_count: i64 = -1;
        let mut row_count: i64 = -1;
        let mut cells_parsed: i64 = 1;
        let mut text_run = String::new();

        loop {
            let cell = *cells.last().unwrap();
            match self.chars.peek().copied() {
                None => return Err(Error::parse("unterminated \\tab table")),
                Some('}') => {
                    self.chars.next();
                    self.flush_text(cell, &mut text_run);
                    break;
                }
                Some('\\') => {
                    let save = self.chars.clone();
                    self.chars.next();
                    let word = self.take_word();
                    match word.as_str() {
                        "tcc" => {
                            self.flush_text(cell, &mut text_run);
                            if self.chars.peek().copied() == Some('}') {
                                self.chars.next();
                                break;
                            }
                            cells_parsed += 1;
                            let start_new_row = column_count > 0 && (cells_parsed - 1) % column_count == 0;
                            if start_new_row {
                                rows.push(self.tree.push_child(table, NodeKind::TableRow));
                            }
                            let last_row = *rows.last().unwrap();
                            cells.push(self.tree.push_child(last_row, NodeKind::TableCell));
                        }
                        "tcn" => {
                            let n = self.take_number();
                            column_count = n;
                            self.tree.push_child(table, NodeKind::TableTag { kind: TableTagKind::ColumnCount, from: n, to: n });
                        }
                        "tln" => {
                            let n = self.take_number();
                            row_count = n;
                            self.tree.push_child(table, NodeKind::TableTag { kind: TableTagKind::RowCount, from: n, to: n });
                        }
                        "ter" => {
                            self.flush_text(cell, &mut text_run);
                            self.tree.push_child(cell, NodeKind::TableTag { kind: TableTagKind::Ter, from: -1, to: -1 });
                        }
                        "ted" => {
                            self.flush_text(cell, &mut text_run);
                            self.tree.push_child(cell, NodeKind::TableTag { kind: TableTagKind::Ted, from: -1, to: -1 });
                        }
                        "tau" | "tcd" | "tld" | "tfl" | "tcl" | "tcr" | "tcm" | "tfu" | "tlt" => {
                            let n = self.take_number();
                            let kind = match word.as_str() {
                                "tau" => TableTagKind::Tau,
                                "tcd" => TableTagKind::Tcd,
                                "tld" => TableTagKind::Tld,
                                "tfl" => TableTagKind::Tfl,
                                "tcl" => TableTagKind::Tcl,
                                "tcr" => TableTagKind::Tcr,
                                "tcm" => TableTagKind::Tcm,
                                "tfu" => TableTagKind::Tfu,
                                "tlt" => TableTagKind::Tlt,
                                _ => unreachable!(),
                            };
                            self.tree.push_child(table, NodeKind::TableTag { kind, from: n, to: n });
                        }
                        _ => {
                            self.chars = save;
                            self.flush_text(cell, &mut text_run);
                            self.parse_backslash(cell)?;
                        }
                    }
                }
                Some('@') => {
                    self.flush_text(cell, &mut text_run);
                    self.parse_at(cell)?;
                }
                Some('~') => {
                    self.chars.next();
                    text_run.push('\u{a0}');
                }
                Some('\r') | Some('\n') => {
                    self.chars.next();
                    if self.chars.peek() == Some(&'\n') {
                        self.chars.next();
                    }
                    self.flush_text(cell, &mut text_run);
                    self.tree.push_child(cell, NodeKind::SoftLineBreak);
                }
                Some(c) => {
                    self.chars.next();
                    text_run.push(c);
                }
            }
        }

        let columns = if column_count > 0 {
            column_count as usize
        } else {
            self.tree.get(rows[0]).children.len().max(1)
        };
        let shape = compute_table_structure(&self.tree, &cells, rows.len(), columns);
        let _ = row_count; // recorded via the RowCount TableTag above
        if let NodeKind::Table(slot) = &mut self.tree.get_mut(table).kind {
            *slot = Some(shape);
        }
        Ok(())
    }

    fn parse_f_scope(&mut self, parent: NodeId, name: &str) -> Result<()> {
        if let Some(base) = name.strip_suffix('_') {
            return self.close_f_scope(parent, base);
        }
        let Some(base) = name.strip_prefix('_') else {
            // Unrecognised `\F{...}` shape: silently ignored.
            return Ok(());
        };
        let kind = match base {
            "ADD" => NodeKind::Addendum,
            "UE" => NodeKind::Underline,
            "WebLink" => NodeKind::WebLink(String::new()),
            "Left" => NodeKind::Alignment(Alignment::Left),
            "Right" => NodeKind::Alignment(Alignment::Right),
            "Center" => NodeKind::Alignment(Alignment::Center),
            hex if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) => NodeKind::Color(hex.to_string()),
            other => return Err(Error::parse(format!("unknown \\F{{_{other}}} formatting scope"))),
        };
        let node = self.tree.push_child(parent, kind);
        self.scopes.push((base.to_string(), node));
        Ok(())
    }

    fn close_f_scope(&mut self, _parent: NodeId, base: &str) -> Result<()> {
        match self.scopes.last() {
            Some((name, _)) if name == base => {
                let (_, node) = self.scopes.pop().unwrap();
                if base == "WebLink" {
                    let url = self.tree.plain_text(node);
                    self.tree.get_mut(node).kind = NodeKind::WebLink(url);
                }
                Ok(())
            }
            _ => Ok(()), // unmatched close: silent no-op
        }
    }

    fn parse_at(&mut self, parent: NodeId) -> Result<()> {
        self.chars.next(); // consume '@'
        match self.chars.peek().copied() {
            Some('@') => {
                self.chars.next();
                self.tree.push_child(parent, NodeKind::Plain("@".into()));
            }
            Some('\\') => {
                self.chars.next();
                self.tree.push_child(parent, NodeKind::Plain("\\".into()));
            }
            Some('~') => {
                self.chars.next();
                self.tree.push_child(parent, NodeKind::Plain("~".into()));
            }
            Some(';') => {
                self.chars.next();
                self.tree.push_child(parent, NodeKind::Plain(";".into()));
            }
            Some('S') => {
                self.chars.next();
                self.tree.push_child(parent, NodeKind::Plain('\u{2191}'.to_string()));
            }
            Some('C') if self.try_literal("C%ID=") => {
                let n = self.take_number();
                self.try_literal("%");
                self.tree.push_child(parent, NodeKind::Id(n));
            }
            Some(c) if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&d) = self.chars.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                let n: u32 = digits.parse().unwrap_or(0);
                self.tree.push_child(parent, NodeKind::Sticky(n));
            }
            _ => {
                // Comment-line marker: absorb to end of line.
                while let Some(&c) = self.chars.peek() {
                    self.chars.next();
                    if c == '\n' {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

fn sticky_num_to_run(n: u32) -> Option<NodeKind> {
    match n {
        1 | 4 | 7 => Some(NodeKind::Bold),
        2 => Some(NodeKind::Italic),
        3 => Some(NodeKind::BoldItalic),
        _ => None,
    }
}

/// Pair up `Sticky(n)` markers sharing a parent (first occurrence opens,
/// second closes) and wrap the children between them in the formatting
/// container `n` names. Runs bottom-up so nested pairs are resolved before
/// their enclosing pair is.
fn rewrite_sticky_formatting(tree: &mut Tree, node: NodeId) {
    for child in tree.get(node).children.clone() {
        rewrite_sticky_formatting(tree, child);
    }

    let children = tree.get(node).children.clone();
    let mut new_children = Vec::with_capacity(children.len());
    let mut i = 0;
    while i < children.len() {
        let c = children[i];
        if let NodeKind::Sticky(n) = tree.get(c).kind {
            if let Some(rel) = children[i + 1..].iter().position(|&cc| matches!(tree.get(cc).kind, NodeKind::Sticky(m) if m == n)) {
                let close_idx = i + 1 + rel;
                let inner = &children[i + 1..close_idx];
                match sticky_num_to_run(n) {
                    Some(kind) => {
                        let container = tree.new_detached(kind);
                        for &c in inner {
                            tree.reparent(c, container);
                        }
                        new_children.push(container);
                    }
                    None => new_children.extend_from_slice(inner),
                }
                i = close_idx + 1;
                continue;
            }
        }
        new_children.push(c);
        i += 1;
    }
    tree.replace_children(node, new_children);
}

/// Walk a table's cells, pairing each `Ter`/`Ted` merge-marker tag with the
/// nearest previous un-merged cell in its row/column and incrementing that
/// cell's span.
fn compute_table_structure(
    tree: &Tree,
    cells: &[NodeId],
    rows: usize,
    columns: usize,
) -> crate::duden::text::tree::Table {
    let n = cells.len();
    let mut hspans = vec![0u32; n];
    let mut vspans = vec![0u32; n];
    let mut hmerged = vec![false; n];
    let mut vmerged = vec![false; n];

    for (i, &cell) in cells.iter().enumerate() {
        let is_ter = tree
            .get(cell)
            .children
            .iter()
            .any(|&c| matches!(tree.get(c).kind, NodeKind::TableTag { kind: TableTagKind::Ter, .. }));
        let is_ted = tree
            .get(cell)
            .children
            .iter()
            .any(|&c| matches!(tree.get(c).kind, NodeKind::TableTag { kind: TableTagKind::Ted, .. }));

        if is_ter {
            hmerged[i] = true;
            let col = if columns > 0 { i % columns } else { 0 };
            let row_start = i - col;
            if let Some(master) = (row_start..i).rev().find(|&j| !hmerged[j]) {
                hspans[master] += 1;
            }
        }
        if is_ted && columns > 0 && i >= columns {
            vmerged[i] = true;
            let mut j = i as isize - columns as isize;
            while j >= 0 {
                let jx = j as usize;
                if !vmerged[jx] {
                    vspans[jx] += 1;
                    break;
                }
                j -= columns as isize;
            }
        }
    }

    crate::duden::text::tree::Table { rows, columns, cells: cells.to_vec(), hspans, vspans, hmerged, vmerged }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duden::text::tree::NodeKind;

    #[test]
    fn parses_plain_text() {
        let tree = parse("hello world").unwrap();
        assert_eq!(tree.plain_text(tree.root()), "hello world");
    }

    #[test]
    fn parses_nested_formatting_spans() {
        let tree = parse(r"a \b{bold \i{and italic}} text").unwrap();
        assert_eq!(tree.plain_text(tree.root()), "a bold and italic text");
        let root = tree.root();
        let bold = tree.get(root).children[1];
        assert!(matches!(tree.get(bold).kind, NodeKind::Bold));
    }

    #[test]
    fn tilde_merges_into_plain_text_as_nbsp() {
        let tree = parse("a~b").unwrap();
        assert_eq!(tree.plain_text(tree.root()), "a\u{a0}b");
        let root = tree.root();
        assert_eq!(tree.get(root).children.len(), 1);
    }

    #[test]
    fn bare_newline_is_a_soft_line_break() {
        let tree = parse("a\nb").unwrap();
        let root = tree.root();
        let mid = tree.get(root).children[1];
        assert!(matches!(tree.get(mid).kind, NodeKind::SoftLineBreak));
    }

    #[test]
    fn double_backslash_is_a_hard_line_break() {
        let tree = parse(r"a\\b").unwrap();
        let root = tree.root();
        let mid = tree.get(root).children[1];
        assert!(matches!(tree.get(mid).kind, NodeKind::LineBreak));
    }

    #[test]
    fn escaped_apostrophe_is_a_literal_quote() {
        let tree = parse(r"it\'s").unwrap();
        assert_eq!(tree.plain_text(tree.root()), "it's");
    }

    #[test]
    fn parses_numbered_id_comment() {
        let tree = parse("@C%ID=42%before\nafter").unwrap();
        let root = tree.root();
        let id_node = tree.get(root).children[0];
        assert!(matches!(tree.get(id_node).kind, NodeKind::Id(42)));
    }

    #[test]
    fn unrecognised_at_c_comment_is_absorbed_to_end_of_line() {
        let tree = parse("@Csome comment\nafter").unwrap();
        assert_eq!(tree.plain_text(tree.root()), "after");
    }

    #[test]
    fn parses_reference_placeholder_with_id_suffix() {
        let tree = parse(r"\S{Diskettenformat;:025004230}").unwrap();
        let root = tree.root();
        let last = *tree.get(root).children.last().unwrap();
        match &tree.get(last).kind {
            NodeKind::ReferencePlaceholder { id, range } => {
                let id = id.as_ref().expect("id should be parsed");
                assert_eq!(id.code, "");
                assert_eq!(id.num, 25004230);
                assert_eq!(id.num2, -1);
                assert!(range.is_none());
            }
            other => panic!("expected reference placeholder node, got {other:?}"),
        }
        let segment = tree.get(last).children[0];
        assert_eq!(tree.plain_text(segment), "Diskettenformat");
    }

    #[test]
    fn parses_reference_placeholder_without_semicolon() {
        let tree = parse(r"see \S{123}").unwrap();
        let root = tree.root();
        let last = *tree.get(root).children.last().unwrap();
        match &tree.get(last).kind {
            NodeKind::ReferencePlaceholder { id, .. } => assert!(id.is_none()),
            other => panic!("expected reference placeholder node, got {other:?}"),
        }
        assert_eq!(tree.plain_text(last), "123");
    }

    #[test]
    fn parses_inline_sound() {
        let tree = parse(r"listen \w{foo.wav}").unwrap();
        let root = tree.root();
        let last = *tree.get(root).children.last().unwrap();
        assert!(matches!(&tree.get(last).kind, NodeKind::InlineSound { names } if names.is_empty()));
        let segment = tree.get(last).children[0];
        assert_eq!(tree.plain_text(segment), "foo.wav");
    }

    #[test]
    fn rejects_unterminated_span() {
        assert!(parse(r"\b{unterminated").is_err());
    }

    #[test]
    fn rejects_unknown_escape() {
        assert!(parse(r"\zzz{nope}").is_err());
    }

    #[test]
    fn pairs_sticky_markers_into_bold() {
        let tree = parse("@1bold@1 plain").unwrap();
        let root = tree.root();
        let bold = tree.get(root).children[0];
        assert!(matches!(tree.get(bold).kind, NodeKind::Bold));
        assert_eq!(tree.plain_text(root), "bold plain");
    }

    #[test]
    fn web_link_scope_captures_its_body_as_url() {
        let tree = parse(r"\F{_WebLink}http://example.com\F{WebLink_}").unwrap();
        let root = tree.root();
        let link = tree.get(root).children[0];
        assert!(matches!(&tree.get(link).kind, NodeKind::WebLink(url) if url == "http://example.com"));
    }

    #[test]
    fn table_tcc_opens_new_row_on_column_boundary() {
        let tree = parse(r"\tab{\tcn2 a\tcc b\tcc c\tcc d}").unwrap();
        let root = tree.root();
        let table = tree.get(root).children[0];
        match &tree.get(table).kind {
            NodeKind::Table(Some(shape)) => {
                assert_eq!(shape.columns, 2);
                assert_eq!(shape.rows, 2);
                assert_eq!(shape.cells.len(), 4);
            }
            other => panic!("expected a built table shape, got {other:?}"),
        }
    }

    #[test]
    fn table_ter_increments_previous_cell_hspan() {
        let tree = parse(r"\tab{\tcn2 first\tcc\ter second\tcc third}").unwrap();
        let root = tree.root();
        let table = tree.get(root).children[0];
        match &tree.get(table).kind {
            NodeKind::Table(Some(shape)) => {
                assert_eq!(shape.cells.len(), 3);
                assert!(shape.hmerged[1]);
                assert_eq!(shape.hspans[0], 1);
            }
            other => panic!("expected a built table shape, got {other:?}"),
        }
    }
}
