//! Thin DSL (ABBYY Lingvo/GoldenDict source format) serialization
//! interface. Writing the final `.dsl.dz`/zip container is out of scope
//! for this crate -- what's here is the narrow, format-correctness-bearing
//! part: the header lines, the heading/article record shape, DSL's
//! required escaping and leading-whitespace rules, and a `ResourceSink`
//! hand-off point for overlay/resource bytes, exposed as traits so a
//! caller can plug in its own output sink.

use std::io::{self, Write};

/// Receives the resource files (bitmap icons, overlay pictures, sounds,
/// tables) a conversion turns up as it goes, so the caller can decide how
/// to store them -- a `.dsl.files.zip` sibling archive, a loose directory,
/// or nothing at all -- without this crate needing to depend on a zip
/// implementation itself.
pub trait ResourceSink {
    fn add_resource(&mut self, name: &str, bytes: &[u8]);
}

/// A `ResourceSink` that discards everything handed to it, for callers that
/// only want the `.dsl` text and don't care about resource files.
pub struct NullResourceSink;

impl ResourceSink for NullResourceSink {
    fn add_resource(&mut self, _name: &str, _bytes: &[u8]) {}
}

impl ResourceSink for Vec<(String, Vec<u8>)> {
    fn add_resource(&mut self, name: &str, bytes: &[u8]) {
        self.push((name.to_string(), bytes.to_vec()));
    }
}

/// One dictionary entry ready to be written: a group of heading lines
/// (already collapsed/grouped, `C6`/`C13`) sharing one rendered article
/// body. The body is plain text already in DSL's own markup -- rendering
/// Duden's/Lingvo's tag trees into that markup is the caller's job.
pub struct DslEntry<'a> {
    pub headings: &'a [String],
    pub body: &'a str,
}

/// Escape a heading or body line per DSL's rules: `[`, `]`, `{`, `}`, and
/// `\` are backslash-escaped; a line that would otherwise start with
/// whitespace gets it escaped too, since leading whitespace is significant
/// indentation in a `.dsl` file's article body.
pub fn escape_dsl_text(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for (i, c) in line.chars().enumerate() {
        if i == 0 && c.is_whitespace() {
            out.push('\\');
            out.push(c);
            continue;
        }
        match c {
            '[' | ']' | '{' | '}' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out
}

/// Writes a `.dsl` stream: UTF-16LE with a BOM, `\r\n` line endings, as
/// GoldenDict and Lingvo both expect.
pub struct DslWriter<W> {
    out: W,
    wrote_bom: bool,
}

impl<W: Write> DslWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, wrote_bom: false }
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        if !self.wrote_bom {
            self.out.write_all(&[0xFF, 0xFE])?;
            self.wrote_bom = true;
        }
        for unit in line.encode_utf16() {
            self.out.write_all(&unit.to_le_bytes())?;
        }
        for unit in "\r\n".encode_utf16() {
            self.out.write_all(&unit.to_le_bytes())?;
        }
        Ok(())
    }

    /// Write the two mandatory header lines every `.dsl` file starts with.
    pub fn write_header(&mut self, name: &str, index_language: &str, contents_language: &str) -> io::Result<()> {
        self.write_line(&format!("#NAME\t\"{}\"", escape_dsl_text(name)))?;
        self.write_line(&format!("#INDEX_LANGUAGE\t\"{}\"", escape_dsl_text(index_language)))?;
        self.write_line(&format!("#CONTENTS_LANGUAGE\t\"{}\"", escape_dsl_text(contents_language)))
    }

    /// Write the optional `#ICON_FILE` header line naming the dictionary's
    /// icon inside its resource archive (only emitted when one exists).
    pub fn write_icon_file(&mut self, icon_name: &str) -> io::Result<()> {
        self.write_line(&format!("#ICON_FILE\t\"{}\"", escape_dsl_text(icon_name)))
    }

    /// Write one entry: each heading on its own unindented line, followed
    /// by the (already-rendered) body with a single leading tab per line,
    /// DSL's article-body indentation convention.
    pub fn write_entry(&mut self, entry: &DslEntry) -> io::Result<()> {
        for heading in entry.headings {
            self.write_line(&escape_dsl_text(heading))?;
        }
        for body_line in entry.body.lines() {
            self.write_line(&format!("\t{}", escape_dsl_text(body_line)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_bracket_and_backslash_characters() {
        assert_eq!(escape_dsl_text("a[b]c{d}e\\f"), "a\\[b\\]c\\{d\\}e\\\\f");
    }

    #[test]
    fn escapes_leading_whitespace() {
        assert_eq!(escape_dsl_text(" indented"), "\\ indented");
    }

    #[test]
    fn vec_resource_sink_collects_added_resources() {
        let mut sink: Vec<(String, Vec<u8>)> = Vec::new();
        sink.add_resource("icon.bmp", &[1, 2, 3]);
        assert_eq!(sink, vec![("icon.bmp".to_string(), vec![1, 2, 3])]);
    }

    #[test]
    fn writes_icon_file_header_line() {
        let mut buf = Vec::new();
        {
            let mut w = DslWriter::new(&mut buf);
            w.write_header("Test Dict", "EN", "EN").unwrap();
            w.write_icon_file("icon.bmp").unwrap();
        }
        let text: Vec<u16> =
            buf[2..].chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
        let s = String::from_utf16(&text).unwrap();
        assert!(s.contains("#ICON_FILE\t\"icon.bmp\""));
    }

    #[test]
    fn writes_bom_once_across_multiple_lines() {
        let mut buf = Vec::new();
        {
            let mut w = DslWriter::new(&mut buf);
            w.write_header("Test Dict", "EN", "EN").unwrap();
            w.write_entry(&DslEntry { headings: &["word".to_string()], body: "meaning" }).unwrap();
        }
        assert_eq!(&buf[0..2], &[0xFF, 0xFE]);
        let bom_count = buf.windows(2).filter(|w| *w == [0xFF, 0xFE]).count();
        assert_eq!(bom_count, 1);
    }
}
