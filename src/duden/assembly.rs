//! C13: group `.hic` leaves into articles.
//!
//! Several adjacent leaves commonly share one article (homograph groups,
//! grammatical variants of one headword) -- the shared target is encoded
//! directly in the heading text as a trailing `$$$$ a b c [d]` marker
//! rather than living in a separate table, so grouping is a regex match
//! over each leaf's decoded text, not a join against `.ld`.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::duden::container::{HicEntryType, HicHeading};

lazy_static! {
    static ref VARIANT_SUFFIX: Regex =
        Regex::new(r"^(?P<head>.*?)(?: \$\$\$\$\s+(?P<g3>-?\d+)\s(?P<g4>\d+)\s-?\d+(?P<g5>\s-?\d+)?)?$").unwrap();
}

/// One assembled article: the headings that point at it (already sorted),
/// its offset into the archive, and its decoded size -- `-1` for the last
/// article, since there's no following offset to subtract from.
#[derive(Debug, Clone)]
pub struct Article {
    pub offset: i64,
    pub size: i64,
    pub headings: Vec<String>,
}

/// Group leaves by the article offset embedded in their heading text.
///
/// A leaf whose marker carries all five regex groups is a variant-only
/// alias: its own name is folded into the target group's heading list
/// (not discarded) but it never becomes an entry of its own. Plain
/// `Variant`/`VariantWith`/`VariantWithout` leaves still establish/join a
/// group (their offset matters for sizing) but never contribute a
/// heading line to it either.
pub fn group_hic_entries(entries: &[HicHeading]) -> Vec<Article> {
    let mut by_offset: BTreeMap<i64, Vec<String>> = BTreeMap::new();

    for entry in entries {
        let caps = match VARIANT_SUFFIX.captures(&entry.text) {
            Some(c) => c,
            None => continue,
        };
        let head = caps.name("head").map(|m| m.as_str()).unwrap_or(entry.text.as_str()).to_string();
        let offset: i64 = caps
            .name("g4")
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .map(|n| n - 1)
            .unwrap_or(entry.text_offset as i64);

        let headings = by_offset.entry(offset).or_default();
        if caps.name("g5").is_some() {
            // Variant-only alias: folds its name into the target group
            // instead of becoming an entry of its own.
            headings.push(head);
            continue;
        }
        let is_variant = entry.entry_type == HicEntryType::Variant as u8
            || entry.entry_type == HicEntryType::VariantWith as u8
            || entry.entry_type == HicEntryType::VariantWithout as u8;
        if !is_variant {
            headings.push(head);
        }
    }

    let ordered: Vec<(i64, Vec<String>)> = by_offset.into_iter().collect();
    let keys: Vec<i64> = ordered.iter().map(|(k, _)| *k).collect();

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, (offset, mut headings))| {
            headings.sort();
            let size = if i + 1 < keys.len() { keys[i + 1] - offset } else { -1 };
            Article { offset, size, headings }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(text: &str, entry_type: HicEntryType, text_offset: u32) -> HicHeading {
        HicHeading { text: text.to_string(), entry_type: entry_type as u8, text_offset }
    }

    #[test]
    fn groups_plain_leaves_by_offset_and_sorts_headings() {
        let entries = vec![leaf("Birne", HicEntryType::Plain, 10), leaf("Apfel", HicEntryType::Plain, 10)];
        let articles = group_hic_entries(&entries);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].headings, vec!["Apfel", "Birne"]);
        assert_eq!(articles[0].offset, 10);
    }

    #[test]
    fn last_article_size_is_sentinel() {
        let entries = vec![leaf("A", HicEntryType::Plain, 0), leaf("B", HicEntryType::Plain, 100)];
        let articles = group_hic_entries(&entries);
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].size, 100);
        assert_eq!(articles[1].size, -1);
    }

    #[test]
    fn variant_leaves_contribute_offset_but_no_heading() {
        let entries = vec![leaf("Apfel", HicEntryType::Plain, 5), leaf("Apfelx", HicEntryType::Variant, 5)];
        let articles = group_hic_entries(&entries);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].headings, vec!["Apfel"]);
    }

    #[test]
    fn uses_marker_offset_over_leaf_text_offset() {
        let entries = vec![leaf("Apfel $$$$ 1 51 -1", HicEntryType::Plain, 999)];
        let articles = group_hic_entries(&entries);
        assert_eq!(articles[0].offset, 50);
        assert_eq!(articles[0].headings, vec!["Apfel"]);
    }

    #[test]
    fn variant_only_alias_with_five_groups_folds_name_into_target_group() {
        let entries = vec![
            leaf("Apfel $$$$ 1 51 -1", HicEntryType::Plain, 999),
            leaf("Apfelsorte $$$$ 1 51 -1 2", HicEntryType::Plain, 999),
        ];
        let articles = group_hic_entries(&entries);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].headings, vec!["Apfel", "Apfelsorte"]);
    }

    #[test]
    fn variant_entry_types_contribute_offset_but_no_heading() {
        let entries = vec![
            leaf("Apfel", HicEntryType::Plain, 5),
            leaf("Apfelig", HicEntryType::VariantWith, 5),
            leaf("Apfellos", HicEntryType::VariantWithout, 5),
        ];
        let articles = group_hic_entries(&entries);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].headings, vec!["Apfel"]);
    }
}
