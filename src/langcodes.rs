//! Language code table referenced by both the LSD header's language pair
//! and the Duden `.inf` `Language`/`TargetLanguage` fields. Neither format
//! documents its full code space; this is the commonly-seen subset, kept
//! as a lookup rather than an exhaustive enum so an unrecognised code
//! degrades to its raw numeric/string form instead of failing the whole
//! dictionary.

/// Lingvo's numeric language codes, the ones actually seen across sample
/// dictionaries. Unlisted codes are rendered as `"lang-<code>"` by
/// `name_for_lingvo_code`.
const LINGVO_CODES: &[(u16, &str)] = &[
    (1, "English"),
    (2, "German"),
    (3, "French"),
    (4, "Italian"),
    (5, "Spanish"),
    (7, "Russian"),
    (9, "Portuguese"),
    (19, "Dutch"),
    (33, "Ukrainian"),
    (34, "Polish"),
];

pub fn name_for_lingvo_code(code: u16) -> String {
    LINGVO_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("lang-{code}"))
}

/// Duden `.inf` language names are already plain strings (`"Deutsch"`,
/// `"Englisch"`); this just normalizes the handful of German-language
/// names to their English equivalent for consistent DSL header output.
const DUDEN_NAME_ALIASES: &[(&str, &str)] = &[
    ("Deutsch", "German"),
    ("Englisch", "English"),
    ("Franzoesisch", "French"),
    ("Spanisch", "Spanish"),
    ("Italienisch", "Italian"),
];

pub fn normalize_duden_language_name(raw: &str) -> String {
    DUDEN_NAME_ALIASES
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(raw))
        .map(|(_, v)| v.to_string())
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_lingvo_code_resolves_by_name() {
        assert_eq!(name_for_lingvo_code(2), "German");
    }

    #[test]
    fn unknown_lingvo_code_falls_back_to_numeric_form() {
        assert_eq!(name_for_lingvo_code(9999), "lang-9999");
    }

    #[test]
    fn duden_language_alias_normalizes() {
        assert_eq!(normalize_duden_language_name("Deutsch"), "German");
        assert_eq!(normalize_duden_language_name("Klingon"), "Klingon");
    }
}
