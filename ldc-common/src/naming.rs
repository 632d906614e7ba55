//! Identity normalization
//!
//! Turns arbitrary titles ("Ampar-Ampar Pisang (Official Video)") into storage-safe
//! identifiers ("amparampar_pisang_official_video"). The identifier is the cache key used to
//! deduplicate downloads and conversions across runs, so the mapping must never change
//! between releases.

/// Separator used in place of whitespace
pub const SEPARATOR: char = '_';

/// Normalize a title into an identifier over `[a-z0-9_]`
///
/// Lower-cases, replaces whitespace runs with a single `_`, drops every character outside
/// `[a-z0-9_]` and collapses repeated `_`. Total and deterministic; applying it twice gives
/// the same result as applying it once.
///
/// # Examples
///
/// ```
/// use ldc_common::naming::normalize;
///
/// assert_eq!(normalize("Ampar Ampar Pisang"), "ampar_ampar_pisang");
/// assert_eq!(normalize("Gundul  Pacul - Lirik!"), "gundul_pacul_lirik");
/// assert_eq!(normalize(""), "");
/// ```
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for ch in text.chars().flat_map(char::to_lowercase) {
        let mapped = if ch.is_whitespace() { SEPARATOR } else { ch };

        if mapped == SEPARATOR {
            if !out.ends_with(SEPARATOR) {
                out.push(SEPARATOR);
            }
        } else if mapped.is_ascii_lowercase() || mapped.is_ascii_digit() {
            out.push(mapped);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_joins_words() {
        assert_eq!(normalize("Ampar Ampar Pisang"), "ampar_ampar_pisang");
    }

    #[test]
    fn test_collapses_whitespace_runs() {
        assert_eq!(normalize("Rasa \t Sayange\n"), "rasa_sayange_");
    }

    #[test]
    fn test_strips_punctuation_between_separators() {
        // "a _-_ b" → "a__-__b" → "a____b" → "a_b"
        assert_eq!(normalize("a _-_ b"), "a_b");
    }

    #[test]
    fn test_drops_non_ascii_letters() {
        assert_eq!(normalize("Apuse (Papua) – Lagu Daérah"), "apuse_papua_lagu_darah");
    }

    #[test]
    fn test_keeps_existing_underscores() {
        assert_eq!(normalize("Kalimantan_Selatan"), "kalimantan_selatan");
        assert_eq!(normalize("__yamko__rambe___yamko"), "_yamko_rambe_yamko");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "Ampar Ampar Pisang - Lagu Daerah Kalimantan Selatan (Lirik)",
            "  Bungong   Jeumpa  ",
            "ÁÉÍ óú 123 !!",
            "already_normal_42",
            "",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
        }
    }
}
