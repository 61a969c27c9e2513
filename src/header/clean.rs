use deunicode::deunicode_char;
use once_cell::sync::Lazy;
use regex::Regex;

/// Label emitted for a blank cell.
pub const SENTINEL: &str = "x";
/// Joins words inside a label and the two halves of a merged label.
pub const SEPARATOR: char = '_';

/// Separator + digits + anything: the suffix a naive reader appends to make
/// duplicate names unique (`b_1`, `b_2`).
static DISAMBIGUATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_[0-9]+.*$").expect("disambiguator pattern should parse"));

/// Normalize a raw column label into a snake_case identifier.
///
/// Lower-cases, folds every letter to ASCII (`ł` → `l`, `œ` → `oe`),
/// collapses every non-alphanumeric run into `_`, and strips a trailing
/// numeric disambiguator. A blank label becomes [`SENTINEL`]; a label
/// starting with a digit gets an `x` prefix.
pub fn clean_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    let mut push = |c: char, out: &mut String| {
        if !c.is_ascii_alphanumeric() {
            pending_sep = true;
            return;
        }
        if pending_sep && !out.is_empty() {
            out.push(SEPARATOR);
        }
        pending_sep = false;
        out.push(c.to_ascii_lowercase());
    };

    for c in raw.trim().to_lowercase().chars() {
        if c.is_ascii() || !c.is_alphanumeric() {
            push(c, &mut out);
            continue;
        }
        match deunicode_char(c) {
            Some(folded) => folded.chars().for_each(|f| push(f, &mut out)),
            None => push(' ', &mut out),
        }
    }

    if out.is_empty() {
        return SENTINEL.to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, SENTINEL);
    }
    DISAMBIGUATOR.replace(&out, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_collapses_runs() {
        assert_eq!(clean_name("Erststimmen"), "erststimmen");
        assert_eq!(clean_name("  Wahl-Bezirk / Nr. "), "wahl_bezirk_nr");
        assert_eq!(clean_name("a__b"), "a_b");
    }

    #[test]
    fn folds_diacritics() {
        assert_eq!(clean_name("Gültig"), "gultig");
        assert_eq!(clean_name("Straße"), "strasse");
        assert_eq!(clean_name("Ungültige Stimmen"), "ungultige_stimmen");
    }

    #[test]
    fn folds_letters_outside_western_europe() {
        assert_eq!(clean_name("Łódź Stimmen"), "lodz_stimmen");
        assert_eq!(clean_name("Žatec"), "zatec");
        assert_eq!(clean_name("Œuvre"), "oeuvre");
        assert_eq!(clean_name("Æbeltoft"), "aebeltoft");
    }

    #[test]
    fn symbols_still_separate() {
        assert_eq!(clean_name("Anteil in %"), "anteil_in");
        assert_eq!(clean_name("Fläche (ha)"), "flache_ha");
    }

    #[test]
    fn blank_becomes_sentinel() {
        assert_eq!(clean_name(""), SENTINEL);
        assert_eq!(clean_name("   "), SENTINEL);
        assert_eq!(clean_name("---"), SENTINEL);
    }

    #[test]
    fn strips_numeric_disambiguator() {
        assert_eq!(clean_name("B_1"), "b");
        assert_eq!(clean_name("B_2"), "b");
        assert_eq!(clean_name("b_12_extra"), "b");
        assert_eq!(clean_name("x_3"), "x");
    }

    #[test]
    fn leading_digit_gets_prefix() {
        assert_eq!(clean_name("2021"), "x2021");
        assert_eq!(clean_name("2021 Anteil"), "x2021_anteil");
    }
}
