//! `$name` / `${name}` placeholder templates.
//!
//! Substitution is "safe": placeholders without a value are left in the
//! output untouched, so rendering never fails on a missing key. `$$` is an
//! escaped literal dollar, and a `$` that does not start a valid placeholder
//! is kept as-is.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Regex pattern for one `$` construct. Exactly one group participates in
/// every match: `escaped` (`$$`), `named` (`$id`), `braced` (`${id}`) or the
/// empty `invalid` group for a lone `$`.
pub const TEMPLATE_PATTERN: &str = r"\$(?:(?P<escaped>\$)|(?P<named>[_a-zA-Z][_a-zA-Z0-9]*)|\{(?P<braced>[_a-zA-Z][_a-zA-Z0-9]*)\}|(?P<invalid>))";

static TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TEMPLATE_PATTERN).expect("valid regex"));

fn identifier<'t>(caps: &Captures<'t>) -> Option<&'t str> {
    caps.name("named")
        .or_else(|| caps.name("braced"))
        .map(|m| m.as_str())
}

/// Identifiers referenced by `template`, in first-occurrence order with
/// duplicates removed.
pub fn extract_identifiers(template: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for caps in TEMPLATE_RE.captures_iter(template) {
        if let Some(name) = identifier(&caps) {
            if !ids.iter().any(|id| id == name) {
                ids.push(name.to_string());
            }
        }
    }
    ids
}

/// Replace every placeholder present in `env` with its value.
///
/// Placeholders absent from `env` keep their original spelling (`$x` or
/// `${x}`), `$$` becomes `$`, and a lone `$` stays a `$`.
pub fn substitute(template: &str, env: &HashMap<String, String>) -> String {
    TEMPLATE_RE
        .replace_all(template, |caps: &Captures| {
            if caps.name("escaped").is_some() {
                return "$".to_string();
            }
            match identifier(caps) {
                Some(name) => env
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string()),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn extracts_named_and_braced_in_first_occurrence_order() {
        let ids = extract_identifiers("${out}.png $input -o $out --size=${w}x$h");
        assert_eq!(ids, vec!["out", "input", "w", "h"]);
    }

    #[test]
    fn extracts_nothing_from_plain_text() {
        assert!(extract_identifiers("ls -la").is_empty());
    }

    #[test]
    fn escaped_dollar_is_not_an_identifier() {
        assert!(extract_identifiers("$$").is_empty());
        assert!(extract_identifiers("cost: $$HOME").is_empty());
        assert_eq!(substitute("$$", &env(&[])), "$");
        assert_eq!(substitute("$$HOME", &env(&[("HOME", "x")])), "$HOME");
    }

    #[test]
    fn substitutes_known_identifiers() {
        let rendered = substitute(
            "convert $input ${name}_small.png",
            &env(&[("input", "in.png"), ("name", "thumb")]),
        );
        assert_eq!(rendered, "convert in.png thumb_small.png");
    }

    #[test]
    fn leaves_missing_identifiers_untouched() {
        let rendered = substitute("$known $unknown ${braced}", &env(&[("known", "k")]));
        assert_eq!(rendered, "k $unknown ${braced}");
    }

    #[test]
    fn lone_dollar_is_kept_literally() {
        assert!(extract_identifiers("price $5 and ${1x} and $").is_empty());
        assert_eq!(
            substitute("price $5 and ${1x} and $", &env(&[])),
            "price $5 and ${1x} and $"
        );
    }

    #[test]
    fn identifier_stops_at_first_non_word_character() {
        assert_eq!(extract_identifiers("$a-b $c.d"), vec!["a", "c"]);
        assert_eq!(
            substitute("$a-b", &env(&[("a", "1"), ("b", "2")])),
            "1-b"
        );
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let rendered = substitute("$a", &env(&[("a", "$b"), ("b", "nope")]));
        assert_eq!(rendered, "$b");
    }
}
