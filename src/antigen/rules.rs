//! Rule-based antigen name cleaning
//!
//! An ordered list of regex substitutions applied one after another to the
//! accumulating string. Order is significant: later rules assume earlier ones
//! have already stripped cycle tags, prefixes and dye suffixes. Keep the CK
//! rule ahead of the CytoKRT rule.
//!
//! End-anchored rules also match just before a single trailing newline and
//! put that newline back, so the suffix is gone before the final trim runs.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::{debug, error};

use super::TARGET_ANTIGEN;

/// A single substitution: pattern, replacement, case-insensitive flag.
pub type Rule = (&'static str, &'static str, bool);

pub const RULES: &[Rule] = &[
    // Cycle numbers in brackets, e.g. CD3(2)
    (r"\(\d+\)(\n?)$", "${1}", false),
    (r"^Target:", "", true),
    (r"^Antigen", "", true),
    (r"nm(\n?)$", "${1}", false),
    // Fluorophore suffixes, e.g. -AF488
    (r"-AF\d+(\n?)$", "${1}", true),
    (r"-ArgoFlour \d+(\n?)$", "${1}", true),
    (r"^anti[\-\s]?", "", true),
    (r"^CK-", "CK", true),
    (r"CytoKRT", "cytokeratin", false),
    (r"^DAPI\-?\d+(\n?)$", "DAPI${1}", true),
    // dna followed by a cycle number
    (r"dna\d+", "DNA", true),
    (r"_\d+(\n?)$", "${1}", false),
    (r"\(D\)(\n?)$", "${1}", false),
    (r"[\s_-]+(\n?)$", "${1}", false),
];

/// Missing values in the source tables are rendered this way before cleaning.
pub const MISSING_VALUE: &str = "nan";

lazy_static! {
    static ref COMPILED_RULES: Vec<(Regex, &'static str)> = RULES
        .iter()
        .filter_map(|(pattern, replacement, case_insensitive)| {
            match RegexBuilder::new(pattern)
                .case_insensitive(*case_insensitive)
                .build()
            {
                Ok(regex) => Some((regex, *replacement)),
                Err(e) => {
                    error!(target: TARGET_ANTIGEN, "Failed to compile cleaning rule {}: {}", pattern, e);
                    None
                }
            }
        })
        .collect();
}

/// Clean a raw antigen name. Pure, total and deterministic; the result is
/// trimmed and uppercased.
pub fn clean(raw: &str) -> String {
    let mut antigen = raw.to_string();

    for (regex, replacement) in COMPILED_RULES.iter() {
        antigen = regex.replace_all(&antigen, *replacement).into_owned();
    }

    let cleaned = antigen.trim().to_uppercase();
    debug!(target: TARGET_ANTIGEN, "Cleaned '{}' to '{}'", raw, cleaned);
    cleaned
}

/// String form of a loosely typed source value, as it is fed to [`clean`].
pub fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::Null => MISSING_VALUE.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Clean any JSON value, coercing it to a string first. Never fails.
pub fn clean_value(value: &Value) -> String {
    clean(&coerce_to_string(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_rules_compile() {
        assert_eq!(COMPILED_RULES.len(), RULES.len());
    }

    #[test]
    fn test_documented_examples() {
        assert_eq!(clean("CD206/042"), "CD206/042");
        assert_eq!(clean("DAPI-1"), "DAPI");
        assert_eq!(clean("Anti-Vimentin"), "VIMENTIN");
        assert_eq!(clean("CK-8"), "CK8");
    }

    #[test]
    fn test_tags_and_prefixes() {
        assert_eq!(clean("CD3(2)"), "CD3");
        assert_eq!(clean("Target:CD45"), "CD45");
        assert_eq!(clean("target:CD45"), "CD45");
        assert_eq!(clean("Antigen KI67"), "KI67");
        assert_eq!(clean("anti CD8"), "CD8");
        assert_eq!(clean("ANTI-PD1"), "PD1");
        assert_eq!(clean("antiCD20"), "CD20");
    }

    #[test]
    fn test_suffix_before_trailing_newline() {
        assert_eq!(clean("CD3(2)\n"), "CD3");
        assert_eq!(clean("DAPI-1\n"), "DAPI");
        assert_eq!(clean("CD45-AF488\n"), "CD45");
        assert_eq!(clean("PD-L1(D)\n"), "PD-L1");
        assert_eq!(clean("Hoechst 488nm\n"), "HOECHST 488");
        // Only one trailing newline is looked past
        assert_eq!(clean("CD3(2)\n\n"), "CD3(2)");
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(clean("Hoechst 488nm"), "HOECHST 488");
        assert_eq!(clean("CD45-AF488"), "CD45");
        assert_eq!(clean("CD45-af647"), "CD45");
        assert_eq!(clean("SMA-ArgoFlour 520"), "SMA");
        assert_eq!(clean("CD4_3"), "CD4");
        assert_eq!(clean("PD-L1(D)"), "PD-L1");
        assert_eq!(clean("FOXP3 -_ "), "FOXP3");
    }

    #[test]
    fn test_normalizations() {
        assert_eq!(clean("CytoKRT19"), "CYTOKERATIN19");
        // Case-sensitive: lowercase variant is only uppercased
        assert_eq!(clean("cytokrt19"), "CYTOKRT19");
        assert_eq!(clean("DAPI2"), "DAPI");
        assert_eq!(clean("dapi-10"), "DAPI");
        assert_eq!(clean("dna1"), "DNA");
        assert_eq!(clean("DNA12"), "DNA");
    }

    #[test]
    fn test_rules_apply_sequentially() {
        // Cycle tag goes first, then the fluorophore suffix becomes trailing
        assert_eq!(clean("CD68-AF555(3)"), "CD68");
        // Prefix removal exposes the CK- rule
        assert_eq!(clean("Anti-CK-18"), "CK18");
        // Underscore-cycle suffix removal exposes trailing hyphen cleanup
        assert_eq!(clean("CD31-_2"), "CD31");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "CD3(2)",
            "Target:CD45",
            "Anti-Vimentin",
            "CK-8",
            "CytoKRT 5",
            "DAPI-1",
            "DAPI-1\n",
            "CD3(2)\n",
            "CD45-AF488\n",
            "dna3",
            "CD4_3",
            "PD-L1(D)",
            "CD206/042",
            "Ki-67",
            "  Blank  ",
            "",
        ];

        for input in inputs {
            let once = clean(input);
            assert_eq!(clean(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_total_for_odd_input() {
        assert_eq!(clean(""), "");
        assert_eq!(clean("   "), "");
        assert_eq!(clean_value(&Value::Null), "NAN");
        assert_eq!(clean_value(&json!(42)), "42");
        assert_eq!(clean_value(&json!(1.5)), "1.5");
        assert_eq!(clean_value(&json!(true)), "TRUE");
        assert_eq!(clean_value(&json!("Anti-CD3")), "CD3");
    }
}
