use crate::prompt::common::{NAMING_RULES, OUTPUT_REQUIREMENTS};

/// Keys the model is asked to fill in, in order.
pub const RESPONSE_FIELDS: [&str; 3] = ["original_string", "harmonized_gene_name", "common_name"];

/// Generate the prompt asking the model to harmonize one cleaned antigen into
/// a gene name, answered as a three-field JSON dictionary.
pub fn antigen_harmonization_prompt(antigen: &str) -> String {
    format!(
        r#"
Task:

- Extract and harmonize the gene name from a given input string, and represent
the information in a JSON dictionary format.
- The string might include additional identifiers or tags which should be separated from the main gene identifier.
{rules}
Input: Provide a string that contains a gene name, potentially mixed with additional
codes or identifiers (e.g., "CD206/042").

Instructions:

- Clearly identify the primary gene name from the string, disregarding any non-standard
identifiers or codes appended to it.

- Output the results as a JSON dictionary with specific fields. No programming or
script writing is required; simply fill in the JSON structure provided below.

The JSON dictionary should include:

- original_string: The exact input string.
- harmonized_gene_name: The standardized gene name derived from the input.
- common_name: The widely accepted common name of the gene, if available.

Expected Output:

- Directly provide a JSON dictionary with the fields filled as specified above.
- Do not generate Python or any other programming code to create this dictionary.

Example:

If the input is "CD206/042", you should directly provide:

```json
{{
"original_string": "CD206/042",
"harmonized_gene_name": "CD206",
"common_name": "Mannose receptor"
}}
```
{requirements}
Input antigen:

```
{antigen}
```
"#,
        rules = NAMING_RULES,
        requirements = OUTPUT_REQUIREMENTS,
        antigen = antigen
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_antigen_last() {
        let prompt = antigen_harmonization_prompt("VIMENTIN");
        let tail = prompt.rsplit("Input antigen:").next().unwrap();
        assert!(tail.contains("```\nVIMENTIN\n```"));
    }

    #[test]
    fn test_prompt_requests_all_fields() {
        let prompt = antigen_harmonization_prompt("CD3");
        for field in RESPONSE_FIELDS {
            assert!(prompt.contains(&format!("- {}:", field)), "missing {}", field);
        }
        assert!(prompt.contains("\"Nuclear\""));
        assert!(prompt.contains("\"Secondary Antibody\""));
        assert!(prompt.contains("\"Ki-67\""));
        assert!(prompt.contains("pan-cytokeratin"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        assert_eq!(
            antigen_harmonization_prompt("CK8"),
            antigen_harmonization_prompt("CK8")
        );
        // Example braces are literal, not format placeholders
        assert!(antigen_harmonization_prompt("CK8").contains("{\n\"original_string\": \"CD206/042\""));
    }
}
