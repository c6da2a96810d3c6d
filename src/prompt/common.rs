// Shared instruction blocks for the antigen prompts

/// Naming conventions the model must follow when choosing a gene name.
pub const NAMING_RULES: &str = r#"
- For Nuclear markers such as DAPI, Hoechst or DNA keep the gene name as "Nuclear".
- For secondary antibody blanks such as "Goat Anti-Rabbit IGG", keep the gene name as "Secondary Antibody".
- For Blank or Empty channels, keep the gene name as "Blank".
- For Autofluorescence channels such as "Autofluorescence", keep the gene name as "Autofluorescence".
- For Ki-67 or Ki67, keep the gene name as "Ki-67" (with the hyphen where this is standard practice).
- For numeric or unknown gene names, or for NA/Nan values, set the gene name as "Unknown".
- Standardise accross common names eg Vitementin, Vimentin, VIM, Vim should all be harmonized to "VIM".
- Take care to disambiguate pan- markers and specific markers eg between pan-cytokeratin and cytokeratin 8.
"#;

/// Constraints on the shape of the answer.
pub const OUTPUT_REQUIREMENTS: &str = r#"
Output Requirements:

- Ensure the output strictly follows JSON format with the specified keys.
- The model should not produce any programming code or scripts, just a ready-to-use
JSON dictionary.
"#;
