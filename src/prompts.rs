//! Instruction text for structured product-sheet extraction.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the JSON shape described to the model must
//!    match [`crate::schema`] exactly; keeping the description in one place
//!    makes drift easy to spot in review.
//!
//! 2. **Testability** — unit tests can inspect the instruction text directly
//!    without a running model, so prompt regressions (a dropped field, a
//!    renamed status) are caught cheaply.
//!
//! Callers can override the default via
//! [`crate::config::ExtractionConfig::system_prompt`]; the constants here are
//! used only when no override is provided.

/// Default system prompt for extracting a product sheet into JSON.
///
/// The allergen instructions are deliberately procedural: allergen tables
/// are the single most common extraction mistake, with models reading the
/// mark from the wrong column. The status strings `Oui`/`Traces`/`Non` are
/// the wire values of [`crate::schema::AllergenStatus`] and must not change.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert at extracting data from food product technical sheets.

Analyse the sheet content provided by the user and return ONE JSON object with exactly this structure:

{
  "product_name": "string",
  "ean_code": "string or null",
  "ingredients": ["list of strings"],
  "additives": ["list of strings"],
  "allergens": [{"name": "string", "status": "Oui|Traces|Non"}],
  "nutritional_values": [{"name": "string", "per_100g": "string or null", "per_100ml_prepared": "string or null"}],
  "vegetarian_suitable": true, false or null,
  "vegan_suitable": true, false or null,
  "gmo_free": true, false or null,
  "organic_product": true, false or null,
  "manufacturer_contact": {"name": "string or null", "address": "string or null", "phone": "string or null", "email": "string or null", "website": "string or null"} or null
}

EAN CODES:
- ean_code is the product's main EAN code (EAN 13 / GENCOD), usually 13 digits.
- Look in sections named "Etiquetage", "Marquage", "Colisage", in barcode
  tables, and on lines mentioning "EAN" or "GENCOD".

ALLERGEN TABLES — read them methodically:
- A typical table has the columns "Oui", "Traces", "Non".
- For each allergen row, find EXACTLY which column contains the mark ("x").
- Mark under "Oui" -> status "Oui". Mark under "Traces" -> status "Traces".
  Mark under "Non" -> status "Non".
- Count columns from the left and read row by row; do not guess from similar
  allergen names.

NUTRITIONAL VALUES:
- Copy values as written, with their units ("1 250 kJ", "< 0,5 g").
- Never convert or normalise numbers.

GENERAL RULES:
- Extract every piece of information available, even partial.
- For booleans use true/false, or null when the sheet does not say.
- Use [] for lists with nothing found, never null.
- Use null for unknown optional strings.
- Respond ONLY with the JSON object, no commentary, no code fences."#;

/// Build the user message for one sheet.
pub fn user_message(sheet_text: &str) -> String {
    format!(
        "Here is the content of a product technical sheet to analyse:\n\n{sheet_text}\n\n\
         Extract the information following the requested JSON structure."
    )
}

/// Build the repair hint appended to the system prompt on a retry.
///
/// Quoting the concrete failure reason biases the next generation toward a
/// fixable output — "previous output was invalid JSON: expected `,` at line 12"
/// works far better than a bare "try again".
pub fn repair_hint(reason: &str) -> String {
    format!(
        "\n\nIMPORTANT: your previous response was rejected: {reason}. \
         Return a corrected JSON object that follows the structure above exactly."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_names_every_schema_field() {
        for field in [
            "product_name",
            "ean_code",
            "ingredients",
            "additives",
            "allergens",
            "nutritional_values",
            "vegetarian_suitable",
            "vegan_suitable",
            "gmo_free",
            "organic_product",
            "manufacturer_contact",
        ] {
            assert!(
                DEFAULT_SYSTEM_PROMPT.contains(field),
                "prompt is missing field {field}"
            );
        }
    }

    #[test]
    fn default_prompt_uses_wire_status_values() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("Oui|Traces|Non"));
    }

    #[test]
    fn repair_hint_quotes_the_reason() {
        let hint = repair_hint("invalid JSON: trailing comma");
        assert!(hint.contains("trailing comma"));
        assert!(hint.contains("rejected"));
    }

    #[test]
    fn user_message_embeds_the_sheet_text() {
        let msg = user_message("COMPOTE POMME — ingredients: pommes 97%");
        assert!(msg.contains("pommes 97%"));
    }
}
