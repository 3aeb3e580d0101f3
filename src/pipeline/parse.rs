//! Parsing and validation of raw model output.
//!
//! ## Why is this defensive?
//!
//! Even with `format: "json"` forced at the backend, local models routinely
//! produce output that is *syntactically* JSON but structurally off: the
//! object wrapped in markdown fences, a list field returned as a bare string,
//! numbers where strings belong, allergen rows with invented status labels.
//! This module repairs the cheap, mechanical defects deterministically and
//! reports everything else as a validation failure whose message doubles as
//! the repair hint for the next attempt.
//!
//! A parse failure never panics and never loses the reason: the reason text
//! is exactly what gets fed back to the model.

use crate::error::ItemError;
use crate::schema::{
    Allergen, AllergenStatus, ManufacturerContact, NutritionalValue, ProductRecord,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

/// ```json ... ``` fences around the whole payload, with or without the
/// language tag.
static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("static regex"));

/// EAN/GTIN codes are 8–14 digits. Anything else is kept but flagged.
static EAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{8,14}$").expect("static regex"));

/// Parse one model completion into a validated record.
///
/// On success returns the record plus any warnings collected while repairing
/// lenient fields. On failure returns an [`ItemError`] whose message is safe
/// to feed back to the model as a repair hint.
pub fn parse_model_output(
    raw: &str,
    source_file: &str,
) -> Result<(ProductRecord, Vec<String>), ItemError> {
    let payload = isolate_json(raw).ok_or_else(|| ItemError::ValidationFailed {
        reason: "response contained no JSON object".into(),
    })?;

    let sheet: RawSheet =
        serde_json::from_str(payload).map_err(|e| ItemError::ValidationFailed {
            reason: format!("invalid JSON: {e}"),
        })?;

    sheet.into_record(source_file)
}

/// Strip fences and isolate the outermost `{ … }` object.
///
/// Models that ignore the "no fences" instruction, or that prepend prose,
/// are common enough that cutting to the braces is cheaper than burning a
/// retry on them.
fn isolate_json(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let unfenced = FENCE_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());

    if unfenced.starts_with('{') && unfenced.ends_with('}') {
        return Some(unfenced);
    }
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    (end > start).then(|| &unfenced[start..=end])
}

// ── Lenient intermediate shapes ──────────────────────────────────────────

/// A string field the model may emit as a JSON number (EAN codes, nutrition
/// values).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Int(u64),
    Float(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::Text(s) => s,
            StringOrNumber::Int(n) => n.to_string(),
            StringOrNumber::Float(f) => f.to_string(),
        }
    }
}

/// A list field the model may emit as a single bare string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<String>),
    One(String),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(s) => vec![s],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSheet {
    product_name: Option<String>,
    ean_code: Option<StringOrNumber>,
    ingredients: Option<OneOrMany>,
    additives: Option<OneOrMany>,
    // Entry-level leniency: one malformed row must not sink the whole parse.
    allergens: Option<Vec<serde_json::Value>>,
    nutritional_values: Option<Vec<serde_json::Value>>,
    vegetarian_suitable: Option<bool>,
    vegan_suitable: Option<bool>,
    gmo_free: Option<bool>,
    organic_product: Option<bool>,
    manufacturer_contact: Option<RawContact>,
}

/// Contact keys arrive in English or, from sheets quoted verbatim, in French.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawContact {
    #[serde(alias = "nom")]
    name: Option<String>,
    #[serde(alias = "adresse")]
    address: Option<String>,
    #[serde(alias = "telephone")]
    phone: Option<String>,
    email: Option<String>,
    #[serde(alias = "site_web")]
    website: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAllergen {
    name: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct RawNutritional {
    name: String,
    #[serde(default)]
    per_100g: Option<StringOrNumber>,
    #[serde(default)]
    per_100ml_prepared: Option<StringOrNumber>,
}

impl RawSheet {
    fn into_record(self, source_file: &str) -> Result<(ProductRecord, Vec<String>), ItemError> {
        let product_name = self
            .product_name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ItemError::IncompleteRecord {
                field: "product_name",
            })?;

        let mut warnings = Vec::new();

        let ean_code = self
            .ean_code
            .map(StringOrNumber::into_string)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(ref ean) = ean_code {
            if !EAN_RE.is_match(ean) {
                warnings.push(format!("EAN code '{ean}' does not look like an EAN/GTIN"));
            }
        }

        let allergens = convert_entries(
            self.allergens,
            "allergens",
            &mut warnings,
            |raw: RawAllergen, warnings| {
                let status = match raw.status.trim() {
                    s if s.eq_ignore_ascii_case("oui") => AllergenStatus::Present,
                    s if s.eq_ignore_ascii_case("traces") => AllergenStatus::Traces,
                    s if s.eq_ignore_ascii_case("non") => AllergenStatus::Absent,
                    other => {
                        warnings.push(format!(
                            "allergen '{}' dropped: unknown status '{other}'",
                            raw.name
                        ));
                        return None;
                    }
                };
                Some(Allergen {
                    name: raw.name,
                    status,
                })
            },
        );

        let nutritional_values = convert_entries(
            self.nutritional_values,
            "nutritional_values",
            &mut warnings,
            |raw: RawNutritional, _| {
                Some(NutritionalValue {
                    name: raw.name,
                    per_100g: raw.per_100g.map(StringOrNumber::into_string),
                    per_100ml_prepared: raw.per_100ml_prepared.map(StringOrNumber::into_string),
                })
            },
        );

        let manufacturer_contact = self
            .manufacturer_contact
            .map(|c| ManufacturerContact {
                name: c.name,
                address: c.address,
                phone: c.phone,
                email: c.email,
                website: c.website,
            })
            .filter(|c| !c.is_empty());

        let record = ProductRecord {
            product_name,
            ean_code,
            ingredients: self.ingredients.map(OneOrMany::into_vec).unwrap_or_default(),
            additives: self.additives.map(OneOrMany::into_vec).unwrap_or_default(),
            allergens,
            nutritional_values,
            vegetarian_suitable: self.vegetarian_suitable,
            vegan_suitable: self.vegan_suitable,
            gmo_free: self.gmo_free,
            organic_product: self.organic_product,
            manufacturer_contact,
            extraction_date: Utc::now(),
            source_file: source_file.to_string(),
        };

        debug!(
            source = source_file,
            allergens = record.allergens.len(),
            nutrition_rows = record.nutritional_values.len(),
            "parsed model output"
        );
        Ok((record, warnings))
    }
}

/// Convert a list of raw JSON entries one by one, dropping (and warning
/// about) rows that don't deserialise instead of failing the whole sheet.
fn convert_entries<R, T>(
    entries: Option<Vec<serde_json::Value>>,
    field: &str,
    warnings: &mut Vec<String>,
    convert: impl Fn(R, &mut Vec<String>) -> Option<T>,
) -> Vec<T>
where
    R: serde::de::DeserializeOwned,
{
    entries
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<R>(value) {
            Ok(raw) => convert(raw, warnings),
            Err(e) => {
                warnings.push(format!("{field} entry dropped: {e}"));
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "product_name": "Compote pomme abricot",
        "ean_code": "3288310840869",
        "ingredients": ["pommes 70%", "abricots 25%", "sucre"],
        "additives": [],
        "allergens": [{"name": "Sulfites", "status": "Traces"}],
        "nutritional_values": [{"name": "Énergie", "per_100g": "285 kJ"}],
        "vegetarian_suitable": true,
        "manufacturer_contact": {"name": "Charles & Alice", "phone": "+33 4 75 00 00 00"}
    }"#;

    #[test]
    fn parses_a_well_formed_response() {
        let (record, warnings) = parse_model_output(VALID, "compote.pdf").unwrap();
        assert_eq!(record.product_name, "Compote pomme abricot");
        assert_eq!(record.ean_code.as_deref(), Some("3288310840869"));
        assert_eq!(record.ingredients.len(), 3);
        assert_eq!(record.allergens[0].status, AllergenStatus::Traces);
        assert_eq!(record.source_file, "compote.pdf");
        assert!(warnings.is_empty());
    }

    #[test]
    fn strips_markdown_fences() {
        let fenced = format!("```json\n{VALID}\n```");
        let (record, _) = parse_model_output(&fenced, "x.pdf").unwrap();
        assert_eq!(record.product_name, "Compote pomme abricot");
    }

    #[test]
    fn isolates_object_from_surrounding_prose() {
        let chatty = format!("Here is the extracted data:\n{VALID}\nLet me know!");
        let (record, _) = parse_model_output(&chatty, "x.pdf").unwrap();
        assert_eq!(record.product_name, "Compote pomme abricot");
    }

    #[test]
    fn coerces_bare_string_to_list() {
        let raw = r#"{"product_name": "Sirop", "ingredients": "sucre de canne"}"#;
        let (record, _) = parse_model_output(raw, "x.pdf").unwrap();
        assert_eq!(record.ingredients, vec!["sucre de canne".to_string()]);
    }

    #[test]
    fn coerces_numeric_ean_to_string() {
        let raw = r#"{"product_name": "Sirop", "ean_code": 3288310840869}"#;
        let (record, warnings) = parse_model_output(raw, "x.pdf").unwrap();
        assert_eq!(record.ean_code.as_deref(), Some("3288310840869"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn non_numeric_ean_is_a_warning_not_a_failure() {
        let raw = r#"{"product_name": "Sirop", "ean_code": "non communiqué"}"#;
        let (record, warnings) = parse_model_output(raw, "x.pdf").unwrap();
        assert!(record.ean_code.is_some());
        assert!(warnings.iter().any(|w| w.contains("EAN")));
    }

    #[test]
    fn missing_product_name_is_incomplete_record() {
        let raw = r#"{"ean_code": "3288310840869"}"#;
        let err = parse_model_output(raw, "x.pdf").unwrap_err();
        assert!(matches!(
            err,
            ItemError::IncompleteRecord {
                field: "product_name"
            }
        ));
    }

    #[test]
    fn blank_product_name_is_incomplete_record() {
        let raw = r#"{"product_name": "   "}"#;
        assert!(parse_model_output(raw, "x.pdf").is_err());
    }

    #[test]
    fn malformed_json_reports_the_parser_reason() {
        let err = parse_model_output(r#"{"product_name": "Sirop","#, "x.pdf").unwrap_err();
        match err {
            ItemError::ValidationFailed { reason } => {
                assert!(reason.contains("JSON"), "got: {reason}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn prose_without_json_fails_cleanly() {
        let err = parse_model_output("I could not find any product data.", "x.pdf").unwrap_err();
        assert!(matches!(err, ItemError::ValidationFailed { .. }));
    }

    #[test]
    fn unknown_allergen_status_is_dropped_with_warning() {
        let raw = r#"{
            "product_name": "Sirop",
            "allergens": [
                {"name": "Gluten", "status": "Oui"},
                {"name": "Lupin", "status": "Peut-être"}
            ]
        }"#;
        let (record, warnings) = parse_model_output(raw, "x.pdf").unwrap();
        assert_eq!(record.allergens.len(), 1);
        assert!(warnings.iter().any(|w| w.contains("Lupin")));
    }

    #[test]
    fn allergen_status_labels_are_case_insensitive() {
        let raw = r#"{
            "product_name": "Sirop",
            "allergens": [{"name": "Gluten", "status": "OUI"}]
        }"#;
        let (record, _) = parse_model_output(raw, "x.pdf").unwrap();
        assert_eq!(record.allergens[0].status, AllergenStatus::Present);
    }

    #[test]
    fn malformed_nutrition_entry_does_not_sink_the_sheet() {
        let raw = r#"{
            "product_name": "Sirop",
            "nutritional_values": [
                {"name": "Énergie", "per_100g": 285},
                "not an object"
            ]
        }"#;
        let (record, warnings) = parse_model_output(raw, "x.pdf").unwrap();
        assert_eq!(record.nutritional_values.len(), 1);
        assert_eq!(record.nutritional_values[0].per_100g.as_deref(), Some("285"));
        assert!(warnings.iter().any(|w| w.contains("nutritional_values")));
    }

    #[test]
    fn french_contact_keys_are_accepted() {
        let raw = r#"{
            "product_name": "Sirop",
            "manufacturer_contact": {"nom": "Teisseire", "telephone": "04 76 00 00 00"}
        }"#;
        let (record, _) = parse_model_output(raw, "x.pdf").unwrap();
        let contact = record.manufacturer_contact.unwrap();
        assert_eq!(contact.name.as_deref(), Some("Teisseire"));
        assert_eq!(contact.phone.as_deref(), Some("04 76 00 00 00"));
    }

    #[test]
    fn all_blank_contact_collapses_to_none() {
        let raw = r#"{
            "product_name": "Sirop",
            "manufacturer_contact": {"name": "", "phone": "  "}
        }"#;
        let (record, _) = parse_model_output(raw, "x.pdf").unwrap();
        assert!(record.manufacturer_contact.is_none());
    }

    #[test]
    fn missing_allergen_field_yields_empty_sequence() {
        let raw = r#"{"product_name": "Sirop"}"#;
        let (record, _) = parse_model_output(raw, "x.pdf").unwrap();
        assert!(record.allergens.is_empty());
        assert!(record.nutritional_values.is_empty());
    }
}
