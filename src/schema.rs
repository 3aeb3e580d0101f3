//! Record types for extracted product sheets.
//!
//! The JSON field names and enum string values defined here are a wire
//! contract: downstream consumers parse result files by name, and the
//! allergen statuses keep the French labels (`"Oui"` / `"Traces"` / `"Non"`)
//! that appear in the source documents. Do not rename fields without
//! versioning the output format.
//!
//! A [`ProductRecord`] is immutable once produced by the extractor: the
//! confidence scorer reads it, the orchestrator serialises it, and a re-run
//! produces a fresh record with a new `extraction_date` rather than updating
//! an existing one in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Presence classification for a named allergen.
///
/// Serialised with the labels used on French product sheets, which are also
/// the values downstream consumers match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllergenStatus {
    /// The allergen is an ingredient of the product.
    #[serde(rename = "Oui")]
    Present,
    /// Possible cross-contamination traces.
    #[serde(rename = "Traces")]
    Traces,
    /// Explicitly declared absent.
    #[serde(rename = "Non")]
    Absent,
}

/// One allergen row from the product sheet's allergen table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allergen {
    pub name: String,
    pub status: AllergenStatus,
}

/// One nutrition row. Values stay as free text with embedded units
/// (`"1 800 kJ"`, `"< 0,5 g"`) — source formatting varies too much for
/// reliable numeric normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionalValue {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_100g: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_100ml_prepared: Option<String>,
}

/// Manufacturer contact block. Every field is optional — sheets rarely
/// carry all five.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManufacturerContact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl ManufacturerContact {
    /// True when no field carries a non-blank value.
    pub fn is_empty(&self) -> bool {
        [
            &self.name,
            &self.address,
            &self.phone,
            &self.email,
            &self.website,
        ]
        .iter()
        .all(|f| f.as_deref().map_or(true, |s| s.trim().is_empty()))
    }
}

/// A fully extracted product sheet.
///
/// Sequence fields are always present in the serialised form — an empty list
/// means "nothing found", never `null`. `product_name` is the only required
/// field; the extractor refuses to produce a record without it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ean_code: Option<String>,

    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub additives: Vec<String>,
    #[serde(default)]
    pub allergens: Vec<Allergen>,
    #[serde(default)]
    pub nutritional_values: Vec<NutritionalValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vegetarian_suitable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vegan_suitable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gmo_free: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organic_product: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_contact: Option<ManufacturerContact>,

    pub extraction_date: DateTime<Utc>,
    pub source_file: String,
}

/// Terminal state of one extraction attempt sequence.
///
/// Invariants:
/// * `success == record.is_some()`
/// * `confidence_score` is meaningful only when `success`; it is `0.0` on
///   failure
/// * a failed result always has a non-empty `errors` list
///
/// Failure reasons from earlier attempts are retained in `errors` even when
/// a later attempt succeeded — they are diagnostics, and `success` is the
/// authority on the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<ProductRecord>,
    pub confidence_score: f64,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ExtractionResult {
    /// A successful result. `prior_errors` carries the failure reasons of
    /// attempts that preceded the one that succeeded.
    pub fn succeeded(
        record: ProductRecord,
        confidence_score: f64,
        prior_errors: Vec<String>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            success: true,
            record: Some(record),
            confidence_score,
            errors: prior_errors,
            warnings,
        }
    }

    /// A failed result. `errors` must name at least one reason.
    pub fn failed(errors: Vec<String>, warnings: Vec<String>) -> Self {
        debug_assert!(!errors.is_empty(), "failed result without a reason");
        Self {
            success: false,
            record: None,
            confidence_score: 0.0,
            errors,
            warnings,
        }
    }
}
