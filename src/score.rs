//! Confidence scoring: a completeness heuristic over extracted records.
//!
//! The score is a weighted sum over field groups. Each group contributes
//! `weight × populated/total`, where "populated" means non-null and, for
//! strings and sequences, non-empty after trimming. The weights sum to 1.0,
//! so a record with every grouped field filled scores exactly 1.0 and a
//! record with nothing filled scores exactly 0.0.
//!
//! The function is pure and deterministic: the same record always yields the
//! same score, with no dependence on the model call that produced it.
//!
//! Dietary flags (`vegetarian_suitable` etc.) do not participate: they are
//! tri-state facts, and a sheet that simply doesn't mention them is not less
//! completely extracted for it.

use crate::schema::ProductRecord;

/// Group weights. These are a documented default policy, not a calibrated
/// model: identity fields matter most to downstream consumers, followed by
/// nutrition and composition, then allergens and contact details.
const WEIGHT_IDENTITY: f64 = 0.30;
const WEIGHT_COMPOSITION: f64 = 0.20;
const WEIGHT_ALLERGENS: f64 = 0.15;
const WEIGHT_NUTRITION: f64 = 0.20;
const WEIGHT_CONTACT: f64 = 0.15;

/// Compute the confidence score for a record, in `[0, 1]`.
pub fn confidence_score(record: &ProductRecord) -> f64 {
    let identity = fraction(&[
        filled_str(&record.product_name),
        filled_opt_str(&record.ean_code),
    ]);
    let composition = fraction(&[
        !record.ingredients.is_empty(),
        !record.additives.is_empty(),
    ]);
    let allergens = fraction(&[!record.allergens.is_empty()]);
    let nutrition = fraction(&[!record.nutritional_values.is_empty()]);
    let contact = match &record.manufacturer_contact {
        None => 0.0,
        Some(c) => fraction(&[
            filled_opt_str(&c.name),
            filled_opt_str(&c.address),
            filled_opt_str(&c.phone),
            filled_opt_str(&c.email),
            filled_opt_str(&c.website),
        ]),
    };

    let score = WEIGHT_IDENTITY * identity
        + WEIGHT_COMPOSITION * composition
        + WEIGHT_ALLERGENS * allergens
        + WEIGHT_NUTRITION * nutrition
        + WEIGHT_CONTACT * contact;

    score.clamp(0.0, 1.0)
}

fn fraction(populated: &[bool]) -> f64 {
    let filled = populated.iter().filter(|&&p| p).count();
    filled as f64 / populated.len() as f64
}

fn filled_str(s: &str) -> bool {
    !s.trim().is_empty()
}

fn filled_opt_str(s: &Option<String>) -> bool {
    s.as_deref().map_or(false, |v| !v.trim().is_empty())
}
