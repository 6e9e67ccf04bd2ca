//! Variation records → sorted size entries.

use sizebar_core::{SizeEntry, VariationRecord};

/// Apparel sizes in display order.
const SIZE_RANK: &[&str] = &["XS", "S", "M", "L", "XL", "XXL", "XXXL"];

/// Position of `value` in [`SIZE_RANK`]; unranked values sort after all
/// ranked ones.
fn rank(value: &str) -> usize {
    let normalized = value.trim().to_uppercase();
    let normalized = match normalized.as_str() {
        "2XL" => "XXL",
        "3XL" => "XXXL",
        other => other,
    };
    SIZE_RANK
        .iter()
        .position(|&s| s == normalized)
        .unwrap_or(SIZE_RANK.len())
}

/// Normalizes `records` into size entries sorted by apparel rank.
///
/// Records without a size-like option are dropped. The sort is stable, so
/// equal ranks (including all unranked values) keep catalog order.
#[must_use]
pub fn extract_sizes(records: &[VariationRecord]) -> Vec<SizeEntry> {
    let mut entries: Vec<SizeEntry> = records
        .iter()
        .filter_map(|record| {
            let value = record.size_value()?;
            Some(SizeEntry {
                value: value.to_owned(),
                in_stock: record.is_in_stock(),
                variation_id: record.id.clone(),
                sku: record.sku.clone(),
                price: record.price.clone(),
            })
        })
        .collect();
    entries.sort_by_key(|e| rank(&e.value));
    entries
}
