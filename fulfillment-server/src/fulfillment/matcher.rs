//! Product name matching
//!
//! Marketplace listings rarely carry the exact registered product name, so
//! resolution falls back to substring containment in both directions.

use shared::models::Product;

/// Resolve a reported product name against the active products
///
/// Preference: exact name, then a registered name contained in the reported
/// one, then the reported name contained in a registered one. Within each
/// step the first product (registration order) wins.
pub fn resolve_product<'a>(products: &'a [Product], reported: &str) -> Option<&'a Product> {
    let reported = reported.trim();
    if reported.is_empty() {
        return None;
    }
    let reported_lower = reported.to_lowercase();

    let candidates = || {
        products
            .iter()
            .filter(|p| p.is_active && !p.name.trim().is_empty())
    };

    candidates()
        .find(|p| p.name.trim() == reported)
        .or_else(|| candidates().find(|p| reported_lower.contains(&p.name.trim().to_lowercase())))
        .or_else(|| candidates().find(|p| p.name.trim().to_lowercase().contains(&reported_lower)))
}
