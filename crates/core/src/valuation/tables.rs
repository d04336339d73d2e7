// Lookup tables for the valuation heuristics. Keys are lowercase and matched as substrings of the
// lowercased location; table order is the tie-break when several keys match.

pub const DEFAULT_BASE_PRICE_PER_SQM: f64 = 3500.0;

pub const BASE_PRICES_PER_SQM: [(&str, f64); 12] = [
    ("barcelona", 4500.0),
    ("badalona", 3200.0),
    ("sant adrià", 3000.0),
    ("montgat", 3800.0),
    ("el masnou", 4000.0),
    ("premià de mar", 3500.0),
    ("vilassar de mar", 3600.0),
    ("mataró", 2800.0),
    ("calella", 2500.0),
    ("sitges", 5500.0),
    ("castelldefels", 4200.0),
    ("gavà", 3400.0),
];

/// Localities with enough comparables to raise confidence.
pub const KNOWN_LOCALITIES: [&str; 5] = ["barcelona", "badalona", "sitges", "mataró", "calella"];

pub const PREMIUM_RENTAL_LOCALITIES: [&str; 2] = ["barcelona", "sitges"];
pub const COASTAL_RENTAL_LOCALITIES: [&str; 2] = ["badalona", "maresme"];

pub const BASE_RENTAL_RATE: f64 = 0.006;
pub const PREMIUM_RENTAL_RATE: f64 = 0.007;
pub const COASTAL_RENTAL_RATE: f64 = 0.0065;

pub const ANNUAL_APPRECIATION: f64 = 0.04;

pub fn normalize_location(location: &str) -> String {
    location.to_lowercase()
}

pub fn mentions(normalized_location: &str, key: &str) -> bool {
    normalized_location.contains(key)
}

pub fn mentions_any(normalized_location: &str, keys: &[&str]) -> bool {
    keys.iter().any(|k| mentions(normalized_location, k))
}

/// Base price per m² for a location: the first table entry contained in it, else the default.
pub fn base_price_per_sqm(location: &str) -> f64 {
    let normalized = normalize_location(location);
    BASE_PRICES_PER_SQM
        .iter()
        .find(|(key, _)| mentions(&normalized, key))
        .map(|(_, price)| *price)
        .unwrap_or(DEFAULT_BASE_PRICE_PER_SQM)
}

pub fn size_multiplier(surface: f64) -> f64 {
    if surface <= 40.0 {
        1.1
    } else if surface <= 70.0 {
        1.0
    } else if surface <= 100.0 {
        0.98
    } else if surface <= 150.0 {
        0.95
    } else {
        0.92
    }
}

pub fn beach_multiplier(distance_km: f64) -> f64 {
    if distance_km <= 0.5 {
        1.2
    } else if distance_km <= 1.0 {
        1.1
    } else if distance_km <= 2.0 {
        1.05
    } else {
        1.0
    }
}
