//! crates/folktale_core/src/catalog.rs
//!
//! Static reference data shown next to the feed: the region explorer markers,
//! the category catalog and the fallback cover images.

use crate::domain::StoryId;

/// Number of bundled fallback cover images.
pub const FALLBACK_COVER_COUNT: i64 = 448;

/// A clickable region on the explorer map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionMarker {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

pub const REGION_MARKERS: [RegionMarker; 6] = [
    RegionMarker { name: "Africa", latitude: 1.5, longitude: 17.5 },
    RegionMarker { name: "Asia", latitude: 34.5, longitude: 100.0 },
    RegionMarker { name: "Europe", latitude: 54.0, longitude: 15.0 },
    RegionMarker { name: "North America", latitude: 54.0, longitude: -105.0 },
    RegionMarker { name: "South America", latitude: -14.0, longitude: -60.0 },
    RegionMarker { name: "Oceania", latitude: -22.0, longitude: 140.0 },
];

/// Known category keys and their display names.
pub const CATEGORIES: [(&str, &str); 4] = [
    ("myth", "Myth"),
    ("folktale", "Folktale"),
    ("legend", "Legend"),
    ("fairy", "Fairy Tale"),
];

pub const TAG_CLOUD: [&str; 7] = [
    "Myth",
    "Legend",
    "Fable",
    "Folktale",
    "Fairy Tale",
    "Story",
    "Adventure",
];

const UNKNOWN: &str = "Unknown";

/// Display name for a story's region. Known regions are matched ignoring case;
/// anything else, or no region, is "Unknown".
pub fn region_display_name(region: Option<&str>) -> String {
    let region = region.map(str::trim).unwrap_or_default();
    REGION_MARKERS
        .iter()
        .find(|m| m.name.eq_ignore_ascii_case(region))
        .map_or(UNKNOWN, |m| m.name)
        .to_string()
}

/// Display name for a category key (or display name). Unmapped is "Unknown".
pub fn category_display_name(category: Option<&str>) -> String {
    let category = category.map(str::trim).unwrap_or_default();
    CATEGORIES
        .iter()
        .find(|(key, name)| key.eq_ignore_ascii_case(category) || name.eq_ignore_ascii_case(category))
        .map_or(UNKNOWN, |(_, name)| *name)
        .to_string()
}

/// The deterministic fallback cover for a story without one.
pub fn fallback_cover(id: StoryId) -> String {
    let index = id.rem_euclid(FALLBACK_COVER_COUNT) + 1;
    format!("/images/fallback/pics ({}).jpeg", index)
}

/// The cover to display: the uploaded one if present, otherwise the fallback.
pub fn cover_url(id: StoryId, cover_image: Option<&str>) -> String {
    match cover_image.filter(|c| !c.trim().is_empty()) {
        Some(url) => url.to_string(),
        None => fallback_cover(id),
    }
}
