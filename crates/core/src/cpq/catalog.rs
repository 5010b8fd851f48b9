use std::collections::HashSet;

use crate::domain::collection::{
    CollectionDefinition, ColorEntry, CordFamily, HousingTaxonomy, Palette,
};
use crate::errors::DomainError;

const CLASSIC_COLORS: &[ColorEntry] = &[
    ColorEntry { name: "Black", hex: "#1a1a1a" },
    ColorEntry { name: "White", hex: "#f5f5f5" },
    ColorEntry { name: "Red", hex: "#c8102e" },
    ColorEntry { name: "Navy", hex: "#1f2a44" },
    ColorEntry { name: "Light Blue", hex: "#9ecae1" },
    ColorEntry { name: "Turquoise", hex: "#30b6c2" },
    ColorEntry { name: "Green", hex: "#2e7d32" },
    ColorEntry { name: "Pink", hex: "#f4a6c1" },
    ColorEntry { name: "Fuchsia", hex: "#d81b60" },
    ColorEntry { name: "Purple", hex: "#6a1b9a" },
    ColorEntry { name: "Orange", hex: "#ef6c00" },
    ColorEntry { name: "Yellow", hex: "#fbc02d" },
    ColorEntry { name: "Beige", hex: "#d8c3a5" },
    ColorEntry { name: "Brown", hex: "#6b4226" },
    ColorEntry { name: "Grey", hex: "#8e8e8e" },
];

const BANGLE_COLORS: &[ColorEntry] = &[
    ColorEntry { name: "Silver", hex: "#c0c0c0" },
    ColorEntry { name: "Gold", hex: "#d4af37" },
    ColorEntry { name: "Rose Gold", hex: "#b76e79" },
    ColorEntry { name: "Black", hex: "#1a1a1a" },
];

const CHAIN_COLORS: &[ColorEntry] = &[
    ColorEntry { name: "Silver", hex: "#c0c0c0" },
    ColorEntry { name: "Gold", hex: "#d4af37" },
    ColorEntry { name: "Rose Gold", hex: "#b76e79" },
];

const PALETTES: &[Palette] = &[
    Palette { family: CordFamily::Classic, colors: CLASSIC_COLORS },
    Palette { family: CordFamily::Bangle, colors: BANGLE_COLORS },
    Palette { family: CordFamily::Chain, colors: CHAIN_COLORS },
];

const HOUSINGS: &[HousingTaxonomy] = &[
    HousingTaxonomy {
        tag: "cuty",
        housings: &["White", "Yellow", "Rose"],
        housing_types: &["Classic", "Bezel"],
        attachments: &[],
    },
    HousingTaxonomy {
        tag: "cubix",
        housings: &["White Gold", "Yellow Gold", "Rose Gold"],
        housing_types: &[],
        attachments: &[],
    },
    HousingTaxonomy {
        tag: "holy",
        housings: &["White Gold", "Yellow Gold"],
        housing_types: &["Round", "Square"],
        attachments: &["Cord", "Chain"],
    },
];

const COLLECTIONS: &[CollectionDefinition] = &[
    CollectionDefinition {
        id: "cuty",
        label: "CUTY",
        carats: &["0.05ct", "0.10ct", "0.20ct", "0.30ct", "0.50ct"],
        prices: &[29, 39, 65, 89, 139],
        retail: &[59, 79, 129, 179, 279],
        minimum_per_color: 2,
        cord_family: CordFamily::Classic,
        housing: Some("cuty"),
        shapes: None,
        sizes: None,
    },
    CollectionDefinition {
        id: "cubix",
        label: "CUBIX",
        carats: &["0.05ct", "0.10ct", "0.20ct"],
        prices: &[24, 34, 59],
        retail: &[49, 69, 119],
        minimum_per_color: 2,
        cord_family: CordFamily::Classic,
        housing: Some("cubix"),
        shapes: None,
        sizes: None,
    },
    CollectionDefinition {
        id: "cuty-lab",
        label: "CUTY LAB G/H",
        carats: &["0.10ct", "0.20ct", "0.30ct", "0.50ct", "1.00ct"],
        prices: &[45, 75, 105, 165, 320],
        retail: &[89, 149, 209, 329, 639],
        minimum_per_color: 2,
        cord_family: CordFamily::Classic,
        housing: Some("cuty"),
        shapes: None,
        sizes: None,
    },
    CollectionDefinition {
        id: "matchy-bangle",
        label: "MATCHY BANGLE",
        carats: &["0.05ct", "0.10ct", "0.20ct"],
        prices: &[79, 99, 149],
        retail: &[159, 199, 299],
        minimum_per_color: 3,
        cord_family: CordFamily::Bangle,
        housing: None,
        shapes: None,
        sizes: Some(&["S", "M", "L"]),
    },
    CollectionDefinition {
        id: "shapy-shine",
        label: "SHAPY SHINE",
        carats: &["0.10ct", "0.20ct"],
        prices: &[49, 85],
        retail: &[99, 169],
        minimum_per_color: 3,
        cord_family: CordFamily::Classic,
        housing: None,
        shapes: Some(&["Heart", "Star", "Round", "Moon"]),
        sizes: None,
    },
    CollectionDefinition {
        id: "holy",
        label: "HOLY",
        carats: &["0.05ct", "0.10ct", "0.15ct"],
        prices: &[32, 44, 58],
        retail: &[65, 89, 115],
        minimum_per_color: 2,
        cord_family: CordFamily::Chain,
        housing: Some("holy"),
        shapes: None,
        sizes: None,
    },
];

/// Read-only view over collections, palettes and housing taxonomies.
#[derive(Clone, Copy, Debug)]
pub struct Catalog {
    collections: &'static [CollectionDefinition],
    palettes: &'static [Palette],
    housings: &'static [HousingTaxonomy],
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl Catalog {
    pub const fn new(
        collections: &'static [CollectionDefinition],
        palettes: &'static [Palette],
        housings: &'static [HousingTaxonomy],
    ) -> Self {
        Self { collections, palettes, housings }
    }

    pub const fn standard() -> Self {
        Self::new(COLLECTIONS, PALETTES, HOUSINGS)
    }

    pub fn collections(&self) -> &'static [CollectionDefinition] {
        self.collections
    }

    /// Exact id or label match first, then a case-insensitive comparison.
    pub fn find_collection(&self, id_or_label: &str) -> Option<&'static CollectionDefinition> {
        let needle = id_or_label.trim();
        if needle.is_empty() {
            return None;
        }

        let collections = self.collections;
        collections
            .iter()
            .find(|collection| collection.id == needle || collection.label == needle)
            .or_else(|| {
                collections.iter().find(|collection| {
                    collection.id.eq_ignore_ascii_case(needle)
                        || collection.label.eq_ignore_ascii_case(needle)
                })
            })
    }

    pub fn palette(&self, family: CordFamily) -> Option<&'static Palette> {
        let palettes = self.palettes;
        palettes.iter().find(|palette| palette.family == family)
    }

    pub fn housing_taxonomy(&self, tag: &str) -> Option<&'static HousingTaxonomy> {
        let housings = self.housings;
        housings.iter().find(|taxonomy| taxonomy.tag == tag)
    }

    pub fn colors_for(&self, collection: &CollectionDefinition) -> &'static [ColorEntry] {
        self.palette(collection.cord_family).map(|palette| palette.colors).unwrap_or(&[])
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let mut seen_ids = HashSet::new();
        for collection in self.collections {
            if !collection.is_consistent() {
                return Err(DomainError::InvariantViolation(format!(
                    "collection `{}` has misaligned or empty carat/price tables",
                    collection.id
                )));
            }
            if !seen_ids.insert(collection.id) {
                return Err(DomainError::InvariantViolation(format!(
                    "duplicate collection id `{}`",
                    collection.id
                )));
            }
            if self.palette(collection.cord_family).is_none() {
                return Err(DomainError::InvariantViolation(format!(
                    "collection `{}` references missing palette `{}`",
                    collection.id,
                    collection.cord_family.as_str()
                )));
            }
            if let Some(tag) = collection.housing {
                if self.housing_taxonomy(tag).is_none() {
                    return Err(DomainError::InvariantViolation(format!(
                        "collection `{}` references missing housing taxonomy `{tag}`",
                        collection.id
                    )));
                }
            }
        }

        for palette in self.palettes {
            let mut seen_names = HashSet::new();
            for color in palette.colors {
                if !seen_names.insert(color.name.to_ascii_lowercase()) {
                    return Err(DomainError::InvariantViolation(format!(
                        "duplicate color `{}` in {} palette",
                        color.name,
                        palette.family.as_str()
                    )));
                }
            }
        }

        Ok(())
    }
}

pub fn find_collection(id_or_label: &str) -> Option<&'static CollectionDefinition> {
    Catalog::standard().find_collection(id_or_label)
}
