//! Maps free-text product names and carat strings, as written by an LLM, back
//! onto canonical catalog entries.
//!
//! Matching is deliberately conservative: a fixed alias table, exact
//! comparisons, then substring containment. There is no similarity scoring.

use crate::cpq::catalog::Catalog;
use crate::domain::collection::CollectionDefinition;

/// Known paraphrases, applied in order to the normalized text.
const COLLECTION_ALIASES: &[(&str, &str)] = &[
    ("(g/h vs)", "g/h"),
    ("(g/h)", "g/h"),
    ("g/h vs", "g/h"),
    ("g-h", "g/h"),
    ("lab-grown", "lab"),
    ("lab grown", "lab"),
    ("labgrown", "lab"),
    ("cuty classic", "cuty"),
    ("matchy bangles", "matchy bangle"),
    ("shapy-shine", "shapy shine"),
];

const MIN_CONTAINMENT_LEN: usize = 3;

#[derive(Clone, Copy, Debug, Default)]
pub struct CatalogResolver {
    catalog: Catalog,
}

impl CatalogResolver {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn resolve_collection(&self, free_text: &str) -> Option<&'static str> {
        self.resolve_definition(free_text).map(|collection| collection.id)
    }

    pub fn resolve_definition(&self, free_text: &str) -> Option<&'static CollectionDefinition> {
        let needle = apply_aliases(&normalize(free_text));
        if needle.is_empty() {
            return None;
        }

        let collections = self.catalog.collections();

        if let Some(exact) = collections
            .iter()
            .find(|c| normalize(c.label) == needle || normalize(c.id) == needle)
        {
            return Some(exact);
        }

        if needle.chars().count() >= MIN_CONTAINMENT_LEN {
            let narrowest = collections
                .iter()
                .filter(|c| normalize(c.label).contains(&needle) || normalize(c.id).contains(&needle))
                .min_by_key(|c| c.label.len());
            if narrowest.is_some() {
                return narrowest;
            }
        }

        collections
            .iter()
            .filter(|c| {
                let label = normalize(c.label);
                let id = normalize(c.id);
                (label.chars().count() >= MIN_CONTAINMENT_LEN && needle.contains(&label))
                    || (id.chars().count() >= MIN_CONTAINMENT_LEN && needle.contains(&id))
            })
            .max_by_key(|c| c.label.len())
    }

    /// Index of `carat_text` in the collection's carat list, or 0 when unresolved.
    pub fn resolve_carat_index(&self, collection_id: &str, carat_text: &str) -> usize {
        self.match_carat(collection_id, carat_text).unwrap_or(0)
    }

    /// Like `resolve_carat_index` but without the fallback to the first tier.
    pub fn match_carat(&self, collection_id: &str, carat_text: &str) -> Option<usize> {
        let collection = self.catalog.find_collection(collection_id)?;
        carat_position(collection, carat_text)
    }

    pub fn resolve_housing(&self, collection_id: &str, text: &str) -> Option<&'static str> {
        let collection = self.catalog.find_collection(collection_id)?;
        let taxonomy = self.catalog.housing_taxonomy(collection.housing?)?;
        resolve_option(taxonomy.housings, text)
    }

    pub fn resolve_housing_type(&self, collection_id: &str, text: &str) -> Option<&'static str> {
        let collection = self.catalog.find_collection(collection_id)?;
        let taxonomy = self.catalog.housing_taxonomy(collection.housing?)?;
        resolve_option(taxonomy.housing_types, text)
    }

    pub fn resolve_attachment(&self, collection_id: &str, text: &str) -> Option<&'static str> {
        let collection = self.catalog.find_collection(collection_id)?;
        let taxonomy = self.catalog.housing_taxonomy(collection.housing?)?;
        resolve_option(taxonomy.attachments, text)
    }

    pub fn resolve_shape(&self, collection_id: &str, text: &str) -> Option<&'static str> {
        let collection = self.catalog.find_collection(collection_id)?;
        resolve_option(collection.shapes?, text)
    }

    pub fn resolve_size(&self, collection_id: &str, text: &str) -> Option<&'static str> {
        let collection = self.catalog.find_collection(collection_id)?;
        resolve_option(collection.sizes?, text)
    }

    pub fn resolve_color(&self, collection_id: &str, text: &str) -> Option<&'static str> {
        let collection = self.catalog.find_collection(collection_id)?;
        let palette = self.catalog.palette(collection.cord_family)?;
        palette.find(text).map(|color| color.name)
    }
}

pub fn resolve_collection(free_text: &str) -> Option<&'static str> {
    CatalogResolver::default().resolve_collection(free_text)
}

pub fn resolve_carat_index(collection_id: &str, carat_text: &str) -> usize {
    CatalogResolver::default().resolve_carat_index(collection_id, carat_text)
}

/// Case-insensitive exact lookup in a fixed option list.
pub fn resolve_option(options: &'static [&'static str], text: &str) -> Option<&'static str> {
    let needle = normalize(text);
    if needle.is_empty() {
        return None;
    }
    options.iter().copied().find(|option| normalize(option) == needle)
}

fn carat_position(collection: &CollectionDefinition, carat_text: &str) -> Option<usize> {
    let needle = normalize_carat(carat_text);
    if needle.is_empty() {
        return None;
    }

    if let Some(index) = collection.carats.iter().position(|c| normalize_carat(c) == needle) {
        return Some(index);
    }

    let value = needle.parse::<f64>().ok()?;
    collection.carats.iter().position(|c| {
        normalize_carat(c).parse::<f64>().map(|c| (c - value).abs() < 1e-9).unwrap_or(false)
    })
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn apply_aliases(normalized: &str) -> String {
    COLLECTION_ALIASES
        .iter()
        .fold(normalized.to_string(), |text, (from, to)| text.replace(from, to))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_carat(text: &str) -> String {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c.to_ascii_lowercase() })
        .collect();

    let stripped = ["carats", "carat", "ct", "kt"]
        .iter()
        .find_map(|suffix| compact.strip_suffix(suffix))
        .map(str::to_string);
    stripped.unwrap_or(compact)
}
