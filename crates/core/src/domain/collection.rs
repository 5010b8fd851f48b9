use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CordFamily {
    Classic,
    Bangle,
    Chain,
}

impl CordFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Bangle => "bangle",
            Self::Chain => "chain",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ColorEntry {
    pub name: &'static str,
    pub hex: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub family: CordFamily,
    pub colors: &'static [ColorEntry],
}

impl Palette {
    pub fn find(&self, name: &str) -> Option<&ColorEntry> {
        let name = name.trim();
        self.colors.iter().find(|color| color.name.eq_ignore_ascii_case(name))
    }
}

/// Housing options shared by every collection carrying the same taxonomy tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HousingTaxonomy {
    pub tag: &'static str,
    pub housings: &'static [&'static str],
    pub housing_types: &'static [&'static str],
    pub attachments: &'static [&'static str],
}

/// One product line with its carat/price table.
///
/// `carats`, `prices` and `retail` are index-aligned: the carat index is the
/// only valid key into the two price arrays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDefinition {
    pub id: &'static str,
    pub label: &'static str,
    pub carats: &'static [&'static str],
    pub prices: &'static [u32],
    pub retail: &'static [u32],
    pub minimum_per_color: u32,
    pub cord_family: CordFamily,
    pub housing: Option<&'static str>,
    pub shapes: Option<&'static [&'static str]>,
    pub sizes: Option<&'static [&'static str]>,
}

impl CollectionDefinition {
    pub fn carat_count(&self) -> usize {
        self.carats.len()
    }

    pub fn is_consistent(&self) -> bool {
        !self.carats.is_empty()
            && self.carats.len() == self.prices.len()
            && self.carats.len() == self.retail.len()
    }

    /// Clamps a raw carat index into range. The flag is `true` when clamping changed it.
    pub fn clamp_carat_index(&self, raw: i64) -> (usize, bool) {
        let last = self.carat_count().saturating_sub(1);
        if raw < 0 {
            (0, true)
        } else if raw as u64 > last as u64 {
            (last, true)
        } else {
            (raw as usize, false)
        }
    }

    pub fn carat_label(&self, index: usize) -> Option<&'static str> {
        self.carats.get(index).copied()
    }

    /// Position of an exact carat label.
    pub fn carat_index(&self, label: &str) -> Option<usize> {
        self.carats.iter().position(|carat| *carat == label)
    }

    pub fn price_at(&self, index: usize) -> Option<u32> {
        self.prices.get(index).copied()
    }

    pub fn wholesale_at(&self, index: usize) -> Option<Decimal> {
        self.prices.get(index).map(|price| Decimal::from(*price))
    }

    pub fn retail_at(&self, index: usize) -> Option<Decimal> {
        self.retail.get(index).map(|price| Decimal::from(*price))
    }
}

#[cfg(test)]
mod tests {
    use super::{CollectionDefinition, CordFamily};

    const SAMPLE: CollectionDefinition = CollectionDefinition {
        id: "sample",
        label: "SAMPLE",
        carats: &["0.05ct", "0.10ct", "0.20ct"],
        prices: &[10, 20, 30],
        retail: &[20, 40, 60],
        minimum_per_color: 2,
        cord_family: CordFamily::Classic,
        housing: None,
        shapes: None,
        sizes: None,
    };

    #[test]
    fn clamps_out_of_range_indices_to_nearest_bound() {
        assert_eq!(SAMPLE.clamp_carat_index(-3), (0, true));
        assert_eq!(SAMPLE.clamp_carat_index(1), (1, false));
        assert_eq!(SAMPLE.clamp_carat_index(2), (2, false));
        assert_eq!(SAMPLE.clamp_carat_index(9), (2, true));
        assert_eq!(SAMPLE.clamp_carat_index(i64::MAX), (2, true));
    }

    #[test]
    fn price_lookups_share_the_carat_index() {
        assert_eq!(SAMPLE.carat_label(2), Some("0.20ct"));
        assert_eq!(SAMPLE.wholesale_at(2).map(|p| p.to_string()), Some("30".to_string()));
        assert_eq!(SAMPLE.retail_at(2).map(|p| p.to_string()), Some("60".to_string()));
        assert_eq!(SAMPLE.wholesale_at(3), None);
        assert_eq!(SAMPLE.carat_index("0.10ct").and_then(|i| SAMPLE.price_at(i)), Some(20));
        assert_eq!(SAMPLE.carat_index("0.15ct"), None);
    }
}
