use serde::{Deserialize, Serialize};

/// One color variant of a collection as edited in the order builder.
///
/// Every field may arrive malformed from the UI or from an AI suggestion; the
/// quote engine is responsible for clamping, not this type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineColorConfig {
    #[serde(default, alias = "caratIdx")]
    pub carat_index: Option<i64>,
    #[serde(default)]
    pub housing: Option<String>,
    #[serde(default)]
    pub housing_type: Option<String>,
    #[serde(default)]
    pub attachment: Option<String>,
    #[serde(default)]
    pub shape: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub quantity: Option<f64>,
}

impl OrderLineColorConfig {
    pub fn new(color: impl Into<String>, quantity: f64) -> Self {
        Self { color: color.into(), quantity: Some(quantity), ..Self::default() }
    }

    pub fn with_carat(mut self, carat_index: i64) -> Self {
        self.carat_index = Some(carat_index);
        self
    }

    pub fn with_housing(mut self, housing: impl Into<String>) -> Self {
        self.housing = Some(housing.into());
        self
    }

    pub fn with_shape(mut self, shape: impl Into<String>) -> Self {
        self.shape = Some(shape.into());
        self
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }
}

/// A collection reference plus its color configs, in builder order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    #[serde(alias = "collection")]
    pub collection_id: String,
    #[serde(default)]
    pub colors: Vec<OrderLineColorConfig>,
}

impl OrderLine {
    pub fn new(collection_id: impl Into<String>, colors: Vec<OrderLineColorConfig>) -> Self {
        Self { collection_id: collection_id.into(), colors }
    }

    pub fn color_count(&self) -> usize {
        self.colors.len()
    }
}
