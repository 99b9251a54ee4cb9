//! Product catalog entries and their persisted filter configuration.

use serde::{Deserialize, Serialize};

use crate::presets::{DeepEffect, FilterKey};

/// A catalog product as supplied by the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub concerns: Vec<String>,
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            concerns: Vec::new(),
        }
    }

    pub fn with_concerns<I, S>(mut self, concerns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.concerns = concerns.into_iter().map(Into::into).collect();
        self
    }

    /// Filter key implied by the product's concerns, then its category.
    ///
    /// Concerns are checked in order and the first recognized one wins.
    /// Unrecognized products land on [`FilterKey::Wrinkles`].
    pub fn implied_filter(&self) -> FilterKey {
        self.concerns
            .iter()
            .find_map(|concern| filter_for_term(concern))
            .or_else(|| filter_for_category(&self.category))
            .unwrap_or(FilterKey::Wrinkles)
    }
}

fn filter_for_term(term: &str) -> Option<FilterKey> {
    let term = term.trim().to_ascii_lowercase();
    let key = match term.as_str() {
        "wrinkles" | "fine lines" | "fine_lines" | "anti-aging" | "anti_aging" | "aging" => {
            FilterKey::Wrinkles
        }
        "brightness" | "brightening" | "dullness" | "radiance" | "glow" => FilterKey::Brightness,
        "spots" | "dark spots" | "dark_spots" | "pigmentation" | "hyperpigmentation" => {
            FilterKey::Spots
        }
        "acne" | "blemishes" | "breakouts" | "pores" => FilterKey::Acne,
        "firmness" | "firming" | "sagging" | "elasticity" | "lifting" => FilterKey::Firmness,
        _ => return None,
    };
    Some(key)
}

fn filter_for_category(category: &str) -> Option<FilterKey> {
    let category = category.trim().to_ascii_lowercase();
    let key = match category.as_str() {
        "serum" | "eye cream" | "eye_cream" | "retinol" => FilterKey::Wrinkles,
        "vitamin c" | "vitamin_c" | "essence" | "toner" => FilterKey::Brightness,
        "spot treatment" | "spot_treatment" | "peel" => FilterKey::Spots,
        "cleanser" | "clay mask" | "clay_mask" => FilterKey::Acne,
        "moisturizer" | "cream" | "neck cream" | "neck_cream" => FilterKey::Firmness,
        _ => filter_for_term(&category)?,
    };
    Some(key)
}

/// Admin overrides of individual render parameters. `None` leaves the
/// preset/product value in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOverrides {
    pub intensity: Option<f32>,
    pub sigma: Option<f32>,
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub warmth_r: Option<f32>,
    pub warmth_b: Option<f32>,
    pub warmth_alpha: Option<f32>,
}

impl RenderOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Persisted filter configuration of one product.
///
/// The locked filter key is chosen once, when the configuration is derived,
/// and there is no setter for it. Numeric defaults and overrides change only
/// through an explicit save to a [`crate::store::ConfigStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFilterConfig {
    product_id: String,
    locked_filter_type: FilterKey,
    #[serde(default)]
    pub default_intensity: Option<f32>,
    #[serde(default)]
    pub default_sigma: Option<f32>,
    #[serde(default)]
    pub default_brightness: Option<f32>,
    #[serde(default)]
    pub webgl_config: RenderOverrides,
    #[serde(default)]
    pub deep_overrides: Vec<DeepEffect>,
}

impl ProductFilterConfig {
    pub fn new(product_id: impl Into<String>, locked_filter_type: FilterKey) -> Self {
        Self {
            product_id: product_id.into(),
            locked_filter_type,
            default_intensity: None,
            default_sigma: None,
            default_brightness: None,
            webgl_config: RenderOverrides::default(),
            deep_overrides: Vec::new(),
        }
    }

    /// Derive a fresh configuration from a product's concerns and category.
    pub fn derive(product: &Product) -> Self {
        Self::new(product.id.clone(), product.implied_filter())
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn locked_filter_type(&self) -> FilterKey {
        self.locked_filter_type
    }
}
