//! Bounded top-K selection of features before persistence.

use crate::types::{FeatureCategory, GeographicFeature};
use serde::{Deserialize, Serialize};

/// Per-category and global feature budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionLimits {
    /// Maximum transmission corridors
    pub transmission_corridors: usize,
    /// Maximum land-use zones
    pub land_use_zones: usize,
    /// Maximum water features
    pub water_features: usize,
    /// Maximum transportation corridors
    pub transportation_corridors: usize,
    /// Maximum features across all categories
    pub total: usize,
    /// Maximum facilities considered for proximity
    pub facilities: usize,
}

impl Default for RetentionLimits {
    fn default() -> Self {
        Self {
            transmission_corridors: 100,
            land_use_zones: 200,
            water_features: 150,
            transportation_corridors: 300,
            total: 400,
            facilities: 5,
        }
    }
}

impl RetentionLimits {
    /// Per-category bound, `None` for categories only bound by the total.
    pub fn for_category(&self, category: FeatureCategory) -> Option<usize> {
        match category {
            FeatureCategory::TransmissionCorridor => Some(self.transmission_corridors),
            FeatureCategory::LandUseZone => Some(self.land_use_zones),
            FeatureCategory::WaterFeature => Some(self.water_features),
            FeatureCategory::TransportationCorridor => Some(self.transportation_corridors),
            _ => None,
        }
    }

    /// Applies the budgets.
    ///
    /// Within each bounded category features are stably sorted by importance
    /// (highest first) and truncated. The survivors are then stably sorted the
    /// same way as a whole and truncated to `total`. Applying this twice gives
    /// the same result as applying it once.
    pub fn apply(&self, features: Vec<GeographicFeature>) -> Vec<GeographicFeature> {
        let mut keep = vec![true; features.len()];

        for category in [
            FeatureCategory::TransmissionCorridor,
            FeatureCategory::LandUseZone,
            FeatureCategory::WaterFeature,
            FeatureCategory::TransportationCorridor,
        ] {
            let Some(limit) = self.for_category(category) else {
                continue;
            };
            let mut members: Vec<usize> = features
                .iter()
                .enumerate()
                .filter(|(_, f)| f.category == category)
                .map(|(idx, _)| idx)
                .collect();
            if members.len() <= limit {
                continue;
            }
            members.sort_by(|a, b| features[*b].importance.cmp(&features[*a].importance));
            for idx in &members[limit..] {
                keep[*idx] = false;
            }
        }

        let mut retained: Vec<GeographicFeature> = features
            .into_iter()
            .zip(keep)
            .filter_map(|(feature, kept)| kept.then_some(feature))
            .collect();
        retained.sort_by(|a, b| b.importance.cmp(&a.importance));
        retained.truncate(self.total);
        retained
    }
}
