//! Hierarchy configuration

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterLimits;
use crate::{LodError, LodResult};

/// Settings for [`LodHierarchyBuilder`](crate::LodHierarchyBuilder)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Generations to build, including the full-resolution one
    pub max_generations: u32,
    /// Vertex cap per cluster
    pub max_vertices_per_cluster: usize,
    /// Triangle cap per cluster
    pub max_triangles_per_cluster: usize,
    /// Clusters per group when partitioning
    pub target_group_size: usize,
    /// Fraction of a group's triangles simplification aims to keep
    pub simplify_ratio: f32,
    /// Relative error budget for the first simplified generation
    pub min_target_error: f32,
    /// Relative error budget for the last generation
    pub max_target_error: f32,
    /// Meshlet builder preference for normal cone tightness over locality
    pub cone_weight: f32,
    /// Give each cluster a random visualisation colour
    pub debug_colors: bool,
    /// Seed for bounding-sphere pivots and debug colours
    pub seed: u64,
}

impl HierarchyConfig {
    /// Parse and validate a JSON configuration; missing fields take defaults
    pub fn from_json(text: &str) -> LodResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LodResult<()> {
        if self.max_generations == 0 {
            return Err(LodError::InvalidConfig(
                "max_generations must be at least 1".to_string(),
            ));
        }
        if self.target_group_size == 0 {
            return Err(LodError::InvalidConfig(
                "target_group_size must be at least 1".to_string(),
            ));
        }
        if !(self.simplify_ratio > 0.0 && self.simplify_ratio <= 1.0) {
            return Err(LodError::InvalidConfig(format!(
                "simplify_ratio {} must be in (0, 1]",
                self.simplify_ratio
            )));
        }
        if !(self.min_target_error >= 0.0 && self.min_target_error <= self.max_target_error) {
            return Err(LodError::InvalidConfig(format!(
                "target error range [{}, {}] is empty or negative",
                self.min_target_error, self.max_target_error
            )));
        }
        self.cluster_limits().validate()
    }

    pub fn cluster_limits(&self) -> ClusterLimits {
        ClusterLimits {
            max_vertices: self.max_vertices_per_cluster,
            max_triangles: self.max_triangles_per_cluster,
            cone_weight: self.cone_weight,
        }
    }
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_generations: 5,
            max_vertices_per_cluster: 128,
            max_triangles_per_cluster: 128,
            target_group_size: 4,
            simplify_ratio: 0.5,
            min_target_error: 0.01,
            max_target_error: 0.99,
            cone_weight: 0.5,
            debug_colors: false,
            seed: 0x5eed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = HierarchyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_generations, 5);
        assert_eq!(config.simplify_ratio, 0.5);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = HierarchyConfig::from_json(r#"{ "max_generations": 3, "debug_colors": true }"#).unwrap();
        assert_eq!(config.max_generations, 3);
        assert!(config.debug_colors);
        assert_eq!(config.target_group_size, 4);
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        assert!(matches!(
            HierarchyConfig::from_json("{ not json"),
            Err(LodError::ConfigParse(_))
        ));
        assert!(matches!(
            HierarchyConfig::from_json(r#"{ "max_generations": 0 }"#),
            Err(LodError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_cluster_caps() {
        let config = HierarchyConfig {
            max_vertices_per_cluster: 300,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = HierarchyConfig {
            max_triangles_per_cluster: 126,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = HierarchyConfig {
            simplify_ratio: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
