//! Extraction configuration.

use crate::geometry::DEFAULT_TOLERANCE;
use serde::{Deserialize, Serialize};

/// Configuration for constraint extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Tolerance for degenerate extents and face areas.
    pub tolerance: f64,

    /// When true, only overlapping face pairs are matched; otherwise overlap
    /// only ranks candidates.
    pub require_overlap: bool,

    /// Candidates farther apart than this are discarded.
    pub max_match_distance: Option<f64>,

    /// Region type assigned to items without a group type.
    pub default_region_type: String,

    /// Extract independent regions on the rayon pool.
    pub parallel_regions: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            require_overlap: false,
            max_match_distance: None,
            default_region_type: "Bed".to_string(),
            parallel_regions: true,
        }
    }
}

impl ExtractConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the geometric tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.abs();
        self
    }

    /// Makes overlap a hard filter.
    pub fn with_require_overlap(mut self, require: bool) -> Self {
        self.require_overlap = require;
        self
    }

    /// Sets the maximum face distance considered for a match.
    pub fn with_max_match_distance(mut self, distance: f64) -> Self {
        self.max_match_distance = Some(distance.abs());
        self
    }

    /// Sets the region type used for ungrouped items.
    pub fn with_default_region_type(mut self, region_type: impl Into<String>) -> Self {
        self.default_region_type = region_type.into();
        self
    }

    /// Enables or disables parallel region extraction.
    pub fn with_parallel_regions(mut self, parallel: bool) -> Self {
        self.parallel_regions = parallel;
        self
    }
}
