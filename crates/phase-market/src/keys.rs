//! Blackboard key schema
//!
//! | Key | Type | Written by | Read by |
//! |---|---|---|---|
//! | `market.series` | `Vec<SeriesPoint>` | fetch | cluster |
//! | `clusters` | `Vec<ClusterGroup>` | cluster | forecast, profile, synthesis |
//! | `analysis.forecasts` | `Vec<ClusterForecast>` | forecast | synthesis |
//! | `analysis.profile` | `ClusterProfile` | profile | synthesis |
//! | `synthesis.report` | `SynthesisReport` | synthesis | caller |

use crate::cluster::ClusterGroup;
use crate::phases::{ClusterForecast, ClusterProfile, SynthesisReport};
use crate::source::SeriesPoint;
use phase_core::BlackboardKey;

pub const SERIES: BlackboardKey<Vec<SeriesPoint>> = BlackboardKey::new("market.series");

pub const CLUSTERS: BlackboardKey<Vec<ClusterGroup>> = BlackboardKey::new("clusters");

pub const FORECASTS: BlackboardKey<Vec<ClusterForecast>> =
    BlackboardKey::new("analysis.forecasts");

pub const PROFILE: BlackboardKey<ClusterProfile> = BlackboardKey::new("analysis.profile");

pub const SYNTHESIS: BlackboardKey<SynthesisReport> = BlackboardKey::new("synthesis.report");
