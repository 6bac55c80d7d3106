//! User message templates

/// Per-cluster forecast request
pub const FORECAST_CLUSTER: &str = "market.user.forecast_cluster";

/// Whole-clustering profile request
pub const PROFILE_CLUSTERS: &str = "market.user.profile_clusters";

pub(crate) const FORECAST_CLUSTER_TEMPLATE: &str = "\
[{{ agent }}|{{ role }}]: Analyze the following time series data for Cluster {{ cluster.number }}:
Average High: ${{ cluster.average }}
Time Range: {{ cluster.times | join(\", \") }}
Based on this data, what is the most probable time period for this average high to occur?";

pub(crate) const PROFILE_CLUSTERS_TEMPLATE: &str = "\
[{{ agent }}|{{ role }}]: Profile the following clusters of {{ interval }} highs for {{ symbol }}:
{% for cluster in clusters %}Cluster {{ cluster.number }}: average high ${{ cluster.average }}, {{ cluster.count }} points, first {{ cluster.first }}, last {{ cluster.last }}
{% endfor %}
Summarize how the clusters differ and which periods of the day each one covers.";
