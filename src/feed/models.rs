use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FeedStop {
    pub stop_id: String,
    pub stop_name: String,
    pub stop_lat: f64,
    pub stop_lon: f64,
    pub mode: String,
    pub platform: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FeedLine {
    pub line_id: String,
    pub mode: String,
    /// Space-separated stop ids in calling order.
    pub stops: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FeedCall {
    pub run_id: String,
    pub line_id: String,
    pub stop_id: String,
    pub sequence: i64,
    pub arrival: String,
    pub departure: String,
}
