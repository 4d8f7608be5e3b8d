use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::store::redis_store::RedisConfig;

/// Selects the session store backend. We differentiate them via a
/// "type" tag in the YAML.
///
/// The memory backend is only suitable for a single-instance deployment:
/// sessions written by one process are invisible to every other. Shared
/// deployments must use the redis backend.
#[derive(Deserialize, Serialize, Debug, JsonSchema)]
#[serde(tag = "type")]
pub enum StoreConfig {
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "redis")]
    Redis(RedisConfig),
}
