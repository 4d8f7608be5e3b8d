use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::store::StoreConfig;
use crate::provider::oidc::OidcProviderConfig;
use crate::upload::drive::UploadConfig;

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0: identity provider, session policy, session
/// store, upload target and logging.
#[derive(Deserialize, Serialize, Debug, JsonSchema)]
pub struct ConfigV1 {
    pub provider: OidcProviderConfig,
    pub session: SessionConfig,
    pub store: StoreConfig,
    pub upload: UploadConfig,
    pub bind_address: String,
    /// Fixed public base URL of this deployment. When absent, the
    /// OAuth redirect URI is derived per request from the request origin.
    pub external_base_url: Option<String>,
    pub logging: LoggingConfig,
}

/// Session policy: the cookie signing secret and the session TTL.
#[derive(Deserialize, Serialize, Debug, JsonSchema)]
pub struct SessionConfig {
    pub secret: String,
    #[serde(default = "default_session_ttl_hours")]
    pub ttl_hours: i64,
}

fn default_session_ttl_hours() -> i64 {
    24
}

/// Load config from a YAML file named "config.yaml" in the current
/// directory, with DESPESAS_-prefixed environment variables taking
/// precedence (e.g. DESPESAS_PROVIDER__CLIENT_SECRET).
pub fn load_config() -> ConfigV1 {
    let figment = Figment::new()
        .merge(Yaml::file("./config.yaml"))
        .merge(Env::prefixed("DESPESAS_").split("__"));
    let config = match figment.extract::<Config>() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };
    match config {
        Config::ConfigV1(c) => c,
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema).unwrap());
}
