//! Process configuration, loaded from the environment (and a local `.env`
//! file in development) the way `DomnicAmalan-health-v1/backend/shared`
//! loads its service configs.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// `None` runs against the in-memory store; `Some` opens a Postgres pool.
    pub database_url: Option<String>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

impl WorkflowConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        config::Config::builder()
            .set_default("bind_addr", default_bind_addr())?
            .add_source(config::Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
