use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "config/spese.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the ledger API.
    pub base_url: String,
    /// User-pool endpoint of the identity provider.
    pub provider_endpoint: String,
    /// Public client id registered with the pool.
    pub client_id: String,
    /// Where cached credentials live between runs.
    pub credentials_path: String,
    pub log: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000/api".to_string(),
            provider_endpoint: "https://cognito-idp.us-east-1.amazonaws.com/".to_string(),
            client_id: String::new(),
            credentials_path: "config/spese_credentials.json".to_string(),
            log: "info".to_string(),
        }
    }
}

/// Flag-level overrides; flags beat environment beats file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub config: Option<String>,
    pub base_url: Option<String>,
    pub provider_endpoint: Option<String>,
    pub client_id: Option<String>,
}

pub fn load(overrides: &Overrides) -> Result<AppConfig, config::ConfigError> {
    let config_path = overrides.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let builder = config::Config::builder()
        .add_source(config::File::with_name(config_path).required(false))
        .add_source(config::Environment::with_prefix("SPESE"));
    let mut settings: AppConfig = builder.build()?.try_deserialize()?;

    if let Some(base_url) = &overrides.base_url {
        settings.base_url = base_url.clone();
    }
    if let Some(provider_endpoint) = &overrides.provider_endpoint {
        settings.provider_endpoint = provider_endpoint.clone();
    }
    if let Some(client_id) = &overrides.client_id {
        settings.client_id = client_id.clone();
    }

    Ok(settings)
}
