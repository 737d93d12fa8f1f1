use std::time::Duration;

/// Default timeout for a single CRM call.
pub const DEFAULT_CRM_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Base URL of the CRM inbound webhook, token included in the path.
    pub crm_webhook_url: Option<String>,
    pub crm_timeout_secs: u64,
    /// CRM user assigned to activities logged on duplicate leads.
    pub crm_default_responsible_id: u64,
    pub webhook_secret: Option<String>,
}

/// Settings the gateway adapter needs, split out of [`Config`] so the
/// adapter never sees unrelated values.
#[derive(Debug, Clone)]
pub struct CrmConfig {
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            crm_webhook_url: std::env::var("CRM_WEBHOOK_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    let url = url.trim().to_string();
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("CRM_WEBHOOK_URL must start with http:// or https://");
                    }
                    url::Url::parse(&url)
                        .map_err(|e| anyhow::anyhow!("CRM_WEBHOOK_URL is not a valid URL: {}", e))?;
                    Ok(url)
                })
                .transpose()?,
            crm_timeout_secs: parse_positive("CRM_TIMEOUT_SECS", DEFAULT_CRM_TIMEOUT_SECS)?,
            crm_default_responsible_id: parse_positive("CRM_DEFAULT_RESPONSIBLE_ID", 1)?,
            webhook_secret: std::env::var("WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        };

        // Never log the webhook URL path: it carries the CRM token
        tracing::info!("Configuration loaded successfully");
        match config.crm_webhook_url.as_deref() {
            Some(url) => tracing::debug!("CRM webhook host: {}", redact_url(url)),
            None => tracing::warn!(
                "⚠️  CRM_WEBHOOK_URL not set - every inquiry will fail with CONFIG_MISSING"
            ),
        }
        if config.webhook_secret.is_none() {
            tracing::warn!("⚠️  WEBHOOK_SECRET not set - portal requests are not authenticated");
        }
        tracing::debug!("CRM timeout: {}s", config.crm_timeout_secs);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    pub fn crm(&self) -> CrmConfig {
        CrmConfig {
            base_url: self.crm_webhook_url.clone(),
            timeout: Duration::from_secs(self.crm_timeout_secs),
        }
    }
}

fn parse_positive(var: &str, default: u64) -> anyhow::Result<u64> {
    let Ok(raw) = std::env::var(var) else {
        return Ok(default);
    };
    if raw.trim().is_empty() {
        return Ok(default);
    }
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => anyhow::bail!("{} must be a positive integer", var),
        Ok(value) => Ok(value),
    }
}

/// Keeps scheme and host only, e.g. `https://crm.example.com/...`.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(url) => format!(
            "{}://{}/...",
            url.scheme(),
            url.host_str().unwrap_or("unknown")
        ),
        Err(_) => "[invalid url]".to_string(),
    }
}
