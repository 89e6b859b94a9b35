use super::{types::Config, ConfigError, DedupeStrategy};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - CRM url is http(s)
/// - Financial type ids are non-zero
/// - Named dedupe rule is not blank
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let url = config.crm.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "crm.url must be an http(s) URL, got '{}'",
            config.crm.url
        )));
    }

    if config.contribution.default_financial_type_id == 0 {
        return Err(ConfigError::ValidationError(
            "contribution.default_financial_type_id cannot be 0".to_string(),
        ));
    }

    if config.contribution.shipping_financial_type_id == Some(0) {
        return Err(ConfigError::ValidationError(
            "contribution.shipping_financial_type_id cannot be 0".to_string(),
        ));
    }

    if let DedupeStrategy::Named(name) = &config.contact.dedupe_rule {
        if name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "contact.dedupe_rule cannot be blank".to_string(),
            ));
        }
    }

    Ok(())
}
