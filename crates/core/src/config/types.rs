use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub crm: CrmConfig,
    pub contribution: ContributionConfig,
    #[serde(default)]
    pub contact: ContactConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ingress: IngressConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("crmsync.db")
}

/// Webhook ingress configuration.
///
/// When `api_key` is set, order events must present it either as
/// `Authorization: Bearer <key>` or `X-API-Key: <key>`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IngressConfig {
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Remote CRM connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrmConfig {
    /// REST endpoint (e.g., "https://crm.example.org/civicrm/ajax/rest")
    pub url: String,
    /// Per-user API key
    pub api_key: String,
    /// Site key
    #[serde(default)]
    pub site_key: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// How existing contacts are matched before a new one is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DedupeStrategy {
    /// The CRM's default unsupervised rule for the contact type.
    Unsupervised,
    /// A named dedupe rule.
    Named(String),
}

impl From<String> for DedupeStrategy {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("unsupervised") {
            DedupeStrategy::Unsupervised
        } else {
            DedupeStrategy::Named(value)
        }
    }
}

impl From<DedupeStrategy> for String {
    fn from(value: DedupeStrategy) -> Self {
        match value {
            DedupeStrategy::Unsupervised => "unsupervised".to_string(),
            DedupeStrategy::Named(name) => name,
        }
    }
}

/// Contact creation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContactConfig {
    #[serde(default = "default_contact_type")]
    pub contact_type: String,
    /// Sub-type added to every synced contact (never replaces existing ones).
    #[serde(default)]
    pub contact_sub_type: Option<String>,
    #[serde(default = "default_dedupe_rule")]
    pub dedupe_rule: DedupeStrategy,
    /// Provenance recorded on contacts this service creates.
    #[serde(default = "default_contact_source")]
    pub contact_source: String,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            contact_type: default_contact_type(),
            contact_sub_type: None,
            dedupe_rule: default_dedupe_rule(),
            contact_source: default_contact_source(),
        }
    }
}

fn default_contact_type() -> String {
    "Individual".to_string()
}

fn default_dedupe_rule() -> DedupeStrategy {
    DedupeStrategy::Unsupervised
}

fn default_contact_source() -> String {
    "Online shop purchase".to_string()
}

/// Contribution and line item settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContributionConfig {
    /// Fallback financial type for contributions with mixed or unmapped line items.
    pub default_financial_type_id: u64,
    /// Financial type for the synthetic shipping line item. Shipping is dropped when unset.
    #[serde(default)]
    pub shipping_financial_type_id: Option<u64>,
    /// Overrides the CRM's default contribution price field value.
    #[serde(default)]
    pub default_price_field_value_id: Option<u64>,
    /// Payment gateways whose orders are recorded as "pay later".
    #[serde(default = "default_pay_later_gateways")]
    pub pay_later_gateways: Vec<String>,
    /// Skip orders with a zero total entirely.
    #[serde(default)]
    pub ignore_zero_amount_orders: bool,
    /// Global source string for contributions and participants.
    #[serde(default = "default_source")]
    pub source: String,
    /// Campaign applied to new contributions unless the order carries its own.
    #[serde(default)]
    pub campaign_id: Option<u64>,
    /// Payment gateway id -> payment instrument id.
    #[serde(default)]
    pub payment_instruments: HashMap<String, u64>,
    #[serde(default)]
    pub default_payment_instrument_id: Option<u64>,
}

impl ContributionConfig {
    /// Creates a config with the given default financial type and everything else defaulted.
    pub fn with_default_financial_type(financial_type_id: u64) -> Self {
        Self {
            default_financial_type_id: financial_type_id,
            shipping_financial_type_id: None,
            default_price_field_value_id: None,
            pay_later_gateways: default_pay_later_gateways(),
            ignore_zero_amount_orders: false,
            source: default_source(),
            campaign_id: None,
            payment_instruments: HashMap::new(),
            default_payment_instrument_id: None,
        }
    }

    /// Whether orders paid through `gateway` are pay-later.
    pub fn is_pay_later(&self, gateway: &str) -> bool {
        self.pay_later_gateways.iter().any(|g| g == gateway)
    }

    /// Payment instrument for the given gateway, falling back to the default.
    pub fn payment_instrument_for(&self, gateway: &str) -> Option<u64> {
        self.payment_instruments
            .get(gateway)
            .copied()
            .or(self.default_payment_instrument_id)
    }
}

fn default_pay_later_gateways() -> Vec<String> {
    vec!["bacs".to_string(), "cheque".to_string(), "cod".to_string()]
}

fn default_source() -> String {
    "Shop".to_string()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub crm: SanitizedCrmConfig,
    pub contact: ContactConfig,
    pub contribution: ContributionConfig,
    pub ingress_api_key_configured: bool,
}

/// CRM config with keys hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCrmConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub site_key_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            crm: SanitizedCrmConfig {
                url: config.crm.url.clone(),
                api_key_configured: !config.crm.api_key.is_empty(),
                site_key_configured: !config.crm.site_key.is_empty(),
                timeout_secs: config.crm.timeout_secs,
            },
            contact: config.contact.clone(),
            contribution: config.contribution.clone(),
            ingress_api_key_configured: config
                .ingress
                .api_key
                .as_ref()
                .is_some_and(|k| !k.is_empty()),
        }
    }
}
