//! # QuickBooks Configuration
//!
//! One config block covers the OAuth app, the sync behavior knobs, and
//! the item mappings invoices are posted against. Everything is read from
//! `QBO_*` environment variables; a deployment with none of the four
//! required variables simply runs without QuickBooks.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use store_core::{StoreError, StoreResult};

/// Intuit OAuth consent page.
pub const AUTH_BASE_URL: &str = "https://appcenter.intuit.com/connect/oauth2";

/// Intuit token endpoint (exchange and refresh).
pub const TOKEN_BASE_URL: &str = "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer";

/// QuickBooks API host per environment.
pub const SANDBOX_API_BASE_URL: &str = "https://sandbox-quickbooks.api.intuit.com";
pub const PRODUCTION_API_BASE_URL: &str = "https://quickbooks.api.intuit.com";

/// OAuth scope for the accounting API.
pub const ACCOUNTING_SCOPE: &str = "com.intuit.quickbooks.accounting";

/// Minor version pinned on every API call.
pub const MINOR_VERSION: &str = "65";

/// Which QuickBooks company type the tokens belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QboEnvironment {
    Sandbox,
    Production,
}

impl QboEnvironment {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Some(Self::Sandbox),
            "production" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QboEnvironment::Sandbox => "sandbox",
            QboEnvironment::Production => "production",
        }
    }

    pub fn api_base(&self) -> &'static str {
        match self {
            QboEnvironment::Sandbox => SANDBOX_API_BASE_URL,
            QboEnvironment::Production => PRODUCTION_API_BASE_URL,
        }
    }
}

impl std::fmt::Display for QboEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How invoices represent sales tax.
///
/// `Line` (the default) posts tax as its own sales line so invoice totals
/// match the order without any tax setup in QuickBooks. `Qbo` stamps
/// `TaxCodeRef` on every line and posts no manual tax line; it requires
/// `QBO_TAX_CODE_ID`. `None` omits tax entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxStrategy {
    Line,
    Qbo,
    None,
}

impl TaxStrategy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "line" => Some(Self::Line),
            "qbo" => Some(Self::Qbo),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaxStrategy::Line => "line",
            TaxStrategy::Qbo => "qbo",
            TaxStrategy::None => "none",
        }
    }
}

/// When invoice sync runs without an explicit admin request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceSyncPolicy {
    /// Only the admin endpoint triggers a sync
    Manual,
    /// Sync when an order transitions into `paid` (or `fulfilled` for
    /// pay-later orders)
    OnPaid,
    /// Sync as soon as the order is placed
    OnPlacement,
}

impl InvoiceSyncPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "manual" => Some(Self::Manual),
            "on_paid" => Some(Self::OnPaid),
            "on_placement" => Some(Self::OnPlacement),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceSyncPolicy::Manual => "manual",
            InvoiceSyncPolicy::OnPaid => "on_paid",
            InvoiceSyncPolicy::OnPlacement => "on_placement",
        }
    }
}

/// QuickBooks Online configuration
#[derive(Debug, Clone)]
pub struct QboConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,

    /// Secret the OAuth state parameter is signed with
    pub state_secret: String,

    pub environment: QboEnvironment,

    /// Item every product line is posted against
    pub default_item_id: Option<String>,

    /// Item for the shipping line; falls back to the default item
    pub shipping_item_id: Option<String>,

    /// Item for the manual tax line; falls back to the default item
    pub tax_item_id: Option<String>,

    pub tax_strategy: TaxStrategy,

    /// Required when `tax_strategy` is `qbo`
    pub tax_code_id: Option<String>,

    /// Email the invoice to the customer after a sync
    pub email_invoices: bool,

    pub sync_policy: InvoiceSyncPolicy,

    /// Where the file-backed token store lives
    pub token_path: PathBuf,

    /// Test seams; production keeps the Intuit defaults
    pub auth_base_url: String,
    pub token_base_url: String,
    pub api_base_url: String,
}

impl QboConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `Ok(None)` when none of the four required variables
    /// (`QBO_CLIENT_ID`, `QBO_CLIENT_SECRET`, `QBO_REDIRECT_URI`,
    /// `QBO_STATE_SECRET`) is set. A partially configured block is an
    /// error naming the first missing variable rather than a silent
    /// no-op.
    pub fn from_env() -> StoreResult<Option<Self>> {
        dotenvy::dotenv().ok();

        let required = [
            "QBO_CLIENT_ID",
            "QBO_CLIENT_SECRET",
            "QBO_REDIRECT_URI",
            "QBO_STATE_SECRET",
        ];
        let values: Vec<Option<String>> = required.iter().map(|name| non_empty(name)).collect();

        if values.iter().all(Option::is_none) {
            return Ok(None);
        }
        for (name, value) in required.iter().zip(&values) {
            if value.is_none() {
                return Err(StoreError::not_configured(*name));
            }
        }

        let environment = match non_empty("QBO_ENV") {
            Some(raw) => QboEnvironment::parse(&raw).ok_or_else(|| {
                StoreError::validation(format!(
                    "QBO_ENV must be 'sandbox' or 'production', got '{}'",
                    raw
                ))
            })?,
            None => QboEnvironment::Sandbox,
        };

        let tax_strategy = match non_empty("QBO_TAX_STRATEGY") {
            Some(raw) => TaxStrategy::parse(&raw).ok_or_else(|| {
                StoreError::validation(format!(
                    "QBO_TAX_STRATEGY must be 'line', 'qbo', or 'none', got '{}'",
                    raw
                ))
            })?,
            None => TaxStrategy::Line,
        };

        let sync_policy = match non_empty("QBO_INVOICE_SYNC") {
            Some(raw) => InvoiceSyncPolicy::parse(&raw).ok_or_else(|| {
                StoreError::validation(format!(
                    "QBO_INVOICE_SYNC must be 'manual', 'on_paid', or 'on_placement', got '{}'",
                    raw
                ))
            })?,
            None => InvoiceSyncPolicy::OnPaid,
        };

        let email_invoices = non_empty("QBO_EMAIL_INVOICES")
            .map(|v| v.to_ascii_lowercase() == "true")
            .unwrap_or(false);

        let token_path = non_empty("QBO_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/qbo-tokens.json"));

        let config = Self {
            client_id: values[0].clone().unwrap_or_default(),
            client_secret: values[1].clone().unwrap_or_default(),
            redirect_uri: values[2].clone().unwrap_or_default(),
            state_secret: values[3].clone().unwrap_or_default(),
            environment,
            default_item_id: non_empty("QBO_DEFAULT_ITEM_ID"),
            shipping_item_id: non_empty("QBO_SHIPPING_ITEM_ID"),
            tax_item_id: non_empty("QBO_TAX_ITEM_ID"),
            tax_strategy,
            tax_code_id: non_empty("QBO_TAX_CODE_ID"),
            email_invoices,
            sync_policy,
            token_path,
            auth_base_url: AUTH_BASE_URL.to_string(),
            token_base_url: TOKEN_BASE_URL.to_string(),
            api_base_url: environment.api_base().to_string(),
        };
        config.validate()?;
        Ok(Some(config))
    }

    /// Minimal configuration for tests
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        state_secret: impl Into<String>,
    ) -> Self {
        let environment = QboEnvironment::Sandbox;
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            state_secret: state_secret.into(),
            environment,
            default_item_id: None,
            shipping_item_id: None,
            tax_item_id: None,
            tax_strategy: TaxStrategy::Line,
            tax_code_id: None,
            email_invoices: false,
            sync_policy: InvoiceSyncPolicy::OnPaid,
            token_path: PathBuf::from("data/qbo-tokens.json"),
            auth_base_url: AUTH_BASE_URL.to_string(),
            token_base_url: TOKEN_BASE_URL.to_string(),
            api_base_url: environment.api_base().to_string(),
        }
    }

    /// Override the token endpoint (tests point this at a mock server)
    pub fn with_token_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.token_base_url = base_url.into();
        self
    }

    /// Override the API host (tests point this at a mock server)
    pub fn with_api_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_base_url = base_url.into();
        self
    }

    fn validate(&self) -> StoreResult<()> {
        if self.tax_strategy == TaxStrategy::Qbo && self.tax_code_id.is_none() {
            return Err(StoreError::not_configured(
                "QBO_TAX_CODE_ID (required when QBO_TAX_STRATEGY=qbo)",
            ));
        }
        Ok(())
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    // from_env reads the process environment, so these tests stick to the
    // pure pieces: parsers, defaults, and validation.

    #[test]
    fn environment_parsing_is_case_insensitive() {
        assert_eq!(
            QboEnvironment::parse(" Sandbox "),
            Some(QboEnvironment::Sandbox)
        );
        assert_eq!(
            QboEnvironment::parse("PRODUCTION"),
            Some(QboEnvironment::Production)
        );
        assert_eq!(QboEnvironment::parse("staging"), None);
    }

    #[test]
    fn api_base_follows_the_environment() {
        assert_eq!(QboEnvironment::Sandbox.api_base(), SANDBOX_API_BASE_URL);
        assert_eq!(
            QboEnvironment::Production.api_base(),
            PRODUCTION_API_BASE_URL
        );
    }

    #[test]
    fn tax_strategy_and_sync_policy_parse() {
        assert_eq!(TaxStrategy::parse("line"), Some(TaxStrategy::Line));
        assert_eq!(TaxStrategy::parse("QBO"), Some(TaxStrategy::Qbo));
        assert_eq!(TaxStrategy::parse("none"), Some(TaxStrategy::None));
        assert_eq!(TaxStrategy::parse("auto"), None);

        assert_eq!(
            InvoiceSyncPolicy::parse("manual"),
            Some(InvoiceSyncPolicy::Manual)
        );
        assert_eq!(
            InvoiceSyncPolicy::parse("on_paid"),
            Some(InvoiceSyncPolicy::OnPaid)
        );
        assert_eq!(
            InvoiceSyncPolicy::parse("on_placement"),
            Some(InvoiceSyncPolicy::OnPlacement)
        );
        assert_eq!(InvoiceSyncPolicy::parse("nightly"), None);
    }

    #[test]
    fn qbo_tax_strategy_requires_a_tax_code() {
        let mut config = QboConfig::new("id", "secret", "https://cb", "state-secret");
        config.tax_strategy = TaxStrategy::Qbo;
        assert!(config.validate().is_err());

        config.tax_code_id = Some("3".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_defaults_are_sandbox_line_on_paid() {
        let config = QboConfig::new("id", "secret", "https://cb", "state-secret");
        assert_eq!(config.environment, QboEnvironment::Sandbox);
        assert_eq!(config.tax_strategy, TaxStrategy::Line);
        assert_eq!(config.sync_policy, InvoiceSyncPolicy::OnPaid);
        assert!(!config.email_invoices);
        assert_eq!(config.api_base_url, SANDBOX_API_BASE_URL);
    }
}
