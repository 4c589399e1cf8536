//! # Square Configuration
//!
//! Environment-driven configuration for the Square hosted-checkout
//! gateway. Square runs two isolated environments (sandbox and
//! production) with separate credentials and hosts; this module loads
//! either or both and decides which ones a request may use.

use std::env;

use store_core::{StoreError, StoreResult};
use store_core::processor::ProcessorEnvironment;

/// Default Square sandbox API host.
pub const SANDBOX_BASE_URL: &str = "https://connect.squareupsandbox.com";

/// Default Square production API host.
pub const PRODUCTION_BASE_URL: &str = "https://connect.squareup.com";

/// Square-Version header pinned for every request.
pub const DEFAULT_API_VERSION: &str = "2024-01-18";

/// Which environment(s) the gateway is allowed to charge against.
///
/// `Auto` tries sandbox first and falls back to production when the
/// sandbox credentials are rejected as unauthorized, which keeps a
/// half-rotated deployment limping instead of hard-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquareMode {
    Sandbox,
    Production,
    Auto,
}

impl SquareMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Some(Self::Sandbox),
            "production" => Some(Self::Production),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

/// Access token plus the location it charges against.
#[derive(Debug, Clone)]
pub struct SquareCredentials {
    pub access_token: String,
    pub location_id: String,
}

/// Configuration for the Square gateway.
#[derive(Debug, Clone)]
pub struct SquareConfig {
    pub mode: SquareMode,
    pub sandbox: Option<SquareCredentials>,
    pub production: Option<SquareCredentials>,
    pub sandbox_base_url: String,
    pub production_base_url: String,
    pub api_version: String,
}

impl SquareConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `Ok(None)` when `SQUARE_ENV` is unset and no Square
    /// access token is present, meaning the deployment simply has no
    /// card checkout. Partial configuration (a token without its
    /// location, or a mode whose credentials are missing) is an error
    /// rather than a silently disabled gateway.
    ///
    /// Variables:
    /// - `SQUARE_ENV`: `sandbox`, `production`, or `auto`
    /// - `SQUARE_SANDBOX_ACCESS_TOKEN` / `SQUARE_SANDBOX_LOCATION_ID`
    /// - `SQUARE_PRODUCTION_ACCESS_TOKEN` / `SQUARE_PRODUCTION_LOCATION_ID`
    /// - `SQUARE_API_VERSION`: optional, defaults to [`DEFAULT_API_VERSION`]
    pub fn from_env() -> StoreResult<Option<Self>> {
        dotenvy::dotenv().ok();

        let mode_var = env::var("SQUARE_ENV").ok();
        let sandbox = credentials_from_env(
            "SQUARE_SANDBOX_ACCESS_TOKEN",
            "SQUARE_SANDBOX_LOCATION_ID",
        )?;
        let production = credentials_from_env(
            "SQUARE_PRODUCTION_ACCESS_TOKEN",
            "SQUARE_PRODUCTION_LOCATION_ID",
        )?;

        let mode = match mode_var.as_deref() {
            None => {
                if sandbox.is_some() || production.is_some() {
                    return Err(StoreError::not_configured(
                        "SQUARE_ENV must be set when Square credentials are present",
                    ));
                }
                return Ok(None);
            }
            Some(raw) => SquareMode::parse(raw).ok_or_else(|| {
                StoreError::not_configured(
                    "SQUARE_ENV must be one of: sandbox, production, auto",
                )
            })?,
        };

        let api_version =
            env::var("SQUARE_API_VERSION").unwrap_or_else(|_| DEFAULT_API_VERSION.to_string());

        let config = Self {
            mode,
            sandbox,
            production,
            sandbox_base_url: SANDBOX_BASE_URL.to_string(),
            production_base_url: PRODUCTION_BASE_URL.to_string(),
            api_version,
        };
        config.validate()?;
        Ok(Some(config))
    }

    /// Create a sandbox-only configuration. Useful for testing.
    pub fn sandbox_only(access_token: impl Into<String>, location_id: impl Into<String>) -> Self {
        Self {
            mode: SquareMode::Sandbox,
            sandbox: Some(SquareCredentials {
                access_token: access_token.into(),
                location_id: location_id.into(),
            }),
            production: None,
            sandbox_base_url: SANDBOX_BASE_URL.to_string(),
            production_base_url: PRODUCTION_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    /// Create an auto-mode configuration with both credential pairs.
    /// Useful for testing the fallback path.
    pub fn auto(sandbox: SquareCredentials, production: SquareCredentials) -> Self {
        Self {
            mode: SquareMode::Auto,
            sandbox: Some(sandbox),
            production: Some(production),
            sandbox_base_url: SANDBOX_BASE_URL.to_string(),
            production_base_url: PRODUCTION_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    /// Override the sandbox host. Useful for testing with a mock server.
    pub fn with_sandbox_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.sandbox_base_url = base_url.into();
        self
    }

    /// Override the production host. Useful for testing with a mock server.
    pub fn with_production_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.production_base_url = base_url.into();
        self
    }

    fn validate(&self) -> StoreResult<()> {
        match self.mode {
            SquareMode::Sandbox if self.sandbox.is_none() => Err(StoreError::not_configured(
                "SQUARE_ENV=sandbox requires SQUARE_SANDBOX_ACCESS_TOKEN and SQUARE_SANDBOX_LOCATION_ID",
            )),
            SquareMode::Production if self.production.is_none() => {
                Err(StoreError::not_configured(
                    "SQUARE_ENV=production requires SQUARE_PRODUCTION_ACCESS_TOKEN and SQUARE_PRODUCTION_LOCATION_ID",
                ))
            }
            SquareMode::Auto if self.sandbox.is_none() && self.production.is_none() => {
                Err(StoreError::not_configured(
                    "SQUARE_ENV=auto requires at least one credential pair",
                ))
            }
            _ => Ok(()),
        }
    }

    /// Credential pairs a new checkout may attempt, in order.
    ///
    /// Sandbox always outranks production so that auto mode never
    /// charges a real card while a sandbox token still works.
    pub fn candidates(&self) -> Vec<(ProcessorEnvironment, &SquareCredentials)> {
        let mut out = Vec::new();
        match self.mode {
            SquareMode::Sandbox => {
                if let Some(creds) = &self.sandbox {
                    out.push((ProcessorEnvironment::Sandbox, creds));
                }
            }
            SquareMode::Production => {
                if let Some(creds) = &self.production {
                    out.push((ProcessorEnvironment::Production, creds));
                }
            }
            SquareMode::Auto => {
                if let Some(creds) = &self.sandbox {
                    out.push((ProcessorEnvironment::Sandbox, creds));
                }
                if let Some(creds) = &self.production {
                    out.push((ProcessorEnvironment::Production, creds));
                }
            }
        }
        out
    }

    /// Credentials recorded for a specific environment, if configured.
    pub fn credentials_for(
        &self,
        environment: ProcessorEnvironment,
    ) -> Option<&SquareCredentials> {
        match environment {
            ProcessorEnvironment::Sandbox => self.sandbox.as_ref(),
            ProcessorEnvironment::Production => self.production.as_ref(),
        }
    }

    /// API host for the given environment.
    pub fn base_url(&self, environment: ProcessorEnvironment) -> &str {
        match environment {
            ProcessorEnvironment::Sandbox => &self.sandbox_base_url,
            ProcessorEnvironment::Production => &self.production_base_url,
        }
    }
}

fn credentials_from_env(
    token_var: &str,
    location_var: &str,
) -> StoreResult<Option<SquareCredentials>> {
    let token = env::var(token_var).ok().filter(|v| !v.trim().is_empty());
    let location = env::var(location_var).ok().filter(|v| !v.trim().is_empty());
    match (token, location) {
        (Some(access_token), Some(location_id)) => Ok(Some(SquareCredentials {
            access_token,
            location_id,
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(StoreError::not_configured(format!(
            "{location_var} must be set alongside {token_var}"
        ))),
        (None, Some(_)) => Err(StoreError::not_configured(format!(
            "{token_var} must be set alongside {location_var}"
        ))),
    }
}
