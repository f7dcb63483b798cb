//! Command line definition

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use cdn_orchestrator_provider::{
    CdnClient, Credentials, DEFAULT_CLIENT_IP, DEFAULT_ENDPOINT, DEFAULT_MAX_RETRIES,
    DEFAULT_REQUEST_TIMEOUT_SECS, Params, datetime::parse_sdk_date,
};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;

/// Sign, verify and call the CDN vendor API
#[derive(Debug, Parser)]
#[command(name = "cdnctl", about, version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Application id sent as `app_id`
    #[arg(long, env = "CDN_APP_ID", global = true)]
    pub app_id: Option<String>,

    /// Application secret used as the HMAC key
    #[arg(long, env = "CDN_APP_SECRET", global = true, hide_env_values = true)]
    pub app_secret: Option<String>,

    /// API base URL
    #[arg(long, env = "CDN_ENDPOINT", global = true, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "CDN_TIMEOUT_SECS", global = true, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Automatic retries for transient failures
    #[arg(long, env = "CDN_MAX_RETRIES", global = true, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Value of the `client_ip` parameter
    #[arg(long, env = "CDN_CLIENT_IP", global = true, default_value = DEFAULT_CLIENT_IP)]
    pub client_ip: String,
}

impl GlobalArgs {
    pub fn credentials(&self) -> Result<Credentials> {
        let secret = self
            .app_secret
            .as_deref()
            .context("missing --app-secret (or CDN_APP_SECRET)")?;
        Ok(Credentials::new(
            self.app_id.clone().unwrap_or_default(),
            secret,
        ))
    }

    /// Client for network commands; both credentials are required.
    pub fn client(&self) -> Result<CdnClient> {
        if self.app_id.as_deref().is_none_or(str::is_empty) {
            bail!("missing --app-id (or CDN_APP_ID)");
        }
        let client = CdnClient::builder(self.credentials()?)
            .endpoint(self.endpoint.clone())
            .client_ip(self.client_ip.clone())
            .request_timeout(Duration::from_secs(self.timeout_secs))
            .max_retries(self.max_retries)
            .build()?;
        Ok(client)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign a request offline and print every intermediate value
    Sign(RequestArgs),

    /// Check a signature offline
    ///
    /// Exits with status 2 when the signature does not match.
    Verify {
        #[command(flatten)]
        request: RequestArgs,

        /// Hex signature to check
        #[arg(long)]
        signature: String,

        /// Also reject dates more than this many minutes from now
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        max_skew_minutes: Option<i64>,
    },

    /// Send a signed call and print its `data`
    Call {
        #[arg(long, value_enum, default_value_t = CallMethod::Get)]
        method: CallMethod,

        /// Path below the endpoint, e.g. /api/v5/domains
        #[arg(long)]
        path: String,

        /// Parameter as key=value; values that parse as JSON are sent as JSON
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
    },

    /// Accelerated domains
    #[command(subcommand)]
    Domains(DomainsCommand),
}

#[derive(Debug, Subcommand)]
pub enum DomainsCommand {
    /// List domains
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 20)]
        page_size: u32,

        /// Walk every page
        #[arg(long, conflicts_with_all = ["page", "page_size"])]
        all: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one domain
    Get { name: String },
}

/// Inputs of an offline request.
#[derive(Debug, Clone, Args)]
pub struct RequestArgs {
    #[arg(long, default_value = "GET", value_parser = parse_method)]
    pub method: http::Method,

    #[arg(long)]
    pub path: String,

    /// Query parameter as key=value (repeatable)
    #[arg(long = "query", value_parser = parse_key_value)]
    pub query: Vec<(String, String)>,

    /// Raw request body
    #[arg(long)]
    pub body: Option<String>,

    /// X-Sdk-Date to sign with (YYYYMMDDTHHMMSSZ); defaults to now
    #[arg(long, value_parser = parse_date)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CallMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl From<CallMethod> for http::Method {
    fn from(method: CallMethod) -> Self {
        match method {
            CallMethod::Get => Self::GET,
            CallMethod::Post => Self::POST,
            CallMethod::Put => Self::PUT,
            CallMethod::Delete => Self::DELETE,
        }
    }
}

fn parse_method(s: &str) -> Result<http::Method, String> {
    http::Method::from_bytes(s.to_ascii_uppercase().as_bytes())
        .map_err(|e| format!("invalid method '{s}': {e}"))
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_date(s: &str) -> Result<DateTime<Utc>, String> {
    parse_sdk_date(s).ok_or_else(|| format!("expected YYYYMMDDTHHMMSSZ, got '{s}'"))
}

/// `--param` pairs as call parameters.
///
/// A key given more than once becomes an array holding each value in order;
/// values that are themselves arrays are nested, not flattened.
pub fn params_from_pairs(pairs: &[(String, String)]) -> Params {
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for (key, _) in pairs {
        *occurrences.entry(key.as_str()).or_default() += 1;
    }

    let mut params = Params::new();
    for (key, raw) in pairs {
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::from(raw.as_str()));
        if occurrences.get(key.as_str()).copied().unwrap_or_default() > 1 {
            let slot = params
                .entry(key.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = slot {
                items.push(value);
            }
        } else {
            params.insert(key.clone(), value);
        }
    }
    params
}
