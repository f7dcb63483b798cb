//! Subcommand handlers

use std::process::ExitCode;

use anyhow::{Context, Result};
use bytes::Bytes;
use cdn_orchestrator_provider::{
    CanonicalRequest, CdnProvider, HEADER_AUTH_SIGN, HEADER_SDK_DATE, PaginationParams, Signer,
    datetime::format_sdk_date,
};
use chrono::{Duration, Utc};
use serde_json::Value;

use crate::cli::{CallMethod, Command, DomainsCommand, GlobalArgs, RequestArgs, params_from_pairs};

/// Exit status of a verification that ran but did not match.
pub const EXIT_VERIFY_FAILED: u8 = 2;

pub async fn run(global: &GlobalArgs, command: Command) -> Result<ExitCode> {
    match command {
        Command::Sign(args) => sign(global, &args),
        Command::Verify {
            request,
            signature,
            max_skew_minutes,
        } => verify(global, &request, &signature, max_skew_minutes),
        Command::Call {
            method,
            path,
            params,
        } => call(global, method, &path, &params).await,
        Command::Domains(cmd) => domains(global, cmd).await,
    }
}

// ==================== 离线签名 ====================

/// Assemble the request described by `args` without sending it.
///
/// The query string is percent-encoded from the `key=value` pairs in the
/// order given; signing canonicalizes it.
pub fn build_request(args: &RequestArgs) -> Result<http::Request<Bytes>> {
    let mut uri = if args.path.starts_with('/') {
        args.path.clone()
    } else {
        format!("/{}", args.path)
    };
    if !args.query.is_empty() {
        let query = args
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        uri.push('?');
        uri.push_str(&query);
    }

    let mut builder = http::Request::builder()
        .method(args.method.clone())
        .uri(uri.as_str());
    if let Some(date) = args.date {
        builder = builder.header(HEADER_SDK_DATE, format_sdk_date(date));
    }
    let body = args.body.clone().map(Bytes::from).unwrap_or_default();
    builder
        .body(body)
        .with_context(|| format!("invalid request target '{uri}'"))
}

/// Human-readable signing trace.
pub fn describe_signature(signer: &Signer, request: &mut http::Request<Bytes>) -> Result<String> {
    let authorization = signer.sign(request).context("failed to sign request")?;
    let canonical = CanonicalRequest::from_request(&*request)?;
    let date = request
        .headers()
        .get(HEADER_SDK_DATE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let signature = authorization.trim_start_matches("Bearer ");

    Ok(format!(
        "CanonicalRequest:\n{canonical}\n\n\
         StringToSign:\n{}\n\n\
         X-Sdk-Date: {date}\n\
         Authorization: {authorization}\n\
         X-Auth-Sign: {signature}",
        Signer::string_to_sign(&date, &canonical)
    ))
}

fn sign(global: &GlobalArgs, args: &RequestArgs) -> Result<ExitCode> {
    let signer = Signer::new(global.credentials()?);
    let mut request = build_request(args)?;
    println!("{}", describe_signature(&signer, &mut request)?);
    Ok(ExitCode::SUCCESS)
}

fn verify(
    global: &GlobalArgs,
    args: &RequestArgs,
    signature: &str,
    max_skew_minutes: Option<i64>,
) -> Result<ExitCode> {
    if args.date.is_none() {
        anyhow::bail!("--date is required to verify a signature");
    }
    let signer = Signer::new(global.credentials()?);
    let mut request = build_request(args)?;
    request.headers_mut().insert(
        HEADER_AUTH_SIGN,
        http::HeaderValue::from_str(signature.trim()).context("invalid --signature")?,
    );

    let result = match max_skew_minutes {
        Some(minutes) => {
            let allowed = Duration::try_minutes(minutes)
                .with_context(|| format!("--max-skew-minutes {minutes} is out of range"))?;
            signer.verify_with_skew(&request, Utc::now(), allowed)
        }
        None => signer.verify(&request),
    };

    match result {
        Ok(()) => {
            println!("signature valid");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::warn!("Verification failed: {e}");
            println!("signature invalid: {e}");
            Ok(ExitCode::from(EXIT_VERIFY_FAILED))
        }
    }
}

// ==================== 远程调用 ====================

async fn call(
    global: &GlobalArgs,
    method: CallMethod,
    path: &str,
    pairs: &[(String, String)],
) -> Result<ExitCode> {
    let client = global.client()?;
    let data: Value = client
        .request(method.into(), path, params_from_pairs(pairs))
        .await
        .with_context(|| format!("{} {path} failed", http::Method::from(method)))?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(ExitCode::SUCCESS)
}

async fn domains(global: &GlobalArgs, command: DomainsCommand) -> Result<ExitCode> {
    let client = global.client()?;
    match command {
        DomainsCommand::List {
            page,
            page_size,
            all,
            json,
        } => {
            let domains = if all {
                client.list_all_domains().await?
            } else {
                let result = client
                    .list_domains(&PaginationParams { page, page_size })
                    .await?;
                tracing::info!(
                    "Page {} ({} of {} domains, more: {})",
                    result.page,
                    result.items.len(),
                    result.total_count,
                    result.has_more
                );
                result.items
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&domains)?);
            } else {
                for domain in &domains {
                    println!(
                        "{}\t{}\t{:?}",
                        domain.domain,
                        domain.cname.as_deref().unwrap_or("-"),
                        domain.domain_status()
                    );
                }
            }
        }
        DomainsCommand::Get { name } => {
            let domain = client
                .get_domain(&name)
                .await
                .with_context(|| format!("failed to get domain '{name}'"))?;
            println!("{}", serde_json::to_string_pretty(&domain)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}
