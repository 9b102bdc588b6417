//! `keyward fetch` — GET a URL through an integration's rate limiter.
//!
//! The target name selects both the `[rate_limits.<target>]` budget and the
//! vault token sent as a bearer credential. A token echoed back in the
//! response body is redacted before printing.

use std::time::Duration;

use keyward_security::validation::validate_url;
use keyward_security::{AuditEvent, AuditOutcome, SecretStore, Vault};
use keyward_transport::HttpRateLimiter;
use tracing::warn;

use super::Context;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn run(
    ctx: &Context,
    target: &str,
    url: &str,
    count: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    validate_url(url)?;

    let limit = ctx
        .config
        .rate_limit(target)
        .ok_or_else(|| format!("No rate limit configured for '{target}'"))?;
    let token = bearer_token(ctx, target)?;

    let inner = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let limiter = HttpRateLimiter::new(limit.limit, limit.window());
    let client = limiter.wrap(inner, target);
    let count = count.max(1);

    for attempt in 1..=count {
        let mut request = client.get(url);
        if let Some(token) = &token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                if e.is_rate_limited() {
                    ctx.audit.log(
                        AuditEvent::RateLimited { key: target.into() },
                        "fetch",
                        AuditOutcome::Denied,
                        Some(format!(
                            "request {attempt} of {count}, limit {} per {}s",
                            limit.limit, limit.window_secs
                        )),
                    );
                }
                return Err(e.into());
            }
        };

        let status = response.status();
        let body = redact(response.text().await?, token.as_deref(), target);
        println!("[{attempt}/{count}] {status}");
        println!("{body}");
    }

    Ok(())
}

/// The vault token for `target`, if one is stored.
fn bearer_token(ctx: &Context, target: &str) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let vault = ctx.vault()?;
    let token = vault.retrieve_optional(target)?;
    if token.is_some() {
        ctx.audit.log(
            AuditEvent::SecretRead {
                name: target.into(),
            },
            "fetch",
            AuditOutcome::Success,
            None,
        );
    }
    Ok(token)
}

fn redact(body: String, token: Option<&str>, target: &str) -> String {
    match token {
        Some(token) if Vault::scan_for_leakage(&body, &[token.to_string()]) => {
            warn!(integration = target, "Redacting echoed token");
            body.replace(token, "[REDACTED]")
        }
        _ => body,
    }
}
