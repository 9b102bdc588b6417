//! `keyward secret` — Manage encrypted tokens.

use std::io::BufRead;

use keyward_security::validation::validate_api_key;
use keyward_security::{AuditEvent, SecretStore};

use super::Context;

/// Read a token from the first line of stdin, trimmed.
pub fn read_value_from_stdin() -> Result<String, Box<dyn std::error::Error>> {
    eprint!("Token: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

pub async fn set(ctx: &Context, name: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    validate_api_key(value)?;

    let vault = ctx.vault()?;
    let result = vault.store(name, value).map_err(keyward_core::Error::from);
    ctx.audit.log_result(
        AuditEvent::SecretStored { name: name.into() },
        "secret set",
        &result,
    );
    result?;

    println!("✅ Stored token '{name}'");
    Ok(())
}

pub async fn get(ctx: &Context, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let vault = ctx.vault()?;
    let result = vault.retrieve(name).map_err(keyward_core::Error::from);
    ctx.audit.log_result(
        AuditEvent::SecretRead { name: name.into() },
        "secret get",
        &result,
    );

    println!("{}", result?);
    Ok(())
}

pub async fn remove(ctx: &Context, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let vault = ctx.vault()?;
    let result = vault.delete(name).map_err(keyward_core::Error::from);
    ctx.audit.log_result(
        AuditEvent::SecretDeleted { name: name.into() },
        "secret rm",
        &result,
    );
    result?;

    println!("🗑️  Removed token '{name}'");
    Ok(())
}

pub async fn list(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let names = ctx.vault()?.names()?;

    if names.is_empty() {
        println!("No tokens stored. Add one with `keyward secret set <name>`.");
    } else {
        for name in names {
            println!("  • {name}");
        }
    }
    Ok(())
}
