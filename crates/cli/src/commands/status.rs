//! `keyward status` — Show configuration and vault state.

use keyward_config::CONFIG_FILE;
use keyward_security::SecretStore;

use super::Context;

pub async fn run(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = ctx.config_dir.join(CONFIG_FILE);
    let key_path = ctx.config_dir.join(&ctx.config.vault.key_file);
    let secrets_path = ctx.config_dir.join(&ctx.config.vault.secrets_file);

    println!("🔐 Keyward Status");
    println!("=================");
    println!("  Config dir:   {}", ctx.config_dir.display());
    let base_dir = ctx.config.resolved_base_dir()?;
    println!("  Base dir:     {}", base_dir.display());
    println!("  Key file:     {}", presence(key_path.exists()));
    println!("  Token file:   {}", presence(secrets_path.exists()));

    // Opening the vault would create a key, so only count records once one exists.
    if key_path.exists() {
        let names = ctx.vault()?.names()?;
        let tokens = if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        };
        println!("  Tokens:       {tokens}");
    }

    println!("\n  Rate limits:");
    for (target, limit) in &ctx.config.rate_limits {
        println!("    {target:<10} {}/{}s", limit.limit, limit.window_secs);
    }

    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `keyward init` first");
    }

    Ok(())
}

fn presence(exists: bool) -> &'static str {
    if exists { "present" } else { "missing" }
}
