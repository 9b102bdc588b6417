//! `keyward init` — First-time setup.

use keyward_config::{CONFIG_FILE, KeywardConfig};
use keyward_security::{AuditEvent, SecretStore};

use super::Context;

pub async fn run(ctx: &Context, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = ctx.config_dir.join(CONFIG_FILE);

    println!("🔐 Keyward — First-Time Setup");
    println!("=============================\n");

    if config_path.exists() && !force {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or re-run with --force to reset it.\n");
    } else {
        let result = KeywardConfig::default()
            .save_to(&ctx.config_dir)
            .map_err(keyward_core::Error::from);
        ctx.audit.log_result(
            AuditEvent::ConfigWritten {
                path: config_path.display().to_string(),
            },
            "init",
            &result,
        );
        let written = result?;
        println!("✅ Created config.toml at: {}", written.display());
    }

    let vault = ctx.vault()?;
    println!("✅ Vault key at: {}", vault.key_path().display());
    println!("   Tokens stored: {}", vault.names()?.len());

    println!("\n📝 Next steps:");
    println!("   1. Store a token:   keyward secret set jira");
    println!("   2. Check a path:    keyward path check notes/today.md");
    println!("   3. Call an API:     keyward fetch jira https://jira.example.com/myself");

    Ok(())
}
