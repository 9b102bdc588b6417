//! `keyward path check` — Show where a relative path resolves.

use super::Context;

pub async fn check(ctx: &Context, rel_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let guard = ctx.config.path_guard()?;
    let result = guard.sanitize(rel_path);
    ctx.audit_path("path check", rel_path, &result);

    let resolved = result?;
    println!("✅ {rel_path} → {}", resolved.display());
    println!("   Base: {}", guard.base().display());
    Ok(())
}
