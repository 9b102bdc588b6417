//! `keyward file cat` — Read a file through the path guard.

use super::Context;

pub async fn cat(ctx: &Context, rel_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let guard = ctx.config.path_guard()?;
    let result = guard.safe_read_to_string(rel_path);
    ctx.audit_path("file cat", rel_path, &result);

    print!("{}", result?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::Fixture;
    use keyward_security::AuditOutcome;

    #[tokio::test]
    async fn reads_file_inside_base() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.base().join("notes")).unwrap();
        std::fs::write(fx.base().join("notes/today.md"), "standup at 10\n").unwrap();

        cat(&fx.ctx, "notes/today.md").await.unwrap();
        assert_eq!(fx.ctx.audit.count(), 0);
    }

    #[tokio::test]
    async fn refuses_file_outside_base() {
        let fx = Fixture::new();
        std::fs::write(fx.tmp.path().join("secret.txt"), "nope").unwrap();

        assert!(cat(&fx.ctx, "../secret.txt").await.is_err());
        let denied = fx.ctx.audit.entries_by_outcome(AuditOutcome::Denied);
        assert_eq!(denied.len(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_io_error_not_denial() {
        let fx = Fixture::new();
        assert!(cat(&fx.ctx, "nothing-here.txt").await.is_err());
        assert_eq!(fx.ctx.audit.count(), 0);
    }
}
