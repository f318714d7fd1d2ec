//! Interactive prompts with CI/non-interactive fallback

use super::context::UiContext;
use crate::error::{PipelineError, PipelineResult};

/// Prompt for confirmation, returns default if non-interactive or auto-yes
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> PipelineResult<bool> {
    if ctx.auto_yes() {
        println!("  {} (auto-approved)", message);
        return Ok(true);
    }

    if !ctx.is_interactive() {
        return Ok(default);
    }

    // Run blocking cliclack prompt off the runtime
    let message = message.to_string();
    let result = tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message)
            .initial_value(default)
            .interact()
    })
    .await
    .map_err(|e| PipelineError::Internal(format!("prompt task failed: {e}")))?;

    result.map_err(|e| PipelineError::Internal(format!("prompt failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn confirm_auto_yes() {
        let ctx = UiContext::non_interactive().with_auto_yes(true);
        assert!(confirm(&ctx, "Clear caches?", false).await.unwrap());
    }

    #[tokio::test]
    async fn confirm_non_interactive_default() {
        let ctx = UiContext::non_interactive();
        assert!(confirm(&ctx, "Clear caches?", true).await.unwrap());
        assert!(!confirm(&ctx, "Clear caches?", false).await.unwrap());
    }
}
