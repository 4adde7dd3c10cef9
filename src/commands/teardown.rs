// ABOUTME: Teardown command: remove one preview or every preview of a target.
// ABOUTME: Production containers and routes are left alone.

use super::context::AppContext;
use deckhand::deploy::{teardown_all_previews, teardown_preview};
use deckhand::error::Result;
use deckhand::output::Output;
use deckhand::types::{PreviewId, TargetId};

pub async fn teardown(
    ctx: AppContext,
    target: TargetId,
    preview: Option<PreviewId>,
    output: Output,
) -> Result<()> {
    let deployment_target = ctx.target(&target)?;
    let engine = ctx.engine_for(&deployment_target).await?;
    let proxy = &ctx.services.proxy;
    let stop = ctx.settings.timeouts.stop;

    match preview {
        Some(preview) => {
            output.progress(&format!("Removing preview {} of {}", preview, target));
            let report =
                teardown_preview(engine.as_ref(), proxy, &deployment_target, preview, stop).await?;
            for name in &report.removed {
                output.progress(&format!("  removed {}", name));
            }
            output.success(&format!("Preview {} of {} removed", preview, target));
        }
        None => {
            let removed =
                teardown_all_previews(engine.as_ref(), proxy, &deployment_target, stop).await?;
            if removed.is_empty() {
                output.success(&format!("No previews of {}", target));
            } else {
                let ids: Vec<String> = removed.iter().map(|p| p.to_string()).collect();
                output.success(&format!("Removed previews of {}: {}", target, ids.join(", ")));
            }
        }
    }
    Ok(())
}
