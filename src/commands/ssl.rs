// ABOUTME: SSL command: toggle the force-SSL redirect or issue a certificate now.
// ABOUTME: Works on the production domain of a target.

use super::context::AppContext;
use crate::cli::SslAction;
use deckhand::acme::CertificateIssuer;
use deckhand::error::{Error, Result};
use deckhand::output::Output;
use deckhand::types::TargetId;

pub async fn ssl(ctx: AppContext, target: TargetId, action: SslAction, output: Output) -> Result<()> {
    let deployment_target = ctx.target(&target)?;
    let domain = deployment_target
        .domain
        .clone()
        .ok_or_else(|| Error::NoDomain(target.to_string()))?;
    let host = domain.host();

    match action {
        SslAction::Force => {
            ctx.services.proxy.enable_force_ssl(host).await?;
            output.success(&format!("HTTP requests for {} now redirect to HTTPS", host));
        }
        SslAction::Unforce => {
            ctx.services.proxy.disable_force_ssl(host).await?;
            output.success(&format!("HTTP requests for {} are no longer redirected", host));
        }
        SslAction::Generate => {
            output.progress(&format!("Requesting certificate for {}", host));
            let certificate = ctx.services.certificates.issue(&domain, &target).await?;
            ctx.services.ledger.record(&certificate)?;
            output.success(&format!("Certificate for {} stored at {}", host, certificate.path));
        }
    }
    Ok(())
}
