//! Publishing the built output tree.

use super::{Stage, StageError, StageReport};
use crate::context::BuildContext;
use crate::tools::ToolError;

/// Hands the dist tree to the configured publisher.
pub struct Publish;

impl Stage for Publish {
    fn name(&self) -> &str {
        "publish"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError> {
        let dist = ctx.dist_dir();
        if !dist.is_dir() {
            return Err(StageError::MissingRoot(dist));
        }

        let target = ctx.resolve_path(&ctx.config.deploy.target);
        let published = ctx
            .toolchain
            .publisher
            .publish(&dist, &target)
            .map_err(|e| match e {
                ToolError::Io(io) => StageError::Io(io),
                ToolError::Malformed(msg) => StageError::Tool(msg),
            })?;
        Ok(StageReport::written(published))
    }
}
