//! Static asset handling.

use std::fs;

use super::{Stage, StageError, StageReport};
use crate::context::BuildContext;
use crate::fileset::FileSet;

fn copy_mappings(ctx: &BuildContext, set: &FileSet) -> Result<usize, StageError> {
    let mut copied = 0;
    for mapping in set.resolve(&ctx.project_root)? {
        if let Some(parent) = mapping.dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&mapping.source, &mapping.dest)?;
        copied += 1;
    }
    Ok(copied)
}

/// Copies fonts, images, and the public tree verbatim into dist.
///
/// Nothing here goes through a compiler; these files ship as-authored.
pub struct CopyAssets;

impl Stage for CopyAssets {
    fn name(&self) -> &str {
        "copy-assets"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError> {
        let src = &ctx.config.project.src;
        let public = &ctx.config.project.public;
        let dist = &ctx.config.project.dist;

        let mut written = 0;
        for pattern in ["assets/fonts/**/*", "assets/images/**/*"] {
            let set = FileSet::new(
                format!("{}/{}", src.display(), pattern),
                src.clone(),
                dist.clone(),
            );
            written += copy_mappings(ctx, &set)?;
        }

        // The public tree may be absent; a missing glob just matches nothing.
        let set = FileSet::new(
            format!("{}/**/*", public.display()),
            public.clone(),
            dist.clone(),
        );
        written += copy_mappings(ctx, &set)?;

        Ok(StageReport::written(written))
    }
}

/// Re-encodes delivery images into dist.
pub struct OptimizeImages;

impl Stage for OptimizeImages {
    fn name(&self) -> &str {
        "optimize-images"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError> {
        let src = &ctx.config.project.src;
        let set = FileSet::new(
            format!("{}/assets/images/**/*", src.display()),
            src.clone(),
            ctx.config.project.dist.clone(),
        );

        let mut written = 0;
        for mapping in set.resolve(&ctx.project_root)? {
            let bytes = fs::read(&mapping.source)?;
            let optimized = ctx.toolchain.images.optimize(&bytes);
            if let Some(parent) = mapping.dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&mapping.dest, optimized)?;
            written += 1;
        }
        Ok(StageReport::written(written))
    }
}
