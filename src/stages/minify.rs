//! Final delivery pass from temp into dist.
//!
//! In production mode content is minified; in development it is formatted
//! (passed through readable) so dist stays debuggable. Bundles already
//! written into dist by concatenation get the same treatment in place.

use std::fs;

use super::{Stage, StageError, StageReport};
use crate::context::BuildContext;
use crate::fileset::FileSet;
use crate::tools::AssetKind;

fn transform(ctx: &BuildContext, content: &str, kind: AssetKind) -> String {
    if ctx.mode.minify() {
        ctx.toolchain.minifier.minify(content, kind)
    } else {
        ctx.toolchain.minifier.format(content, kind)
    }
}

/// temp/**/*.ext -> dist, plus in-place treatment of dist bundles.
fn deliver(ctx: &BuildContext, ext: &str, kind: AssetKind) -> Result<StageReport, StageError> {
    let temp_rel = &ctx.config.project.temp;
    let dist_rel = &ctx.config.project.dist;

    let set = FileSet::new(
        format!("{}/**/*.{}", temp_rel.display(), ext),
        temp_rel.clone(),
        dist_rel.clone(),
    );

    let mut written = 0;
    for mapping in set.resolve(&ctx.project_root)? {
        let content = fs::read_to_string(&mapping.source)?;
        if let Some(parent) = mapping.dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&mapping.dest, transform(ctx, &content, kind))?;
        written += 1;
    }

    // Bundles landed in dist before this stage ran; give them the same
    // pass. Both transforms are idempotent, so files written above are
    // safe to touch again.
    let bundles = FileSet::new(
        format!("{}/**/*.{}", dist_rel.display(), ext),
        dist_rel.clone(),
        dist_rel.clone(),
    );
    for mapping in bundles.resolve(&ctx.project_root)? {
        let content = fs::read_to_string(&mapping.source)?;
        fs::write(&mapping.source, transform(ctx, &content, kind))?;
    }

    // Development builds carry their source maps into dist.
    if ctx.mode.emit_source_maps() {
        let maps = FileSet::new(
            format!("{}/**/*.{}.map", temp_rel.display(), ext),
            temp_rel.clone(),
            dist_rel.clone(),
        );
        for mapping in maps.resolve(&ctx.project_root)? {
            if let Some(parent) = mapping.dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&mapping.source, &mapping.dest)?;
            written += 1;
        }
    }

    Ok(StageReport::written(written))
}

pub struct MinifyMarkup;

impl Stage for MinifyMarkup {
    fn name(&self) -> &str {
        "minify-markup"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError> {
        deliver(ctx, "html", AssetKind::Markup)
    }
}

pub struct MinifyStyles;

impl Stage for MinifyStyles {
    fn name(&self) -> &str {
        "minify-styles"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError> {
        deliver(ctx, "css", AssetKind::Styles)
    }
}

pub struct MinifyScripts;

impl Stage for MinifyScripts {
    fn name(&self) -> &str {
        "minify-scripts"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError> {
        deliver(ctx, "js", AssetKind::Scripts)
    }
}
