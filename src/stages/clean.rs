//! Output-tree removal.

use std::fs;
use std::path::Path;

use super::{Stage, StageError, StageReport};
use crate::context::BuildContext;

fn remove_tree(path: &Path) -> Result<(), StageError> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    Ok(())
}

/// Removes both the intermediate and the output tree.
pub struct Clean;

impl Stage for Clean {
    fn name(&self) -> &str {
        "clean"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError> {
        remove_tree(&ctx.temp_dir())?;
        remove_tree(&ctx.dist_dir())?;
        Ok(StageReport::default())
    }
}

/// Removes only the intermediate tree, after its content reached dist.
pub struct CleanTemp;

impl Stage for CleanTemp {
    fn name(&self) -> &str {
        "clean-temp"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError> {
        remove_tree(&ctx.temp_dir())?;
        Ok(StageReport::default())
    }
}
