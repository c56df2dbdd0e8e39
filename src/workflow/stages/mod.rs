pub mod enrich;
pub mod format;
pub mod generate;
pub mod image;
pub mod video;
pub mod website;

use crate::error::Result;
use crate::workflow::graph::Stage;
use crate::workflow::state::StatePatch;
use log::warn;

/// Contain a stage failure: the error becomes a note and the graph moves on
pub(crate) fn contain(stage: Stage, result: Result<StatePatch>) -> StatePatch {
    match result {
        Ok(patch) => patch,
        Err(e) => {
            warn!("{} failed: {}", stage, e);
            StatePatch::note(format!("{}: {}", stage, e))
        }
    }
}
