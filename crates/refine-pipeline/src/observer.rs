use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::warn;

use refine_types::Bitmap;

/// Debug tap consumed by the orchestrator at fixed stage names.
///
/// The bitmap view is borrowed for the duration of the call only; the
/// observer must not retain it. A panicking observer never fails the
/// pipeline.
pub trait PipelineObserver {
    fn tap(&mut self, stage: &str, bitmap: &Bitmap, meta: &HashMap<String, String>);
}

pub(crate) fn emit(
    observer: &mut Option<&mut dyn PipelineObserver>,
    stage: &str,
    bitmap: &Bitmap,
    meta: &HashMap<String, String>,
) {
    if let Some(obs) = observer.as_mut() {
        let outcome = catch_unwind(AssertUnwindSafe(|| obs.tap(stage, bitmap, meta)));
        if outcome.is_err() {
            warn!(stage, "debug observer panicked, continuing");
        }
    }
}

pub(crate) fn empty_meta() -> HashMap<String, String> {
    HashMap::new()
}
