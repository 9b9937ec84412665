//! Live frame loop state for one camera session.

use crate::error::Result;
use crate::geo::{CanonicalLocation, CellResolver, Location};
use crate::inference::{
    Classifier, ClassifierRequest, EchoedOptions, Frame, FrameOptions, OutputShape,
};
use crate::pipeline::results::StabilizedResult;
use crate::stabilize::ResultBuffer;
use crate::taxonomy::{annotate, rollup, scale_scores};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

#[derive(Debug)]
struct SessionState {
    buffer: ResultBuffer,
    last: Option<StabilizedResult>,
}

/// Per-session frame processing with temporal stabilization.
///
/// Each session owns its result buffer. Buffer updates and resets share one
/// lock, so a reset from another thread never interleaves with a push and
/// select.
pub struct FrameSession {
    classifier: Arc<dyn Classifier>,
    resolver: CellResolver,
    state: Mutex<SessionState>,
}

impl FrameSession {
    /// Start a session keeping the last `buffer_size` frame results.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        resolver: CellResolver,
        buffer_size: usize,
    ) -> Result<Self> {
        Ok(Self {
            classifier,
            resolver,
            state: Mutex::new(SessionState {
                buffer: ResultBuffer::new(buffer_size)?,
                last: None,
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Classify a frame and return the stabilized result.
    ///
    /// Invalid options fail before the classifier runs. A classifier failure
    /// is logged and the previous stabilized result is returned instead, so
    /// one bad frame does not interrupt the stream. `None` means no frame has
    /// been stabilized yet.
    pub fn process_frame(
        &self,
        frame: &Frame,
        options: &FrameOptions,
    ) -> Result<Option<StabilizedResult>> {
        let validated = options.validate()?;
        let location = validated
            .geo_location
            .as_ref()
            .map(|l| self.resolver.resolve(l))
            .transpose()?;

        let request = ClassifierRequest {
            version: options.version.clone(),
            crop_ratio: options.crop_ratio,
            output: OutputShape::BestBranch,
            taxon_filter: validated.taxon_filter,
            location,
        };

        let raw = match self.classifier.classify_frame(frame, &request) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Frame classification failed, keeping previous result: {e}");
                return Ok(self.last_result());
            }
        };

        let mut result = annotate(raw.normalize());
        result.options = Some(EchoedOptions::from(options));

        let mut state = self.state();
        state.buffer.push(result);
        let stabilized = state.buffer.select_best().cloned().map(|mut best| {
            best.predictions = rollup(
                scale_scores(best.predictions),
                validated.confidence_threshold,
            );
            best
        });
        debug!(
            "Stabilized over {} frames: {} predictions",
            state.buffer.len(),
            stabilized.as_ref().map_or(0, |r| r.predictions.len())
        );
        state.last.clone_from(&stabilized);
        Ok(stabilized)
    }

    /// Forget every buffered frame and the last stabilized result.
    pub fn reset_stored_results(&self) {
        let mut state = self.state();
        state.buffer.clear();
        state.last = None;
        debug!("Frame session reset");
    }

    /// The most recent stabilized result, if any.
    pub fn last_result(&self) -> Option<StabilizedResult> {
        self.state().last.clone()
    }

    /// Number of frame results currently buffered.
    pub fn buffered(&self) -> usize {
        self.state().buffer.len()
    }

    /// Canonicalize a location with this session's resolver.
    pub fn cell_location(&self, location: &Location) -> Result<CanonicalLocation> {
        self.resolver.resolve(location)
    }
}

impl std::fmt::Debug for FrameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSession")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
