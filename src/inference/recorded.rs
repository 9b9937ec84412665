//! Replay backend serving classifier output recorded to JSON files.

use crate::error::{Error, Result};
use crate::geo::CanonicalLocation;
use crate::inference::{
    Classifier, ClassifierRequest, Frame, Geomodel, ImageSource, LeafScorer, RawResult,
    ScorerInput,
};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordingFile {
    Many(Vec<RawResult>),
    One(RawResult),
}

/// Returns recorded raw results in order, one per invocation.
///
/// Frames, images and locations passed in are ignored. Once every recorded
/// result has been served, further calls fail with [`Error::Inference`].
#[derive(Debug)]
pub struct RecordedClassifier {
    results: Vec<RawResult>,
    cursor: AtomicUsize,
}

impl RecordedClassifier {
    /// Serve the given results.
    pub fn new(results: Vec<RawResult>) -> Self {
        Self {
            results,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Load a recording.
    ///
    /// `.jsonl` files hold one raw result per line; anything else is parsed
    /// as a single JSON document holding one result or an array of them.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::RecordingRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let results = if path.extension().is_some_and(|ext| ext == "jsonl") {
            parse_lines(path, &contents)?
        } else {
            match serde_json::from_str::<RecordingFile>(&contents) {
                Ok(RecordingFile::Many(results)) => results,
                Ok(RecordingFile::One(result)) => vec![result],
                Err(e) => {
                    return Err(Error::RecordingParse {
                        path: path.to_path_buf(),
                        line: e.line(),
                        source: e,
                    });
                }
            }
        };

        info!(
            "Loaded {} recorded results from {}",
            results.len(),
            path.display()
        );
        Ok(Self::new(results))
    }

    /// Number of recorded results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the recording holds no results.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    fn next(&self) -> Result<RawResult> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        debug!("Serving recorded result {index}");
        self.results
            .get(index)
            .cloned()
            .ok_or_else(|| Error::Inference {
                reason: format!("recording exhausted after {} results", self.results.len()),
            })
    }
}

fn parse_lines(path: &Path, contents: &str) -> Result<Vec<RawResult>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line).map_err(|e| Error::RecordingParse {
                path: path.to_path_buf(),
                line: number + 1,
                source: e,
            })
        })
        .collect()
}

impl Classifier for RecordedClassifier {
    fn classify_frame(&self, _frame: &Frame, _request: &ClassifierRequest) -> Result<RawResult> {
        self.next()
    }

    fn classify_image(
        &self,
        _image: &ImageSource,
        _request: &ClassifierRequest,
    ) -> Result<RawResult> {
        self.next()
    }
}

impl Geomodel for RecordedClassifier {
    fn predict(&self, _location: &CanonicalLocation) -> Result<RawResult> {
        self.next()
    }
}

/// Leaf score vectors captured from the vision model and geomodel.
///
/// Stored as `{"vision": [...], "geo": [...]}` with `geo` optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordedScores {
    /// Vision model output, indexed by leaf class id.
    pub vision: Vec<f32>,
    /// Geomodel output, indexed by leaf class id.
    #[serde(default)]
    pub geo: Option<Vec<f32>>,
}

impl RecordedScores {
    /// Load recorded scores from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::RecordingRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&contents).map_err(|e| Error::RecordingParse {
            path: path.to_path_buf(),
            line: e.line(),
            source: e,
        })
    }

    /// Scorers replaying the vision and (if recorded) geomodel vectors.
    pub fn into_scorers(self) -> (Arc<dyn LeafScorer>, Option<Arc<dyn LeafScorer>>) {
        let vision: Arc<dyn LeafScorer> = Arc::new(FixedScores(self.vision));
        let geo = self
            .geo
            .map(|scores| Arc::new(FixedScores(scores)) as Arc<dyn LeafScorer>);
        (vision, geo)
    }
}

/// Returns the same score vector for every input.
struct FixedScores(Vec<f32>);

impl LeafScorer for FixedScores {
    fn score_leaves(&self, _input: ScorerInput<'_>) -> Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::inference::OutputShape;
    use std::io::Write;
    use tempfile::Builder;

    const LINE_A: &str =
        r#"{"predictions": [{"taxon_id": 1, "name": "Animalia", "score": 0.9, "rank_level": 70}]}"#;
    const LINE_B: &str =
        r#"{"predictions": [{"taxon_id": 2, "name": "Plantae", "score": 0.8, "rank_level": 70}]}"#;

    fn request() -> ClassifierRequest {
        ClassifierRequest {
            version: "2.13".to_string(),
            crop_ratio: 1.0,
            output: OutputShape::BestBranch,
            taxon_filter: None,
            location: None,
        }
    }

    fn write(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn first_id(result: RawResult) -> u32 {
        result.normalize().predictions[0].taxon_id
    }

    #[test]
    fn test_jsonl_served_in_order_then_exhausted() {
        let file = write(".jsonl", &format!("{LINE_A}\n\n{LINE_B}\n"));
        let recorded = RecordedClassifier::from_path(file.path()).unwrap();
        assert_eq!(recorded.len(), 2);

        let frame = Frame::default();
        assert_eq!(first_id(recorded.classify_frame(&frame, &request()).unwrap()), 1);
        assert_eq!(first_id(recorded.classify_frame(&frame, &request()).unwrap()), 2);
        assert!(matches!(
            recorded.classify_frame(&frame, &request()),
            Err(Error::Inference { .. })
        ));
    }

    #[test]
    fn test_jsonl_parse_error_reports_line() {
        let file = write(".jsonl", &format!("{LINE_A}\nnot json\n"));
        let result = RecordedClassifier::from_path(file.path());
        assert!(matches!(result, Err(Error::RecordingParse { line: 2, .. })));
    }

    #[test]
    fn test_single_json_document() {
        let file = write(".json", LINE_B);
        let recorded = RecordedClassifier::from_path(file.path()).unwrap();
        let image = ImageSource::Path("photo.jpg".into());
        assert_eq!(first_id(recorded.classify_image(&image, &request()).unwrap()), 2);
    }

    #[test]
    fn test_json_array_document() {
        let file = write(".json", &format!("[{LINE_A}, {LINE_B}]"));
        let recorded = RecordedClassifier::from_path(file.path()).unwrap();
        assert_eq!(recorded.len(), 2);
    }

    #[test]
    fn test_recorded_scores() {
        let file = write(".json", r#"{"vision": [0.25, 0.75], "geo": [1.0, 0.5]}"#);
        let scores = RecordedScores::from_path(file.path()).unwrap();
        let (vision, geo) = scores.into_scorers();

        let frame = Frame::default();
        let input = ScorerInput::Frame {
            frame: &frame,
            crop_ratio: 1.0,
        };
        assert_eq!(vision.score_leaves(input).unwrap(), vec![0.25, 0.75]);
        let features = [0.0; 5];
        assert_eq!(
            geo.unwrap()
                .score_leaves(ScorerInput::Location(&features))
                .unwrap(),
            vec![1.0, 0.5]
        );
    }

    #[test]
    fn test_recorded_scores_without_geo() {
        let file = write(".json", r#"{"vision": [1.0]}"#);
        let (_, geo) = RecordedScores::from_path(file.path()).unwrap().into_scorers();
        assert!(geo.is_none());
    }

    #[test]
    fn test_missing_file() {
        let result = RecordedClassifier::from_path(Path::new("/nonexistent/frames.jsonl"));
        assert!(matches!(result, Err(Error::RecordingRead { .. })));
    }
}
