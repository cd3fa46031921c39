//! Whole-frame analysis: detect faces, then classify each crop

use face_frame::{BoundingBox, FaceDetector, FaceImage};
use serde::Serialize;
use tracing::debug;

use crate::fusion::{FusedPrediction, FusionEngine};
use crate::{Ensemble, EnsembleError, Prediction};

/// Smoothed result for one detected face
#[derive(Debug, Clone, Serialize)]
pub struct FaceAnalysis {
    pub bbox: BoundingBox,
    pub prediction: Prediction,
}

/// Detect faces and fuse every non-empty crop, without smoothing
///
/// Boxes are clamped to the frame; boxes that end up empty are skipped.
pub fn detect_and_fuse(
    detector: &dyn FaceDetector,
    engine: &FusionEngine,
    frame: &FaceImage,
) -> Result<Vec<(BoundingBox, FusedPrediction)>, EnsembleError> {
    let boxes = detector.detect(frame)?;
    debug!("Detected {} face(s) in {}x{} frame", boxes.len(), frame.width(), frame.height());

    let mut results = Vec::with_capacity(boxes.len());
    for bbox in boxes {
        let clamped = bbox.clamp(frame.width(), frame.height());
        if clamped.area() == 0 {
            debug!("Skipping empty face box {:?}", bbox);
            continue;
        }
        let crop = frame.crop(&clamped)?;
        results.push((clamped, engine.fuse(&crop)?));
    }

    Ok(results)
}

/// Detect faces in `frame` and predict each one with `ensemble`
///
/// With several faces every crop feeds the same smoothing history, one
/// observation per face in detection order.
pub fn analyze_frame(
    detector: &dyn FaceDetector,
    ensemble: &mut Ensemble,
    frame: &FaceImage,
    use_smoothing: bool,
) -> Result<Vec<FaceAnalysis>, EnsembleError> {
    let fused = detect_and_fuse(detector, ensemble.engine(), frame)?;

    Ok(fused
        .into_iter()
        .map(|(bbox, fused)| FaceAnalysis {
            bbox,
            prediction: ensemble.smooth(fused, use_smoothing),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::EnsembleMember;
    use classifier::{LabelSet, MockClassifier};
    use face_frame::{FrameError, WholeFrameDetector};
    use preprocess::GrayscalePreprocessor;
    use std::sync::Arc;

    struct FixedBoxes(Vec<BoundingBox>);

    impl FaceDetector for FixedBoxes {
        fn detect(&self, _frame: &FaceImage) -> Result<Vec<BoundingBox>, FrameError> {
            Ok(self.0.clone())
        }
    }

    fn ensemble() -> Ensemble {
        let labels = LabelSet::new(["A", "B"]).unwrap();
        let engine = FusionEngine::builder(labels.clone())
            .member(EnsembleMember::new(
                "m1",
                "d",
                0.5,
                Box::new(GrayscalePreprocessor::new(4)),
                Box::new(MockClassifier::fixed("m1", labels.clone(), vec![0.1, 0.9])),
            ))
            .member(EnsembleMember::new(
                "m2",
                "d",
                0.5,
                Box::new(GrayscalePreprocessor::new(4)),
                Box::new(MockClassifier::fixed("m2", labels, vec![0.3, 0.7])),
            ))
            .build()
            .unwrap();
        Ensemble::new(Arc::new(engine))
    }

    fn frame() -> FaceImage {
        FaceImage::rgb(vec![100; 20 * 10 * 3], 20, 10).unwrap()
    }

    #[test]
    fn test_whole_frame_detector() {
        let mut ensemble = ensemble();
        let faces = analyze_frame(&WholeFrameDetector, &mut ensemble, &frame(), true).unwrap();

        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].bbox, BoundingBox::new(0, 0, 20, 10));
        assert_eq!(faces[0].prediction.label, "B");
        assert_eq!(ensemble.history_labels(), vec!["B"]);
    }

    #[test]
    fn test_boxes_clamped_and_empty_skipped() {
        let detector = FixedBoxes(vec![
            BoundingBox::new(-5, -5, 8, 8),
            BoundingBox::new(30, 30, 40, 40),
            BoundingBox::new(12, 2, 12, 9),
        ]);
        let mut ensemble = ensemble();
        let faces = analyze_frame(&detector, &mut ensemble, &frame(), false).unwrap();

        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].bbox, BoundingBox::new(0, 0, 8, 8));
    }

    #[test]
    fn test_no_faces_leaves_history_untouched() {
        let mut ensemble = ensemble();
        let faces = analyze_frame(&FixedBoxes(Vec::new()), &mut ensemble, &frame(), true).unwrap();
        assert!(faces.is_empty());
        assert!(ensemble.history_labels().is_empty());
    }
}
