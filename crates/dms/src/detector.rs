//! Face landmark detection
//!
//! The monitor only needs a landmark set per frame. `FaceMeshDetector` runs an
//! externally supplied face-mesh ONNX model through tract.

use camera_capture::frame::VideoFrame;
use std::path::Path;
use tracing::{debug, info};
use tract_onnx::prelude::*;

use crate::landmarks::{FaceLandmarks, Landmark};
use crate::{DmsConfig, DmsError};

/// Values in the face-mesh landmark output (468 points x xyz)
const MESH_OUTPUT_LEN: usize = 468 * 3;

/// Produces facial landmarks for a frame
pub trait LandmarkDetector: Send {
    /// `Ok(None)` when no face is visible
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DmsError>;
}

/// Face-mesh landmark model (NHWC RGB input, values in 0..1)
pub struct FaceMeshDetector {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    presence_threshold: f32,
}

impl FaceMeshDetector {
    /// Load the model named in the configuration
    pub fn new(config: &DmsConfig) -> Result<Self, DmsError> {
        let path = config
            .landmark_model_path
            .as_deref()
            .ok_or_else(|| DmsError::Config("landmark_model_path is not set".into()))?;
        Self::from_path(path, config)
    }

    pub fn from_path(path: &Path, config: &DmsConfig) -> Result<Self, DmsError> {
        info!("Loading face mesh model from {}", path.display());
        let size = config.model_input_size as usize;

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|m| m.with_input_fact(0, f32::fact([1, size, size, 3]).into()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| DmsError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            model,
            input_size: config.model_input_size,
            presence_threshold: config.face_presence_threshold,
        })
    }

    fn preprocess(&self, frame: &VideoFrame) -> Result<Tensor, DmsError> {
        let img = frame
            .to_rgb_image()
            .ok_or_else(|| DmsError::ImageProcessing("frame size does not match its data".into()))?;

        let resized = image::imageops::resize(
            &img,
            self.input_size,
            self.input_size,
            image::imageops::FilterType::Triangle,
        );

        let input: Vec<f32> = resized.into_raw().into_iter().map(|v| f32::from(v) / 255.0).collect();
        let size = self.input_size as usize;
        Tensor::from_shape(&[1, size, size, 3], &input)
            .map_err(|e| DmsError::ImageProcessing(e.to_string()))
    }
}

impl LandmarkDetector for FaceMeshDetector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DmsError> {
        let input = self.preprocess(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| DmsError::Inference(e.to_string()))?;

        let mut mesh = None;
        let mut face_logit = None;
        for output in outputs.iter() {
            let view = output
                .to_array_view::<f32>()
                .map_err(|e| DmsError::Inference(e.to_string()))?;
            match view.len() {
                MESH_OUTPUT_LEN => mesh = Some(view.iter().copied().collect::<Vec<f32>>()),
                1 => face_logit = view.iter().next().copied(),
                _ => {}
            }
        }

        let mesh = mesh.ok_or(DmsError::KeypointsMissing)?;
        let presence = face_logit.map(sigmoid).unwrap_or(1.0);
        if presence < self.presence_threshold {
            debug!("Face presence {:.2} below threshold", presence);
            return Ok(None);
        }

        decode_mesh(&mesh, self.input_size as f32, presence).map(Some)
    }
}

/// Convert xyz triples in model-input pixels to normalized landmarks
fn decode_mesh(mesh: &[f32], input_size: f32, presence: f32) -> Result<FaceLandmarks, DmsError> {
    if !mesh.iter().all(|v| v.is_finite()) {
        return Err(DmsError::Inference("non-finite landmark coordinates".into()));
    }
    let points = mesh
        .chunks_exact(3)
        .map(|xyz| Landmark::new(xyz[0] / input_size, xyz[1] / input_size))
        .collect();
    Ok(FaceLandmarks::new(points, presence))
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
