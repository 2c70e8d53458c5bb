use std::path::Path;

use image::{RgbImage, imageops::FilterType};
use tch::{self, Device, IValue, Kind, Tensor};
use tracing::{debug, info};

use crate::{
    config::DetectionConfig,
    detector::PoseDetector,
    error::{DetectionError, InitError},
    landmark::{LANDMARK_COUNT, LandmarkPoint},
    result::RawPose,
};

/// TorchScript-backed single-person landmark model.
///
/// The module takes a `[1, 3, E, E]` float tensor in `[0, 1]` and returns a
/// `[1, 33, 5]` landmark tensor (`x, y, z, visibility, presence`), optionally
/// paired with a `[1, 1]` pose score in a tuple. Thresholds and smoothing
/// are applied by wrapping it in a [`crate::TrackedDetector`].
pub struct TorchPoseDetector {
    module: tch::CModule,
    device: Device,
    input_edge: u32,
}

impl TorchPoseDetector {
    /// Load a TorchScript module and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        config: &DetectionConfig,
        device: Device,
    ) -> Result<Self, InitError> {
        let model_path = model_path.as_ref();
        let module =
            tch::CModule::load_on_device(model_path, device).map_err(|err| InitError::Model {
                path: model_path.to_path_buf(),
                message: err.to_string(),
            })?;
        if config.segmentation() {
            debug!("segmentation requested; masks produced by the model are ignored");
        }
        info!(
            model = %model_path.display(),
            ?device,
            complexity = ?config.model_complexity(),
            "pose model loaded"
        );
        Ok(Self {
            module,
            device,
            input_edge: config.model_complexity().input_edge(),
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Resize an RGB frame to the model edge and convert it into a normalized
    /// NCHW tensor.
    fn rgb_to_tensor(&self, image: &RgbImage) -> Result<Tensor, DetectionError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DetectionError::InvalidFrame("empty frame".into()));
        }
        let edge = self.input_edge;
        let resized = image::imageops::resize(image, edge, edge, FilterType::Triangle);
        let edge = i64::from(edge);

        let tensor = Tensor::from_slice(resized.as_raw())
            .to_device(self.device)
            .to_kind(Kind::Float)
            .view([1, edge, edge, 3])
            .permute([0, 3, 1, 2])
            / 255.0;

        Ok(tensor)
    }

    fn infer(&self, input: &Tensor) -> Result<RawPose, DetectionError> {
        let output = self
            .module
            .forward_is(&[IValue::Tensor(input.shallow_clone())])
            .map_err(|err| DetectionError::Inference(err.to_string()))?;

        let (landmarks, score) = match output {
            IValue::Tensor(landmarks) => (landmarks, None),
            IValue::Tuple(mut values) if !values.is_empty() => {
                let score = match values.get(1) {
                    Some(IValue::Tensor(score)) => Some(score.view([-1]).double_value(&[0]) as f32),
                    _ => None,
                };
                match values.swap_remove(0) {
                    IValue::Tensor(landmarks) => (landmarks, score),
                    other => {
                        return Err(DetectionError::Inference(format!(
                            "unexpected landmark output: {other:?}"
                        )));
                    }
                }
            }
            other => {
                return Err(DetectionError::Inference(format!(
                    "unexpected model output: {other:?}"
                )));
            }
        };

        let numel = landmarks.numel();
        if numel != LANDMARK_COUNT * 5 {
            return Err(DetectionError::Inference(format!(
                "landmark tensor has {numel} values, expected {}",
                LANDMARK_COUNT * 5
            )));
        }

        let rows = landmarks
            .to_device(Device::Cpu)
            .to_kind(Kind::Float)
            .view([LANDMARK_COUNT as i64, 5])
            .contiguous();
        let rows = Vec::<Vec<f32>>::try_from(&rows)
            .map_err(|err| DetectionError::Inference(err.to_string()))?;

        let landmarks = rows
            .iter()
            .map(|row| LandmarkPoint::new(row[0], row[1], row[2], row[3], row[4]))
            .collect();

        Ok(RawPose {
            landmarks,
            confidence: score,
        })
    }
}

impl PoseDetector for TorchPoseDetector {
    fn name(&self) -> &str {
        "torchscript"
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Option<RawPose>, DetectionError> {
        let input = self.rgb_to_tensor(image)?;
        let pose = tch::no_grad(|| self.infer(&input))?;
        Ok(Some(pose))
    }

    fn close(&mut self) {
        debug!(device = ?self.device, "releasing TorchScript module");
    }
}
