use std::fmt;
use std::path::{Path, PathBuf};

/// The detection models offered in the model dropdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelChoice {
    #[default]
    Nano,
    Small,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 2] = [ModelChoice::Nano, ModelChoice::Small];

    /// Text shown in the dropdown.
    pub fn label(self) -> &'static str {
        match self {
            ModelChoice::Nano => "YOLOv8n (Nano)",
            ModelChoice::Small => "YOLOv8s (Small)",
        }
    }

    /// Identifier of the pretrained weights for this choice.
    pub fn weights_id(self) -> &'static str {
        match self {
            ModelChoice::Nano => "yolov8n",
            ModelChoice::Small => "yolov8s",
        }
    }

    /// Location of the ONNX export of the weights inside `model_dir`.
    pub fn weights_path(self, model_dir: &Path) -> PathBuf {
        model_dir.join(format!("{}.onnx", self.weights_id()))
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
