use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TransferError;
use crate::widget::widget_model::Widget;

/// Supplies the initial candidate set extracted from the packaged app.
pub trait StaticExtractor {
    fn extract(&self) -> Result<Vec<Widget>, TransferError>;
}

/// Static widgets previously extracted to a JSON array of widget records.
pub struct JsonWidgetFile {
    path: PathBuf,
}

impl JsonWidgetFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl StaticExtractor for JsonWidgetFile {
    fn extract(&self) -> Result<Vec<Widget>, TransferError> {
        let display = self.path.display().to_string();
        let raw = fs::read_to_string(&self.path).map_err(|e| TransferError::io(&display, e))?;
        serde_json::from_str(&raw).map_err(|e| TransferError::json(&display, e))
    }
}

/// No static knowledge; the database grows from live observation only.
pub struct NoStaticWidgets;

impl StaticExtractor for NoStaticWidgets {
    fn extract(&self) -> Result<Vec<Widget>, TransferError> {
        Ok(Vec::new())
    }
}
