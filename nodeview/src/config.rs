//! Tunables shared by the model and the renderer.

use std::fs;
use std::path::Path;

use ecolor::Color32;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ViewError;
use crate::node::Padding;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Radius of newly created sockets.
    pub socket_radius: f32,
    /// Side of the square resize handle in a node's bottom-right corner.
    pub resize_handle_size: f32,
    /// Side of the square function icon in a node's top-right corner.
    pub icon_size: f32,
    /// Seconds a function-icon press may last and still count as a click.
    pub click_timeout: f64,
    /// Height of the label / expander row.
    pub label_height: f32,
    /// Padding applied to new nodes.
    pub padding: Padding,
    pub source_color: Color32,
    pub sink_color: Color32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            socket_radius: 8.0,
            resize_handle_size: 12.0,
            icon_size: 16.0,
            click_timeout: 0.2,
            label_height: 20.0,
            padding: Padding::uniform(6.0),
            source_color: Color32::from_rgb(238, 130, 109),
            sink_color: Color32::from_rgb(109, 200, 238),
        }
    }
}

impl ViewConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ViewError> {
        Ok(toml::from_str(text)?)
    }

    /// Read the config at `path`, falling back to defaults on any error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => match Self::from_toml_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Failed to parse {}, using defaults: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {}, using defaults: {}", path.display(), e);
                Self::default()
            }
        }
    }
}
