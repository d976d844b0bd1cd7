//! Visual style attributes for diagram objects and connections

use serde::{Deserialize, Serialize};

/// Style attributes of a visual object or connection.
///
/// Colors are `#rrggbb` strings as sent on the wire; `None` means the
/// renderer default for the element's layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_alignment: Option<TextAlignment>,
}

impl VisualStyle {
    /// Overlay `patch` on top of self; set fields win
    pub fn merge(&mut self, patch: &VisualStyle) {
        if patch.fill_color.is_some() {
            self.fill_color = patch.fill_color.clone();
        }
        if patch.line_color.is_some() {
            self.line_color = patch.line_color.clone();
        }
        if patch.font_color.is_some() {
            self.font_color = patch.font_color.clone();
        }
        if patch.line_width.is_some() {
            self.line_width = patch.line_width;
        }
        if patch.opacity.is_some() {
            self.opacity = patch.opacity;
        }
        if patch.text_alignment.is_some() {
            self.text_alignment = patch.text_alignment;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlignment {
    Left,
    Center,
    Right,
}
