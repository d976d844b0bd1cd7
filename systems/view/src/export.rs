//! Raster export of a view (C9)
//!
//! Deterministic rendering: layer-coloured boxes for visuals, routed
//! polylines for connections. Two exports of the same unchanged view at
//! the same scale produce byte-identical output.

use archihub_core_model::{RouterPreset, Snapshot, VisualKind};
use archihub_core_types::{HubError, HubResult, Layer, ViewId, VisualId};
use image::{ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Cursor;

pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportParams {
    pub format: ExportFormat,
    /// 0.5 – 4.0
    pub scale: f32,
    /// Whitespace around the diagram, in view pixels
    pub margin: f64,
}

impl Default for ExportParams {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            scale: 1.0,
            margin: 20.0,
        }
    }
}

const BORDER: Rgba<u8> = Rgba([70, 70, 70, 255]);
const CONNECTION: Rgba<u8> = Rgba([40, 40, 40, 255]);
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn layer_fill(layer: Layer) -> Rgba<u8> {
    match layer {
        Layer::Strategy => Rgba([245, 222, 170, 255]),
        Layer::Business => Rgba([255, 255, 181, 255]),
        Layer::Application => Rgba([181, 255, 255, 255]),
        Layer::Technology => Rgba([201, 231, 183, 255]),
        Layer::Physical => Rgba([201, 231, 183, 255]),
        Layer::Motivation => Rgba([204, 204, 255, 255]),
        Layer::Implementation => Rgba([255, 224, 224, 255]),
        Layer::Other => Rgba([237, 237, 237, 255]),
    }
}

fn parse_hex(color: &str) -> Option<Rgba<u8>> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let value = u32::from_str_radix(hex, 16).ok()?;
    Some(Rgba([
        (value >> 16) as u8,
        (value >> 8) as u8,
        value as u8,
        255,
    ]))
}

/// Render one view to encoded image bytes
pub fn export_view(
    snapshot: &Snapshot,
    view_id: &ViewId,
    params: &ExportParams,
) -> HubResult<Vec<u8>> {
    if !(MIN_SCALE..=MAX_SCALE).contains(&params.scale) {
        return Err(HubError::Usage(format!(
            "scale must be between {MIN_SCALE} and {MAX_SCALE}"
        )));
    }
    let view = snapshot
        .views
        .get(view_id)
        .ok_or_else(|| HubError::NotFound(format!("view {view_id}")))?;

    // Absolute geometry of every visual
    let mut absolute: HashMap<VisualId, (f64, f64, f64, f64)> = HashMap::new();
    for object in view.objects.values() {
        if let Some(origin) = view.absolute_origin(&object.id) {
            absolute.insert(
                object.id.clone(),
                (origin.x, origin.y, object.bounds.width, object.bounds.height),
            );
        }
    }

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (0.0f64, 0.0f64, 1.0f64, 1.0f64);
    for &(x, y, w, h) in absolute.values() {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x + w);
        max_y = max_y.max(y + h);
    }

    let scale = params.scale as f64;
    let width = ((max_x - min_x + 2.0 * params.margin) * scale).ceil().max(1.0) as u32;
    let height = ((max_y - min_y + 2.0 * params.margin) * scale).ceil().max(1.0) as u32;
    let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);

    let project = |x: f64, y: f64| -> (i64, i64) {
        (
            ((x - min_x + params.margin) * scale).round() as i64,
            ((y - min_y + params.margin) * scale).round() as i64,
        )
    };

    // Parents before children so nested fills draw on top of containers
    let mut order: Vec<&VisualId> = absolute.keys().collect();
    order.sort_by_key(|id| (nesting_depth(view, id), id.as_str().to_string()));

    for visual_id in order {
        let object = &view.objects[visual_id];
        let (x, y, w, h) = absolute[visual_id];
        let fill = object
            .style
            .fill_color
            .as_deref()
            .and_then(parse_hex)
            .unwrap_or_else(|| match &object.kind {
                VisualKind::Element { element } => snapshot
                    .elements
                    .get(element)
                    .map(|e| layer_fill(e.element_type.layer()))
                    .unwrap_or(BACKGROUND),
                VisualKind::Note { .. } => Rgba([255, 255, 204, 255]),
                VisualKind::Group { .. } => Rgba([208, 208, 208, 255]),
            });
        let border = object
            .style
            .line_color
            .as_deref()
            .and_then(parse_hex)
            .unwrap_or(BORDER);

        let (px, py) = project(x, y);
        let (qx, qy) = project(x + w, y + h);
        fill_rect(&mut canvas, px, py, qx, qy, fill);
        stroke_rect(&mut canvas, px, py, qx, qy, border);
    }

    for connection in view.connections.values() {
        let (Some(&(sx, sy, sw, sh)), Some(&(tx, ty, tw, th))) = (
            absolute.get(&connection.source_visual),
            absolute.get(&connection.target_visual),
        ) else {
            continue;
        };
        let color = connection
            .style
            .line_color
            .as_deref()
            .and_then(parse_hex)
            .unwrap_or(CONNECTION);
        let start = project(sx + sw / 2.0, sy + sh / 2.0);
        let end = project(tx + tw / 2.0, ty + th / 2.0);

        let mut waypoints = vec![start];
        match view.router {
            RouterPreset::Straight => {
                for bend in &connection.bendpoints {
                    waypoints.push(project(bend.x, bend.y));
                }
            }
            RouterPreset::Manhattan => {
                // Right-angle elbow through the horizontal midpoint
                let mid_x = (start.0 + end.0) / 2;
                waypoints.push((mid_x, start.1));
                waypoints.push((mid_x, end.1));
            }
        }
        waypoints.push(end);
        for pair in waypoints.windows(2) {
            draw_line(&mut canvas, pair[0], pair[1], color);
        }
    }

    let mut bytes = Cursor::new(Vec::new());
    let format = match params.format {
        ExportFormat::Png => ImageFormat::Png,
        ExportFormat::Jpeg => ImageFormat::Jpeg,
    };
    canvas
        .write_to(&mut bytes, format)
        .map_err(|e| HubError::Fatal(format!("image encode: {e}")))?;
    Ok(bytes.into_inner())
}

fn nesting_depth(view: &archihub_core_model::View, id: &VisualId) -> usize {
    let mut depth = 0;
    let mut current = view.objects.get(id).and_then(|o| o.parent.as_ref());
    while let Some(parent) = current {
        depth += 1;
        if depth > view.objects.len() {
            break;
        }
        current = view.objects.get(parent).and_then(|o| o.parent.as_ref());
    }
    depth
}

fn put(canvas: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

fn fill_rect(canvas: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
    for y in y0..y1 {
        for x in x0..x1 {
            put(canvas, x, y, color);
        }
    }
}

fn stroke_rect(canvas: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
    for x in x0..x1 {
        put(canvas, x, y0, color);
        put(canvas, x, y1 - 1, color);
    }
    for y in y0..y1 {
        put(canvas, x0, y, color);
        put(canvas, x1 - 1, y, color);
    }
}

/// Integer line plot (DDA)
fn draw_line(canvas: &mut RgbaImage, from: (i64, i64), to: (i64, i64), color: Rgba<u8>) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let steps = dx.abs().max(dy.abs()).max(1);
    for step in 0..=steps {
        let x = from.0 + dx * step / steps;
        let y = from.1 + dy * step / steps;
        put(canvas, x, y, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archihub_core_model::{Model, NewElement};
    use archihub_core_types::{Bounds, ElementType};

    fn snapshot_with_view() -> (Snapshot, ViewId) {
        let mut model = Model::new("test");
        model.begin_compound("setup", None);
        let element = model
            .create_element(NewElement {
                element_type: Some(ElementType::BusinessActor),
                name: "A".into(),
                ..Default::default()
            })
            .unwrap();
        let view = model.create_view("main", None, None).unwrap();
        crate::composer::add_to_view(
            &mut model,
            crate::composer::AddToViewParams {
                view: view.clone(),
                element,
                bounds: Bounds::new(10.0, 10.0, 120.0, 55.0),
                parent: None,
                style: None,
            },
        )
        .unwrap();
        model.commit_compound();
        (model.snapshot(), view)
    }

    #[test]
    fn export_produces_nonempty_deterministic_png() {
        let (snapshot, view) = snapshot_with_view();
        let params = ExportParams::default();
        let first = export_view(&snapshot, &view, &params).unwrap();
        let second = export_view(&snapshot, &view, &params).unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
        // PNG signature
        assert_eq!(&first[..8], &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n']);
    }

    #[test]
    fn out_of_range_scale_is_rejected() {
        let (snapshot, view) = snapshot_with_view();
        let params = ExportParams {
            scale: 8.0,
            ..Default::default()
        };
        assert!(matches!(
            export_view(&snapshot, &view, &params),
            Err(HubError::Usage(_))
        ));
    }

    #[test]
    fn jpeg_has_jfif_magic() {
        let (snapshot, view) = snapshot_with_view();
        let params = ExportParams {
            format: ExportFormat::Jpeg,
            ..Default::default()
        };
        let bytes = export_view(&snapshot, &view, &params).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
