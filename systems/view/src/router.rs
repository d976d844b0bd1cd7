//! Per-view connection routing presets (C9)

use archihub_core_model::{Model, RouterPreset};
use archihub_core_types::{AbsolutePoint, HubError, HubResult, ViewId};
use tracing::debug;

/// Switch a view's routing preset and recompute connection bendpoints.
///
/// Manhattan routing materializes the right-angle elbow as bendpoints so
/// later exports and clients see the actual waypoints; straight routing
/// clears them.
pub fn apply_router(model: &mut Model, view_id: &ViewId, preset: RouterPreset) -> HubResult<()> {
    model.set_router(view_id, preset)?;

    let view = model
        .get_view(view_id)
        .ok_or_else(|| HubError::NotFound(format!("view {view_id}")))?;

    let mut routed: Vec<(archihub_core_types::VisualId, Vec<AbsolutePoint>)> = Vec::new();
    for connection in view.connections.values() {
        let bendpoints = match preset {
            RouterPreset::Straight => Vec::new(),
            RouterPreset::Manhattan => {
                let (Some(source), Some(target)) = (
                    view.absolute_origin(&connection.source_visual),
                    view.absolute_origin(&connection.target_visual),
                ) else {
                    continue;
                };
                let source_box = &view.objects[&connection.source_visual].bounds;
                let target_box = &view.objects[&connection.target_visual].bounds;
                let start = AbsolutePoint::new(
                    source.x + source_box.width / 2.0,
                    source.y + source_box.height / 2.0,
                );
                let end = AbsolutePoint::new(
                    target.x + target_box.width / 2.0,
                    target.y + target_box.height / 2.0,
                );
                let mid_x = (start.x + end.x) / 2.0;
                vec![
                    AbsolutePoint::new(mid_x, start.y),
                    AbsolutePoint::new(mid_x, end.y),
                ]
            }
        };
        routed.push((connection.id.clone(), bendpoints));
    }

    for (connection_id, bendpoints) in routed {
        model.set_connection_bendpoints(view_id, &connection_id, bendpoints)?;
    }
    debug!(view = %view_id, ?preset, "router applied");
    Ok(())
}
