//! View Composer (C6): diagram-level change semantics
//!
//! Runs on the editor actor, on top of the adapter's visual primitives.
//! The composer owns the diagram rules: parent-relative geometry, nesting
//! acyclicity, connection direction consistency and per-view connection
//! uniqueness.

use archihub_core_model::{Model, VisualConnection, VisualKind, VisualObject};
use archihub_core_types::{
    Bounds, ElementId, HubError, HubResult, RelationshipId, ViewId, VisualId, VisualStyle,
};

/// Parameters of an addToView change
#[derive(Debug, Clone)]
pub struct AddToViewParams {
    pub view: ViewId,
    pub element: ElementId,
    /// Parent-relative when `parent` is set, view-root otherwise
    pub bounds: Bounds,
    pub parent: Option<VisualId>,
    pub style: Option<VisualStyle>,
}

/// Parameters shared by createNote and createGroup
#[derive(Debug, Clone)]
pub struct DecorationParams {
    pub view: ViewId,
    pub bounds: Bounds,
}

/// Place an element on a view. A view may show the same element more than
/// once; each placement gets its own visual id.
pub fn add_to_view(model: &mut Model, params: AddToViewParams) -> HubResult<VisualId> {
    if let Some(parent) = &params.parent {
        let view = model
            .get_view(&params.view)
            .ok_or_else(|| HubError::NotFound(format!("view {}", params.view)))?;
        if !view.objects.contains_key(parent) {
            return Err(HubError::Execution(format!(
                "parent visual {parent} is not on view {}",
                params.view
            )));
        }
    }
    let object = VisualObject {
        id: VisualId::generate(),
        kind: VisualKind::Element {
            element: params.element,
        },
        bounds: params.bounds,
        parent: params.parent,
        style: params.style.unwrap_or_default(),
    };
    model.add_visual_object(&params.view, object)
}

/// Reparent an existing visual under a new parent, rewriting its geometry
/// to be parent-relative. Without explicit coordinates the visual keeps its
/// absolute position on the canvas.
pub fn nest_in_view(
    model: &mut Model,
    view_id: &ViewId,
    visual_id: &VisualId,
    parent_id: &VisualId,
    x: Option<f64>,
    y: Option<f64>,
) -> HubResult<()> {
    let view = model
        .get_view(view_id)
        .ok_or_else(|| HubError::NotFound(format!("view {view_id}")))?;
    if visual_id == parent_id {
        return Err(HubError::Execution("cannot nest a visual into itself".into()));
    }
    // Nesting must stay acyclic: the new parent may not be a descendant
    if view.is_ancestor(visual_id, parent_id) {
        return Err(HubError::Execution(format!(
            "nesting {visual_id} under {parent_id} would create a cycle"
        )));
    }
    let object = view
        .objects
        .get(visual_id)
        .ok_or_else(|| HubError::NotFound(format!("visual {visual_id}")))?;
    let parent_origin = view
        .absolute_origin(parent_id)
        .ok_or_else(|| HubError::NotFound(format!("parent visual {parent_id}")))?;

    let relative = match (x, y) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            let absolute = view
                .absolute_origin(visual_id)
                .ok_or_else(|| HubError::NotFound(format!("visual {visual_id}")))?;
            (absolute.x - parent_origin.x, absolute.y - parent_origin.y)
        }
    };
    let bounds = Bounds::new(relative.0, relative.1, object.bounds.width, object.bounds.height);
    model.reparent_visual(view_id, visual_id, Some(parent_id.clone()), bounds)
}

/// Draw a relationship between two visuals on the same view.
///
/// The source visual must back the relationship's source element and the
/// target visual its target; the same (relationship, source, target)
/// triple may appear at most once per view.
pub fn add_connection_to_view(
    model: &mut Model,
    view_id: &ViewId,
    relationship_id: &RelationshipId,
    source_visual: &VisualId,
    target_visual: &VisualId,
) -> HubResult<VisualId> {
    let relationship = model
        .get_relationship(relationship_id)
        .ok_or_else(|| HubError::NotFound(format!("relationship {relationship_id}")))?
        .clone();
    let view = model
        .get_view(view_id)
        .ok_or_else(|| HubError::NotFound(format!("view {view_id}")))?;

    let source_element = view
        .objects
        .get(source_visual)
        .and_then(|v| v.element_id())
        .ok_or_else(|| HubError::NotFound(format!("visual {source_visual}")))?;
    let target_element = view
        .objects
        .get(target_visual)
        .and_then(|v| v.element_id())
        .ok_or_else(|| HubError::NotFound(format!("visual {target_visual}")))?;

    if *source_element != relationship.source {
        return Err(HubError::Execution(format!(
            "sourceVisualId {source_visual} does not back the source of {relationship_id}"
        )));
    }
    if *target_element != relationship.target {
        return Err(HubError::Execution(format!(
            "targetVisualId {target_visual} does not back the target of {relationship_id}"
        )));
    }
    let duplicate = view.connections.values().any(|c| {
        c.relationship == *relationship_id
            && c.source_visual == *source_visual
            && c.target_visual == *target_visual
    });
    if duplicate {
        return Err(HubError::Conflict(format!(
            "connection for {relationship_id} between {source_visual} and {target_visual} already exists"
        )));
    }

    let connection = VisualConnection {
        id: VisualId::generate(),
        relationship: relationship_id.clone(),
        source_visual: source_visual.clone(),
        target_visual: target_visual.clone(),
        bendpoints: Vec::new(),
        style: VisualStyle::default(),
    };
    model.add_visual_connection(view_id, connection)
}

/// Move (and optionally resize) a visual, keeping its coordinate space
pub fn move_view_object(
    model: &mut Model,
    view_id: &ViewId,
    visual_id: &VisualId,
    x: f64,
    y: f64,
    width: Option<f64>,
    height: Option<f64>,
) -> HubResult<()> {
    let current = model
        .get_view(view_id)
        .ok_or_else(|| HubError::NotFound(format!("view {view_id}")))?
        .objects
        .get(visual_id)
        .ok_or_else(|| HubError::NotFound(format!("visual {visual_id}")))?
        .bounds;
    let bounds = Bounds::new(
        x,
        y,
        width.unwrap_or(current.width),
        height.unwrap_or(current.height),
    );
    model.set_visual_bounds(view_id, visual_id, bounds)
}

/// Free-standing note on a view
pub fn create_note(
    model: &mut Model,
    params: DecorationParams,
    content: String,
) -> HubResult<VisualId> {
    let object = VisualObject {
        id: VisualId::generate(),
        kind: VisualKind::Note { content },
        bounds: params.bounds,
        parent: None,
        style: VisualStyle::default(),
    };
    model.add_visual_object(&params.view, object)
}

/// Named grouping box on a view
pub fn create_group(
    model: &mut Model,
    params: DecorationParams,
    name: String,
) -> HubResult<VisualId> {
    let object = VisualObject {
        id: VisualId::generate(),
        kind: VisualKind::Group { name },
        bounds: params.bounds,
        parent: None,
        style: VisualStyle::default(),
    };
    model.add_visual_object(&params.view, object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use archihub_core_model::{NewElement, NewRelationship};
    use archihub_core_types::{AccessVariant, ElementType, RelationshipType};
    use indexmap::IndexMap;

    struct Fixture {
        model: Model,
        view: ViewId,
        a: ElementId,
        b: ElementId,
        rel: RelationshipId,
    }

    fn fixture() -> Fixture {
        let mut model = Model::new("test");
        model.begin_compound("setup", None);
        let a = model
            .create_element(NewElement {
                element_type: Some(ElementType::BusinessActor),
                name: "A".into(),
                ..Default::default()
            })
            .unwrap();
        let b = model
            .create_element(NewElement {
                element_type: Some(ElementType::BusinessActor),
                name: "B".into(),
                ..Default::default()
            })
            .unwrap();
        let rel = model
            .create_relationship(NewRelationship {
                relationship_type: RelationshipType::Association,
                source: a.clone(),
                target: b.clone(),
                name: None,
                properties: IndexMap::new(),
                access_type: AccessVariant::Generic,
                strength: None,
                folder: None,
            })
            .unwrap();
        let view = model.create_view("main", None, None).unwrap();
        model.commit_compound();
        Fixture { model, view, a, b, rel }
    }

    fn place(f: &mut Fixture, element: &ElementId, bounds: Bounds, parent: Option<VisualId>) -> VisualId {
        add_to_view(
            &mut f.model,
            AddToViewParams {
                view: f.view.clone(),
                element: element.clone(),
                bounds,
                parent,
                style: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn nested_child_is_parent_relative() {
        let mut f = fixture();
        f.model.begin_compound("place", None);
        let a = f.a.clone();
        let b = f.b.clone();
        let parent = place(&mut f, &a, Bounds::new(50.0, 50.0, 300.0, 200.0), None);
        let child = place(&mut f, &b, Bounds::new(10.0, 30.0, 120.0, 55.0), Some(parent));
        f.model.commit_compound();

        let view = f.model.get_view(&f.view).unwrap();
        let origin = view.absolute_origin(&child).unwrap();
        assert_eq!((origin.x, origin.y), (60.0, 80.0));
    }

    #[test]
    fn reversed_connection_endpoints_are_rejected() {
        let mut f = fixture();
        f.model.begin_compound("place", None);
        let a = f.a.clone();
        let b = f.b.clone();
        let va = place(&mut f, &a, Bounds::default(), None);
        let vb = place(&mut f, &b, Bounds::default(), None);
        // Swapped: visual of B offered as the source of an A→B relationship
        let err =
            add_connection_to_view(&mut f.model, &f.view.clone(), &f.rel.clone(), &vb, &va)
                .unwrap_err();
        assert!(matches!(err, HubError::Execution(_)));
        f.model.rollback_compound();
    }

    #[test]
    fn duplicate_connection_triple_is_rejected() {
        let mut f = fixture();
        f.model.begin_compound("place", None);
        let a = f.a.clone();
        let b = f.b.clone();
        let va = place(&mut f, &a, Bounds::default(), None);
        let vb = place(&mut f, &b, Bounds::default(), None);
        add_connection_to_view(&mut f.model, &f.view.clone(), &f.rel.clone(), &va, &vb).unwrap();
        let err =
            add_connection_to_view(&mut f.model, &f.view.clone(), &f.rel.clone(), &va, &vb)
                .unwrap_err();
        assert!(matches!(err, HubError::Conflict(_)));
        f.model.commit_compound();
    }

    #[test]
    fn nest_without_coordinates_keeps_canvas_position() {
        let mut f = fixture();
        f.model.begin_compound("place", None);
        let a = f.a.clone();
        let b = f.b.clone();
        let parent = place(&mut f, &a, Bounds::new(100.0, 100.0, 300.0, 200.0), None);
        let child = place(&mut f, &b, Bounds::new(160.0, 140.0, 120.0, 55.0), None);
        nest_in_view(&mut f.model, &f.view.clone(), &child, &parent, None, None).unwrap();
        f.model.commit_compound();

        let view = f.model.get_view(&f.view).unwrap();
        let object = view.objects.get(&child).unwrap();
        assert_eq!(object.parent.as_ref(), Some(&parent));
        assert_eq!((object.bounds.x, object.bounds.y), (60.0, 40.0));
        let origin = view.absolute_origin(&child).unwrap();
        assert_eq!((origin.x, origin.y), (160.0, 140.0));
    }

    #[test]
    fn nesting_cycle_is_rejected() {
        let mut f = fixture();
        f.model.begin_compound("place", None);
        let a = f.a.clone();
        let b = f.b.clone();
        let outer = place(&mut f, &a, Bounds::new(0.0, 0.0, 400.0, 300.0), None);
        let inner = place(&mut f, &b, Bounds::new(10.0, 10.0, 120.0, 55.0), Some(outer.clone()));
        let err = nest_in_view(&mut f.model, &f.view.clone(), &outer, &inner, None, None)
            .unwrap_err();
        assert!(matches!(err, HubError::Execution(_)));
        f.model.commit_compound();
    }
}
