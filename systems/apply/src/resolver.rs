//! Reference resolution (C3)
//!
//! Substitutes symbolic references in a BOM so that, downstream, every id
//! field is either a real ID or a tempId created earlier in execution
//! order. Sources in priority order: intra-batch tempIds, preloaded idFile
//! maps, optional exact-name fallback.

use std::collections::{HashMap, HashSet};

use archihub_core_model::Snapshot;
use archihub_core_types::{HubError, HubResult, Ref};

use crate::bom::{Change, RefKind};

/// Resolve every reference field in `changes` in place.
///
/// `id_map` holds preloaded tempId→realId pairs from idFiles. With
/// `resolve_names`, a reference that matches neither a tempId nor a real ID
/// may fall back to an exact element name, as long as it is unambiguous.
pub fn resolve(
    changes: &mut [Change],
    snapshot: &Snapshot,
    id_map: &HashMap<String, String>,
    resolve_names: bool,
) -> HubResult<()> {
    // tempIds declared anywhere in the batch, with their declaration index
    let declared: HashMap<String, usize> = changes
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.declared_temp_id().map(|t| (t.to_string(), i)))
        .collect();

    let mut seen_so_far: HashSet<String> = HashSet::new();

    for (index, change) in changes.iter_mut().enumerate() {
        for (kind, field) in change.reference_fields() {
            match Ref::parse(field) {
                Ref::Real(_) => {}
                Ref::Temp(symbol) | Ref::Name(symbol) => {
                    // 1. intra-batch tempId defined by an earlier change
                    if seen_so_far.contains(&symbol) {
                        continue;
                    }
                    if let Some(&declared_at) = declared.get(&symbol) {
                        if declared_at >= index {
                            return Err(HubError::Resolution(format!(
                                "change {index} references tempId '{symbol}' which is only created at change {declared_at}"
                            )));
                        }
                        continue;
                    }
                    // 2. preloaded idFile mapping
                    if let Some(real) = id_map.get(&symbol) {
                        *field = real.clone();
                        continue;
                    }
                    // 3. exact-name fallback, elements only
                    if resolve_names && kind == RefKind::Element {
                        let matches = snapshot.elements_named(&symbol, None);
                        match matches.len() {
                            0 => {}
                            1 => {
                                *field = matches[0].id.0.clone();
                                continue;
                            }
                            n => {
                                return Err(HubError::Resolution(format!(
                                    "change {index}: name '{symbol}' is ambiguous ({n} elements match)"
                                )));
                            }
                        }
                    }
                    return Err(HubError::Resolution(format!(
                        "change {index}: unresolved {} reference '{symbol}'",
                        kind_name(kind)
                    )));
                }
            }
        }
        if let Some(temp_id) = change.declared_temp_id() {
            seen_so_far.insert(temp_id.to_string());
        }
    }
    Ok(())
}

fn kind_name(kind: RefKind) -> &'static str {
    match kind {
        RefKind::Element => "element",
        RefKind::Relationship => "relationship",
        RefKind::View => "view",
        RefKind::Visual => "visual",
        RefKind::Folder => "folder",
    }
}
