//! Page tree helpers shared by the per-page operations

use lopdf::{Dictionary, Document, Object, ObjectId};

/// Page tree depth guard against malformed (cyclic) Parent chains
const MAX_TREE_DEPTH: usize = 32;

/// Look up an inheritable page attribute (`Rotate`, `MediaBox`, `Resources`),
/// walking up the Parent chain when the page does not carry it directly.
/// References are resolved one level.
pub(crate) fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(resolve(doc, value).clone());
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Follow a single reference, returning the object itself otherwise
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

/// Page width and height in points, defaulting to US letter
pub(crate) fn page_size(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    let media_box = inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok().cloned())
        .and_then(|arr| {
            let nums: Vec<f32> = arr.iter().filter_map(number).collect();
            (nums.len() == 4).then(|| (nums[2] - nums[0], nums[3] - nums[1]))
        });
    media_box.unwrap_or((612.0, 792.0))
}

/// Effective page resources as an owned, direct dictionary
pub(crate) fn resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    inherited_attribute(doc, page_id, b"Resources")
        .and_then(|obj| obj.as_dict().ok().cloned())
        .unwrap_or_default()
}

pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}
