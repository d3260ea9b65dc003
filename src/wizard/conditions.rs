//! Conditional sub-field rules. Every function here is a pure function of the
//! current answers and is re-evaluated on each call.

use crate::models::{AnswerAggregate, FabricPlacement, Field, CUSTOM_FABRIC, NONE, OTHER, YES};

fn filled(v: &Option<String>) -> bool {
    v.as_deref().is_some_and(|s| !s.trim().is_empty())
}

pub fn transparent_location_applies(a: &AnswerAggregate) -> bool {
    a.has_transparent_parts == YES
}

/// Placement is asked when something other than "none" was picked.
pub fn embellishment_placement_applies(a: &AnswerAggregate) -> bool {
    !a.embellishments.is_empty() && !a.embellishments.iter().all(|e| e == NONE)
}

pub fn custom_fabric_applies(a: &AnswerAggregate) -> bool {
    a.fabric_type == CUSTOM_FABRIC
}

pub fn fabric_placement_applies(a: &AnswerAggregate) -> bool {
    custom_fabric_applies(a) && filled(&a.custom_fabric_image)
}

pub fn placement_details_apply(a: &AnswerAggregate) -> bool {
    fabric_placement_applies(a) && a.fabric_placement == Some(FabricPlacement::Custom)
}

pub fn additional_colors_apply(a: &AnswerAggregate) -> bool {
    a.has_additional_colors == YES
}

/// Whether the `<field>Custom` text of a selector currently means anything.
pub fn custom_text_applies(a: &AnswerAggregate, field: Field) -> bool {
    match field {
        Field::DressType => a.dress_type == OTHER,
        Field::DressLength => a.dress_length == OTHER,
        Field::SkirtShape => a.skirt_shape == OTHER,
        Field::NecklineType => a.neckline_type == OTHER,
        Field::SleeveType => a.sleeve_type == OTHER,
        Field::FabricType => a.fabric_type == OTHER,
        Field::ShineLevel => a.shine_level == OTHER,
        Field::Embellishments => a.embellishments.iter().any(|e| e == OTHER),
        _ => false,
    }
}

/// The custom text of `field` when it is meaningful and non-blank.
pub fn custom_text(a: &AnswerAggregate, field: Field) -> Option<&str> {
    if !custom_text_applies(a, field) {
        return None;
    }
    let raw = match field {
        Field::DressType => &a.dress_type_custom,
        Field::DressLength => &a.dress_length_custom,
        Field::SkirtShape => &a.skirt_shape_custom,
        Field::NecklineType => &a.neckline_type_custom,
        Field::SleeveType => &a.sleeve_type_custom,
        Field::FabricType => &a.fabric_type_custom,
        Field::ShineLevel => &a.shine_level_custom,
        Field::Embellishments => &a.embellishments_custom,
        _ => return None,
    };
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// The custom fabric image when the custom fabric sub-flow is active.
pub fn active_fabric_image(a: &AnswerAggregate) -> Option<&str> {
    if fabric_placement_applies(a) { a.custom_fabric_image.as_deref() } else { None }
}

/// Copy of `a` with every field that is currently not meaningful cleared.
pub fn normalized(a: &AnswerAggregate) -> AnswerAggregate {
    let mut out = a.clone();
    let keep = |field| custom_text(a, field).map(str::to_string);
    out.dress_type_custom = keep(Field::DressType);
    out.dress_length_custom = keep(Field::DressLength);
    out.skirt_shape_custom = keep(Field::SkirtShape);
    out.neckline_type_custom = keep(Field::NecklineType);
    out.sleeve_type_custom = keep(Field::SleeveType);
    out.fabric_type_custom = keep(Field::FabricType);
    out.shine_level_custom = keep(Field::ShineLevel);
    out.embellishments_custom = keep(Field::Embellishments);

    if !custom_fabric_applies(a) {
        out.custom_fabric_image = None;
    }
    if !fabric_placement_applies(a) {
        out.fabric_placement = None;
    }
    if !placement_details_apply(a) || !filled(&a.fabric_placement_details) {
        out.fabric_placement_details = None;
    }
    if !transparent_location_applies(a) || !filled(&a.transparent_parts_location) {
        out.transparent_parts_location = None;
    }
    if !embellishment_placement_applies(a) || !filled(&a.embellishment_placement) {
        out.embellishment_placement = None;
    }
    if !additional_colors_apply(a) || !filled(&a.additional_colors) {
        out.additional_colors = None;
    }
    if !filled(&a.additional_notes) {
        out.additional_notes = None;
    }
    out
}
