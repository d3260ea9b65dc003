//! The fixed, ordered questionnaire and its rendering.

use serde::Serialize;

use super::conditions;
use crate::models::{AnswerAggregate, FabricPlacement, Field, NO, YES};

pub const TOTAL_STEPS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InputKind {
    Radio,
    Checkbox,
    YesNo,
    Text,
    Textarea,
    ImageUpload,
}

/// When a question is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Reveal {
    Always,
    CustomFabricSelected,
    FabricImageSupplied,
    CustomPlacementChosen,
    AdditionalColorsWanted,
    HasTransparentParts,
    EmbellishmentsChosen,
}

impl Reveal {
    pub fn is_open(&self, a: &AnswerAggregate) -> bool {
        match self {
            Reveal::Always => true,
            Reveal::CustomFabricSelected => conditions::custom_fabric_applies(a),
            Reveal::FabricImageSupplied => conditions::fabric_placement_applies(a),
            Reveal::CustomPlacementChosen => conditions::placement_details_apply(a),
            Reveal::AdditionalColorsWanted => conditions::additional_colors_apply(a),
            Reveal::HasTransparentParts => conditions::transparent_location_applies(a),
            Reveal::EmbellishmentsChosen => conditions::embellishment_placement_applies(a),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDef {
    pub value: &'static str,
    pub label: &'static str,
    /// Selecting this option reveals the paired custom text input.
    pub custom_input: bool,
}

const fn opt(value: &'static str, label: &'static str) -> OptionDef {
    OptionDef { value, label, custom_input: false }
}

const OTHER_OPTION: OptionDef = OptionDef { value: "other", label: "Other", custom_input: true };

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDef {
    pub field: Field,
    pub prompt: &'static str,
    pub input: InputKind,
    pub options: &'static [OptionDef],
    pub required: bool,
    pub reveal: Reveal,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDef {
    pub number: usize,
    pub section: &'static str,
    pub questions: &'static [QuestionDef],
}

const fn ask(field: Field, prompt: &'static str, input: InputKind, options: &'static [OptionDef], required: bool) -> QuestionDef {
    QuestionDef { field, prompt, input, options, required, reveal: Reveal::Always }
}

const fn follow_up(field: Field, prompt: &'static str, input: InputKind, options: &'static [OptionDef], reveal: Reveal) -> QuestionDef {
    QuestionDef { field, prompt, input, options, required: false, reveal }
}

const YES_NO: &[OptionDef] = &[opt(YES, "Yes"), opt(NO, "No")];

const DRESS_TYPES: &[OptionDef] = &[
    opt("evening", "Evening dress"),
    opt("wedding", "Wedding dress"),
    opt("engagement", "Engagement dress"),
    opt("party", "Party dress"),
    OTHER_OPTION,
];

const FABRICS: &[OptionDef] = &[
    opt("satin", "Satin"),
    opt("silk", "Silk"),
    opt("chiffon", "Chiffon"),
    opt("tulle", "Tulle"),
    opt("lace", "Lace"),
    opt("velvet", "Velvet"),
    opt("organza", "Organza"),
    opt("crepe", "Crepe"),
    opt("customFabric", "My own fabric (upload a photo)"),
    OTHER_OPTION,
];

const PLACEMENTS: &[OptionDef] = &[
    opt("full", "The whole dress"),
    opt("bodice", "Bodice only"),
    opt("skirt", "Skirt only"),
    opt("sleeves", "Sleeves only"),
    opt("custom", "Somewhere else (describe)"),
];

const LENGTHS: &[OptionDef] = &[
    opt("knee", "Knee length"),
    opt("long", "Long"),
    opt("floor", "Floor length"),
    opt("train", "With a train"),
    OTHER_OPTION,
];

const SKIRTS: &[OptionDef] = &[
    opt("wide", "Wide"),
    opt("tight", "Fitted"),
    opt("layered", "Layered"),
    opt("pleated", "Pleated"),
    opt("puffy", "Puffy"),
    opt("straight", "Straight"),
    opt("mermaidTail", "Mermaid tail"),
    OTHER_OPTION,
];

const NECKLINES: &[OptionDef] = &[
    opt("vNeck", "V-neck"),
    opt("round", "Round"),
    opt("sweetheart", "Sweetheart"),
    opt("offShoulder", "Off the shoulder"),
    opt("high", "High neck"),
    opt("oneShoulder", "One shoulder"),
    opt("strapless", "Strapless"),
    opt("square", "Square"),
    OTHER_OPTION,
];

const SLEEVES: &[OptionDef] = &[
    opt("sleeveless", "Sleeveless"),
    opt("short", "Short"),
    opt("long", "Long"),
    opt("sheer", "Sheer"),
    opt("puff", "Puff"),
    opt("offShoulder", "Off the shoulder"),
    opt("lace", "Lace"),
    OTHER_OPTION,
];

const EMBELLISHMENTS: &[OptionDef] = &[
    opt("handEmbroidery", "Hand embroidery"),
    opt("beads", "Beads"),
    opt("sequins", "Sequins"),
    opt("decorativeLace", "Decorative lace"),
    opt("3dFlowers", "3D flowers"),
    opt("stones", "Stones"),
    opt("belt", "Belt"),
    opt("embroideredFabric", "Embroidered fabric"),
    opt("none", "None"),
    OTHER_OPTION,
];

const SHINE: &[OptionDef] = &[
    opt("none", "No shine"),
    opt("light", "Light shine"),
    opt("strong", "Strong shine"),
    OTHER_OPTION,
];

pub static STEPS: [StepDef; TOTAL_STEPS] = [
    StepDef { number: 1, section: "Basics", questions: &[
        ask(Field::DressType, "What type of dress are you looking for?", InputKind::Radio, DRESS_TYPES, true),
    ]},
    StepDef { number: 2, section: "Fabric & Materials", questions: &[
        ask(Field::FabricType, "Which fabric would you like?", InputKind::Radio, FABRICS, true),
        follow_up(Field::CustomFabricImage, "Upload a photo of your fabric", InputKind::ImageUpload, &[], Reveal::CustomFabricSelected),
        follow_up(Field::FabricPlacement, "Where should this fabric be used?", InputKind::Radio, PLACEMENTS, Reveal::FabricImageSupplied),
        follow_up(Field::FabricPlacementDetails, "Describe where the fabric goes", InputKind::Text, &[], Reveal::CustomPlacementChosen),
    ]},
    StepDef { number: 3, section: "Colors", questions: &[
        ask(Field::PrimaryColor, "What is the main color of the dress?", InputKind::Text, &[], true),
        ask(Field::HasAdditionalColors, "Would you like additional colors?", InputKind::YesNo, YES_NO, true),
        follow_up(Field::AdditionalColors, "Which additional colors?", InputKind::Text, &[], Reveal::AdditionalColorsWanted),
    ]},
    StepDef { number: 4, section: "Basics", questions: &[
        ask(Field::DressLength, "How long should the dress be?", InputKind::Radio, LENGTHS, true),
    ]},
    StepDef { number: 5, section: "Silhouette", questions: &[
        ask(Field::SkirtShape, "What skirt shape do you prefer?", InputKind::Radio, SKIRTS, true),
    ]},
    StepDef { number: 6, section: "Upper Body", questions: &[
        ask(Field::NecklineType, "Which neckline do you prefer?", InputKind::Radio, NECKLINES, true),
    ]},
    StepDef { number: 7, section: "Upper Body", questions: &[
        ask(Field::SleeveType, "Which sleeves do you prefer?", InputKind::Radio, SLEEVES, true),
    ]},
    StepDef { number: 8, section: "Fabric & Materials", questions: &[
        ask(Field::HasTransparentParts, "Should the dress have transparent parts?", InputKind::YesNo, YES_NO, true),
        follow_up(Field::TransparentPartsLocation, "Where are the transparent parts?", InputKind::Text, &[], Reveal::HasTransparentParts),
    ]},
    StepDef { number: 9, section: "Embellishments", questions: &[
        ask(Field::Embellishments, "Which embellishments would you like?", InputKind::Checkbox, EMBELLISHMENTS, true),
        follow_up(Field::EmbellishmentPlacement, "Where should the embellishments be placed?", InputKind::Text, &[], Reveal::EmbellishmentsChosen),
    ]},
    StepDef { number: 10, section: "Embellishments", questions: &[
        ask(Field::ShineLevel, "How much shine should the dress have?", InputKind::Radio, SHINE, true),
    ]},
    StepDef { number: 11, section: "Additional Notes", questions: &[
        ask(Field::AdditionalNotes, "Anything else we should know?", InputKind::Textarea, &[], false),
    ]},
];

/// Definition of step `n` (1-based), if it exists.
pub fn step_def(n: usize) -> Option<&'static StepDef> {
    n.checked_sub(1).and_then(|i| STEPS.get(i))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub field: Field,
    pub prompt: &'static str,
    pub input: InputKind,
    pub options: &'static [OptionDef],
    pub required: bool,
    /// True when the paired custom text input should be shown.
    pub show_custom_input: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub step: usize,
    pub total_steps: usize,
    pub section: &'static str,
    pub questions: Vec<QuestionView>,
    pub is_first: bool,
    pub is_last: bool,
}

/// What step `n` shows for the given answers; conditional questions are
/// included only while their trigger holds. Out-of-range steps render nothing.
pub fn render(n: usize, answers: &AnswerAggregate) -> Option<StepView> {
    let def = step_def(n)?;
    let questions = def
        .questions
        .iter()
        .filter(|q| q.reveal.is_open(answers))
        .map(|q| QuestionView {
            field: q.field,
            prompt: q.prompt,
            input: q.input,
            options: q.options,
            required: q.required,
            show_custom_input: conditions::custom_text_applies(answers, q.field),
        })
        .collect();
    Some(StepView { step: n, total_steps: TOTAL_STEPS, section: def.section, questions, is_first: n == 1, is_last: n == TOTAL_STEPS })
}

fn is_answered(a: &AnswerAggregate, field: Field) -> bool {
    let text = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    match field {
        Field::DressType => !a.dress_type.is_empty(),
        Field::DressLength => !a.dress_length.is_empty(),
        Field::SkirtShape => !a.skirt_shape.is_empty(),
        Field::NecklineType => !a.neckline_type.is_empty(),
        Field::SleeveType => !a.sleeve_type.is_empty(),
        Field::FabricType => !a.fabric_type.is_empty(),
        Field::CustomFabricImage => text(&a.custom_fabric_image),
        Field::FabricPlacement => a.fabric_placement.is_some(),
        Field::FabricPlacementDetails => text(&a.fabric_placement_details),
        Field::HasTransparentParts => !a.has_transparent_parts.is_empty(),
        Field::TransparentPartsLocation => text(&a.transparent_parts_location),
        Field::Embellishments => !a.embellishments.is_empty(),
        Field::EmbellishmentPlacement => text(&a.embellishment_placement),
        Field::ShineLevel => !a.shine_level.is_empty(),
        Field::PrimaryColor => !a.primary_color.trim().is_empty(),
        Field::HasAdditionalColors => !a.has_additional_colors.is_empty(),
        Field::AdditionalColors => text(&a.additional_colors),
        Field::AdditionalNotes => text(&a.additional_notes),
    }
}

/// First required, visible, unanswered field of step `n`.
pub fn missing_required(n: usize, answers: &AnswerAggregate) -> Option<Field> {
    step_def(n)?
        .questions
        .iter()
        .filter(|q| q.required && q.reveal.is_open(answers))
        .map(|q| q.field)
        .find(|f| !is_answered(answers, *f))
}

/// Which step asks for `field`.
pub fn step_of(field: Field) -> Option<usize> {
    STEPS.iter().find(|s| s.questions.iter().any(|q| q.field == field)).map(|s| s.number)
}

pub fn option_label(field: Field, value: &str) -> Option<&'static str> {
    STEPS
        .iter()
        .flat_map(|s| s.questions.iter())
        .filter(|q| q.field == field)
        .flat_map(|q| q.options.iter())
        .find(|o| o.value == value)
        .map(|o| o.label)
}

/// One line of the pre-submission review.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub step: usize,
    pub question: &'static str,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Summary of every primary question with its (labelled) answer, so the user
/// can confirm or jump back to a step before submitting.
pub fn review_items(answers: &AnswerAggregate) -> Vec<ReviewItem> {
    let a = conditions::normalized(answers);
    let label = |field: Field, value: &str| -> String {
        if value.is_empty() {
            "-".to_string()
        } else {
            option_label(field, value).map(str::to_string).unwrap_or_else(|| value.to_string())
        }
    };
    let custom = |field: Field| conditions::custom_text(&a, field).map(str::to_string);

    STEPS
        .iter()
        .flat_map(|s| s.questions.iter().filter(|q| q.reveal == Reveal::Always).map(move |q| (s.number, q)))
        .map(|(step, q)| {
            let (answer, detail) = match q.field {
                Field::Embellishments => {
                    let answer = if a.embellishments.is_empty() {
                        "-".to_string()
                    } else {
                        a.embellishments.iter().map(|e| label(q.field, e)).collect::<Vec<_>>().join(", ")
                    };
                    let detail = match (custom(q.field), a.embellishment_placement.clone()) {
                        (Some(c), Some(p)) => Some(format!("{c}; placement: {p}")),
                        (Some(c), None) => Some(c),
                        (None, Some(p)) => Some(format!("placement: {p}")),
                        (None, None) => None,
                    };
                    (answer, detail)
                }
                Field::FabricType => {
                    let placement = a.fabric_placement.map(|p| match p {
                        FabricPlacement::Custom => a.fabric_placement_details.clone().unwrap_or_else(|| p.to_string()),
                        other => other.to_string(),
                    });
                    (label(q.field, &a.fabric_type), custom(q.field).or(placement))
                }
                Field::HasTransparentParts => (label(q.field, &a.has_transparent_parts), a.transparent_parts_location.clone()),
                Field::HasAdditionalColors => (label(q.field, &a.has_additional_colors), a.additional_colors.clone()),
                Field::PrimaryColor => (label(q.field, a.primary_color.trim()), None),
                Field::AdditionalNotes => (a.additional_notes.clone().unwrap_or_else(|| "-".to_string()), None),
                field => {
                    let value = match field {
                        Field::DressType => &a.dress_type,
                        Field::DressLength => &a.dress_length,
                        Field::SkirtShape => &a.skirt_shape,
                        Field::NecklineType => &a.neckline_type,
                        Field::SleeveType => &a.sleeve_type,
                        _ => &a.shine_level,
                    };
                    (label(field, value), custom(field))
                }
            };
            ReviewItem { step, question: q.prompt, answer, detail }
        })
        .collect()
}
