//! Questionnaire state machine.
//!
//! `reduce` is the pure transition function over `{ answers, step }`;
//! `Wizard` owns one state, applies actions through `reduce`, and performs
//! the persistence side effects after each transition.

pub mod conditions;
pub mod steps;
pub mod storage;

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{AnswerAggregate, AnswerValue, FabricPlacement, Field, FieldKind, NO, YES};
use steps::{StepView, TOTAL_STEPS};
use storage::{SnapshotStore, StorageError};

/// Largest accepted custom fabric photo, decoded.
pub const MAX_FABRIC_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("step {0} is outside the questionnaire")]
    StepOutOfRange(usize),
    #[error("field {field:?} does not accept {got}")]
    TypeMismatch { field: Field, got: &'static str },
    #[error("field {0:?} has no custom text")]
    NoCustomField(Field),
    #[error("step {step} requires an answer for {field:?}")]
    MissingAnswer { step: usize, field: Field },
    #[error("invalid fabric image: {0}")]
    InvalidFabricImage(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// When a saved answer snapshot is picked up on mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RestorePolicy {
    /// Resume from any saved snapshot.
    #[default]
    Always,
    /// Resume only when an auth redirect was flagged; otherwise discard the snapshot.
    OnlyAfterAuthRedirect,
}

/// Whether advancing requires the current step's required fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequiredFields {
    #[default]
    Lenient,
    Strict,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WizardOptions {
    pub restore: RestorePolicy,
    pub required: RequiredFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardState {
    pub answers: AnswerAggregate,
    pub step: usize,
}

impl Default for WizardState {
    fn default() -> Self { Self { answers: AnswerAggregate::default(), step: 1 } }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Answer { field: Field, value: AnswerValue, custom: Option<String> },
    /// Removes the custom fabric photo together with its placement.
    ClearFabricImage,
    Next,
    Previous,
    GoTo(usize),
    Submit,
}

/// What a transition changed, so the container knows which effect to run.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    AnswersChanged,
    StepChanged(usize),
    Unchanged,
    Submitted(AnswerAggregate),
}

fn blank_to_none(v: String) -> Option<String> {
    if v.trim().is_empty() { None } else { Some(v) }
}

/// Checks a `data:image/...;base64,` payload: decodable, a known image
/// format, and no larger than [`MAX_FABRIC_IMAGE_BYTES`].
pub fn validate_fabric_image(data_url: &str) -> Result<(), WizardError> {
    let invalid = |m: &str| WizardError::InvalidFabricImage(m.to_string());
    let rest = data_url.strip_prefix("data:image/").ok_or_else(|| invalid("not an image data URL"))?;
    let (_, payload) = rest.split_once(";base64,").ok_or_else(|| invalid("not base64 encoded"))?;
    if payload.len() / 4 * 3 > MAX_FABRIC_IMAGE_BYTES + 3 {
        return Err(invalid("image larger than 5MB"));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| invalid(&e.to_string()))?;
    if bytes.len() > MAX_FABRIC_IMAGE_BYTES {
        return Err(invalid("image larger than 5MB"));
    }
    image::guess_format(&bytes).map_err(|_| invalid("unrecognised image format"))?;
    Ok(())
}

fn set_custom(a: &mut AnswerAggregate, field: Field, custom: String) -> Result<(), WizardError> {
    let slot = match field {
        Field::DressType => &mut a.dress_type_custom,
        Field::DressLength => &mut a.dress_length_custom,
        Field::SkirtShape => &mut a.skirt_shape_custom,
        Field::NecklineType => &mut a.neckline_type_custom,
        Field::SleeveType => &mut a.sleeve_type_custom,
        Field::FabricType => &mut a.fabric_type_custom,
        Field::Embellishments => &mut a.embellishments_custom,
        Field::ShineLevel => &mut a.shine_level_custom,
        other => return Err(WizardError::NoCustomField(other)),
    };
    *slot = blank_to_none(custom);
    Ok(())
}

fn apply_answer(a: &mut AnswerAggregate, field: Field, value: AnswerValue) -> Result<(), WizardError> {
    let value = match (field.kind(), value) {
        (FieldKind::MultiChoice, AnswerValue::Many(values)) => {
            a.embellishments = values;
            return Ok(());
        }
        (FieldKind::MultiChoice, AnswerValue::One(_)) => return Err(WizardError::TypeMismatch { field, got: "a single value" }),
        (_, AnswerValue::Many(_)) => return Err(WizardError::TypeMismatch { field, got: "a list" }),
        (_, AnswerValue::One(v)) => v,
    };

    match field {
        Field::HasTransparentParts | Field::HasAdditionalColors => {
            if !(value.is_empty() || value == YES || value == NO) {
                return Err(WizardError::TypeMismatch { field, got: "a value other than yes/no" });
            }
            if field == Field::HasTransparentParts { a.has_transparent_parts = value } else { a.has_additional_colors = value }
        }
        Field::FabricPlacement => {
            a.fabric_placement = if value.is_empty() {
                None
            } else {
                Some(value.parse::<FabricPlacement>().map_err(|_| WizardError::TypeMismatch { field, got: "an unknown placement" })?)
            };
        }
        Field::CustomFabricImage => {
            if value.trim().is_empty() {
                a.custom_fabric_image = None;
                a.fabric_placement = None;
                a.fabric_placement_details = None;
            } else {
                validate_fabric_image(&value)?;
                a.custom_fabric_image = Some(value);
            }
        }
        Field::DressType => a.dress_type = value,
        Field::DressLength => a.dress_length = value,
        Field::SkirtShape => a.skirt_shape = value,
        Field::NecklineType => a.neckline_type = value,
        Field::SleeveType => a.sleeve_type = value,
        Field::FabricType => a.fabric_type = value,
        Field::ShineLevel => a.shine_level = value,
        Field::PrimaryColor => a.primary_color = value,
        Field::FabricPlacementDetails => a.fabric_placement_details = blank_to_none(value),
        Field::TransparentPartsLocation => a.transparent_parts_location = blank_to_none(value),
        Field::EmbellishmentPlacement => a.embellishment_placement = blank_to_none(value),
        Field::AdditionalColors => a.additional_colors = blank_to_none(value),
        Field::AdditionalNotes => a.additional_notes = blank_to_none(value),
        Field::Embellishments => unreachable!("multi-choice handled above"),
    }
    Ok(())
}

fn ensure_complete(state: &WizardState, required: RequiredFields) -> Result<(), WizardError> {
    if required == RequiredFields::Strict {
        if let Some(field) = steps::missing_required(state.step, &state.answers) {
            return Err(WizardError::MissingAnswer { step: state.step, field });
        }
    }
    Ok(())
}

/// Every step, in order; submission is gated on this in strict mode.
fn ensure_all_complete(answers: &AnswerAggregate, required: RequiredFields) -> Result<(), WizardError> {
    if required == RequiredFields::Strict {
        for n in 1..=TOTAL_STEPS {
            if let Some(field) = steps::missing_required(n, answers) {
                return Err(WizardError::MissingAnswer { step: n, field });
            }
        }
    }
    Ok(())
}

/// Pure transition function. The returned state always has its step in `1..=TOTAL_STEPS`.
pub fn reduce(state: &WizardState, action: Action, required: RequiredFields) -> Result<(WizardState, Transition), WizardError> {
    let mut next = state.clone();
    let transition = match action {
        Action::Answer { field, value, custom } => {
            if custom.is_some() && !field.has_custom_pair() {
                return Err(WizardError::NoCustomField(field));
            }
            apply_answer(&mut next.answers, field, value)?;
            if let Some(custom) = custom {
                set_custom(&mut next.answers, field, custom)?;
            }
            Transition::AnswersChanged
        }
        Action::ClearFabricImage => {
            apply_answer(&mut next.answers, Field::CustomFabricImage, AnswerValue::One(String::new()))?;
            Transition::AnswersChanged
        }
        Action::Next => {
            ensure_complete(state, required)?;
            if state.step >= TOTAL_STEPS {
                ensure_all_complete(&state.answers, required)?;
                Transition::Submitted(conditions::normalized(&state.answers))
            } else {
                next.step = state.step + 1;
                Transition::StepChanged(next.step)
            }
        }
        Action::Previous => {
            if state.step > 1 {
                next.step = state.step - 1;
                Transition::StepChanged(next.step)
            } else {
                Transition::Unchanged
            }
        }
        Action::GoTo(n) => {
            if !(1..=TOTAL_STEPS).contains(&n) {
                return Err(WizardError::StepOutOfRange(n));
            }
            next.step = n;
            if n == state.step { Transition::Unchanged } else { Transition::StepChanged(n) }
        }
        Action::Submit => {
            ensure_all_complete(&state.answers, required)?;
            Transition::Submitted(conditions::normalized(&state.answers))
        }
    };
    Ok((next, transition))
}

type CompletionCallback = Box<dyn FnMut(&AnswerAggregate) + Send>;

/// A mounted questionnaire bound to its durable snapshot store.
pub struct Wizard<S: SnapshotStore> {
    state: WizardState,
    durable: S,
    options: WizardOptions,
    on_complete: Option<CompletionCallback>,
    submitted: Option<AnswerAggregate>,
}

impl<S: SnapshotStore> Wizard<S> {
    /// Mounts a wizard, restoring from `durable` according to the restore policy.
    /// `session` is consulted only for the auth-redirect flag.
    pub fn mount(durable: S, session: &dyn SnapshotStore, options: WizardOptions) -> Result<Self, WizardError> {
        let restore = match options.restore {
            RestorePolicy::Always => true,
            RestorePolicy::OnlyAfterAuthRedirect => storage::auth_redirect_pending(session)?,
        };

        let mut state = WizardState::default();
        if restore {
            match storage::load_answers(&durable) {
                Ok(Some(answers)) => {
                    info!("✅ Restored saved questionnaire answers");
                    state.answers = answers;
                }
                Ok(None) => {}
                Err(e) => warn!("❌ Error loading saved answers, starting fresh: {}", e),
            }
            if let Some(step) = storage::load_step(&durable)? {
                state.step = step;
            }
        } else {
            storage::clear(&durable)?;
        }

        Ok(Self { state, durable, options, on_complete: None, submitted: None })
    }

    /// Registers the callback handed a copy of the answers on submission.
    pub fn on_complete(mut self, callback: impl FnMut(&AnswerAggregate) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn state(&self) -> &WizardState { &self.state }
    pub fn answers(&self) -> &AnswerAggregate { &self.state.answers }
    pub fn step(&self) -> usize { self.state.step }
    pub fn options(&self) -> WizardOptions { self.options }
    pub fn durable(&self) -> &S { &self.durable }

    /// The most recent submitted snapshot, if any.
    pub fn submitted(&self) -> Option<&AnswerAggregate> { self.submitted.as_ref() }

    /// Current step's question description.
    pub fn render(&self) -> Option<StepView> { steps::render(self.state.step, &self.state.answers) }

    pub fn dispatch(&mut self, action: Action) -> Result<Transition, WizardError> {
        let (next, transition) = reduce(&self.state, action, self.options.required)?;
        self.state = next;
        match &transition {
            Transition::AnswersChanged => storage::save_answers(&self.durable, &self.state.answers)?,
            Transition::StepChanged(step) => storage::save_step(&self.durable, *step)?,
            Transition::Unchanged => {}
            Transition::Submitted(answers) => {
                self.durable.remove(storage::STEP_KEY)?;
                info!("📨 Questionnaire submitted");
                if let Some(callback) = self.on_complete.as_mut() {
                    callback(answers);
                }
                self.submitted = Some(answers.clone());
            }
        }
        Ok(transition)
    }

    pub fn answer(&mut self, field: Field, value: impl Into<AnswerValue>, custom: Option<&str>) -> Result<(), WizardError> {
        self.dispatch(Action::Answer { field, value: value.into(), custom: custom.map(str::to_string) })?;
        Ok(())
    }

    pub fn clear_fabric_image(&mut self) -> Result<(), WizardError> {
        self.dispatch(Action::ClearFabricImage).map(|_| ())
    }

    pub fn go_next(&mut self) -> Result<Transition, WizardError> { self.dispatch(Action::Next) }

    pub fn go_previous(&mut self) -> Result<Transition, WizardError> { self.dispatch(Action::Previous) }

    pub fn go_to_step(&mut self, n: usize) -> Result<Transition, WizardError> { self.dispatch(Action::GoTo(n)) }

    pub fn submit(&mut self) -> Result<AnswerAggregate, WizardError> {
        match self.dispatch(Action::Submit)? {
            Transition::Submitted(answers) => Ok(answers),
            other => unreachable!("submit produced {other:?}"),
        }
    }

    /// Saves the answers and raises the auth-redirect flag before leaving for sign-in.
    pub fn begin_auth_redirect(&self, session: &dyn SnapshotStore) -> Result<(), WizardError> {
        let answers = self.submitted.as_ref().unwrap_or(&self.state.answers);
        storage::begin_auth_redirect(&self.durable, session, answers)?;
        Ok(())
    }

    /// Called once the submitted answers were used successfully downstream:
    /// clears both snapshots and starts over at step 1.
    pub fn discard(&mut self) -> Result<(), WizardError> {
        storage::clear(&self.durable)?;
        self.state = WizardState::default();
        self.submitted = None;
        Ok(())
    }
}
