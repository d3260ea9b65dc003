//! Submission pipeline: answers → enhanced prompt → image → saved design.

use std::{future::Future, sync::Arc};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    designs::{Design, DesignStore},
    messages::{Locale, Message},
    models::{AnswerAggregate, EditDesignRequest, EnhancePromptRequest, GenerateImageRequest},
    prompts,
    relay::{ApiError, RelayError, RelayService},
    wizard::{conditions, storage::SnapshotStore, Wizard, WizardError},
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error("request cancelled")]
    Cancelled,
    #[error("design not found")]
    NotFound,
    #[error("no submitted answers to process")]
    NothingSubmitted,
    #[error(transparent)]
    Wizard(#[from] WizardError),
}

impl PipelineError {
    pub fn to_api_error(&self, locale: Locale) -> ApiError {
        use axum::http::StatusCode;
        match self {
            PipelineError::Relay(e) => e.to_api_error(locale),
            PipelineError::NotFound => ApiError::new(StatusCode::NOT_FOUND, Message::DesignNotFound.text(locale)),
            // 499 is the conventional "client closed request" code.
            PipelineError::Cancelled => ApiError::new(StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST), self.to_string()),
            PipelineError::NothingSubmitted => ApiError::new(StatusCode::BAD_REQUEST, Message::MissingDescription.text(locale)),
            PipelineError::Wizard(e) => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

/// Runs `fut` unless `cancel` fires first.
async fn guarded<T>(cancel: &CancellationToken, fut: impl Future<Output = Result<T, RelayError>>) -> Result<T, PipelineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!("🛑 Pipeline step cancelled");
            Err(PipelineError::Cancelled)
        }
        result = fut => result.map_err(PipelineError::from),
    }
}

#[derive(Clone)]
pub struct DesignPipeline {
    relay: Arc<RelayService>,
    designs: Arc<DesignStore>,
}

impl DesignPipeline {
    pub fn new(relay: Arc<RelayService>, designs: Arc<DesignStore>) -> Self { Self { relay, designs } }

    /// Enhances the answers, renders the image, and saves the design.
    pub async fn create(&self, user_id: &str, answers: &AnswerAggregate, cancel: &CancellationToken) -> Result<Design, PipelineError> {
        let answers = conditions::normalized(answers);
        tracing::info!("🚀 Creating design for user {}", user_id);

        let enhance = EnhancePromptRequest { description: None, questionnaire_answers: Some(answers.clone()) };
        let enhanced_prompt = guarded(cancel, self.relay.enhance(&enhance)).await?;

        let generate = GenerateImageRequest {
            prompt: enhanced_prompt.clone(),
            fabric_image: conditions::active_fabric_image(&answers).map(str::to_string),
        };
        let image_data = guarded(cancel, self.relay.generate(&generate)).await?;

        let mut design = Design::new(user_id, prompts::format_answers(&answers), enhanced_prompt, image_data);
        design.embellishment_placement = answers.embellishment_placement.clone();
        design.questionnaire_answers = Some(answers);
        Ok(self.designs.save(design))
    }

    /// Applies an edit to a stored design and saves the result as a new design.
    pub async fn edit(&self, user_id: &str, design_id: Uuid, edit_request: &str, cancel: &CancellationToken) -> Result<Design, PipelineError> {
        let original = self.designs.get(user_id, design_id).ok_or(PipelineError::NotFound)?;
        let request = EditDesignRequest { original_image_url: original.image_data.clone(), edit_request: edit_request.to_string() };
        let image_data = guarded(cancel, self.relay.edit(&request)).await?;

        let mut design = Design::new(
            user_id,
            original.original_description.clone(),
            format!("{}\n\nEdit: {}", original.enhanced_prompt, edit_request),
            image_data,
        );
        design.questionnaire_answers = original.questionnaire_answers;
        design.embellishment_placement = original.embellishment_placement;
        Ok(self.designs.save(design))
    }

    /// Processes the wizard's submitted answers. Saved snapshots are cleared
    /// only when the design was created; on failure they stay for recovery.
    pub async fn create_from_wizard<S: SnapshotStore>(&self, wizard: &mut Wizard<S>, user_id: &str, cancel: &CancellationToken) -> Result<Design, PipelineError> {
        let answers = wizard.submitted().cloned().ok_or(PipelineError::NothingSubmitted)?;
        let design = self.create(user_id, &answers, cancel).await?;
        wizard.discard()?;
        Ok(design)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        models::Field,
        openrouter::{ChatResponse, ProviderError},
        relay::tests::ScriptedProvider,
        wizard::{storage::{self, MemoryStore}, WizardOptions},
    };
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode as UpstreamStatus;

    fn pipeline(script: Vec<Result<ChatResponse, ProviderError>>) -> (DesignPipeline, Arc<ScriptedProvider>, Arc<DesignStore>) {
        let provider = Arc::new(ScriptedProvider::new(script));
        let relay = Arc::new(RelayService::new(&Config::default(), provider.clone()));
        let designs = Arc::new(DesignStore::new());
        (DesignPipeline::new(relay, designs.clone()), provider, designs)
    }

    fn answers() -> AnswerAggregate {
        AnswerAggregate { dress_type: "evening".into(), primary_color: "emerald".into(), ..Default::default() }
    }

    #[tokio::test]
    async fn create_runs_enhance_then_generate_and_saves() {
        let (pipeline, provider, designs) = pipeline(vec![
            Ok(ChatResponse::with_text("An emerald evening gown")),
            Ok(ChatResponse::with_image("data:image/png;base64,QUJD")),
        ]);

        let design = pipeline.create("alice", &answers(), &CancellationToken::new()).await.unwrap();

        assert_eq!(design.enhanced_prompt, "An emerald evening gown");
        assert_eq!(design.image_data, "data:image/png;base64,QUJD");
        assert!(design.original_description.contains("emerald"));
        assert_eq!(provider.call_count(), 2);
        assert_eq!(designs.list_for_user("alice", 20), vec![design]);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_any_call() {
        let (pipeline, provider, designs) = pipeline(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(pipeline.create("alice", &answers(), &cancel).await, Err(PipelineError::Cancelled)));
        assert_eq!(provider.call_count(), 0);
        assert!(designs.list_for_user("alice", 20).is_empty());
    }

    #[tokio::test]
    async fn edit_saves_new_design_with_appended_prompt() {
        let (pipeline, _provider, designs) = pipeline(vec![Ok(ChatResponse::with_image("data:image/png;base64,TkVX"))]);
        let original = designs.save(Design::new("alice", "desc".into(), "A gown".into(), "data:image/png;base64,T0xE".into()));

        let edited = pipeline.edit("alice", original.id, "make it red", &CancellationToken::new()).await.unwrap();

        assert_ne!(edited.id, original.id);
        assert_eq!(edited.enhanced_prompt, "A gown\n\nEdit: make it red");
        assert_eq!(designs.list_for_user("alice", 20).len(), 2);
        assert!(matches!(
            pipeline.edit("bob", original.id, "x", &CancellationToken::new()).await,
            Err(PipelineError::NotFound)
        ));
    }

    #[tokio::test]
    async fn wizard_snapshot_is_cleared_only_after_success() {
        let durable = Arc::new(MemoryStore::new());
        let mut wizard = Wizard::mount(durable.clone(), &MemoryStore::new(), WizardOptions::default()).unwrap();
        wizard.answer(Field::DressType, "party", None).unwrap();

        let (idle, _, _) = pipeline(vec![]);
        assert!(matches!(idle.create_from_wizard(&mut wizard, "alice", &CancellationToken::new()).await, Err(PipelineError::NothingSubmitted)));

        wizard.submit().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(idle.create_from_wizard(&mut wizard, "alice", &cancel).await.is_err());
        assert!(durable.contains(storage::ANSWERS_KEY));

        let (pipeline, _, _) = pipeline(vec![
            Ok(ChatResponse::with_text("A party dress")),
            Ok(ChatResponse::with_image("data:image/png;base64,QUJD")),
        ]);
        pipeline.create_from_wizard(&mut wizard, "alice", &CancellationToken::new()).await.unwrap();
        assert!(!durable.contains(storage::ANSWERS_KEY));
        assert_eq!(wizard.submitted(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn relay_failure_surfaces_as_pipeline_error() {
        let busy = || Err(ProviderError::Status { status: UpstreamStatus::SERVICE_UNAVAILABLE, body: "overloaded".into() });
        let (pipeline, provider, _) = pipeline(vec![busy(), busy(), busy()]);

        let err = pipeline.create("alice", &answers(), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Relay(RelayError::Exhausted { attempts: 3, .. })));
        assert_eq!(err.to_api_error(Locale::En).status.as_u16(), 503);
        assert_eq!(provider.call_count(), 3);
    }
}
