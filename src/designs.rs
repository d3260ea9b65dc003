use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AnswerAggregate;

/// Gallery listings return at most this many designs.
pub const LIST_LIMIT: usize = 20;

/// A finished design kept in a user's gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Design {
    pub id: Uuid,
    pub user_id: String,
    pub original_description: String,
    pub enhanced_prompt: String,
    pub image_data: String,
    pub questionnaire_answers: Option<AnswerAggregate>,
    pub embellishment_placement: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Design {
    pub fn new(user_id: impl Into<String>, original_description: String, enhanced_prompt: String, image_data: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            original_description,
            enhanced_prompt,
            image_data,
            questionnaire_answers: None,
            embellishment_placement: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct DesignStore {
    designs: RwLock<HashMap<Uuid, Design>>,
}

impl DesignStore {
    pub fn new() -> Self { Self::default() }

    pub fn save(&self, design: Design) -> Design {
        tracing::info!("💾 Saving design {} for user {}", design.id, design.user_id);
        self.designs.write().insert(design.id, design.clone());
        design
    }

    /// The user's designs, newest first.
    pub fn list_for_user(&self, user_id: &str, limit: usize) -> Vec<Design> {
        let mut designs: Vec<Design> = self.designs.read().values().filter(|d| d.user_id == user_id).cloned().collect();
        designs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        designs.truncate(limit);
        designs
    }

    pub fn get(&self, user_id: &str, id: Uuid) -> Option<Design> {
        self.designs.read().get(&id).filter(|d| d.user_id == user_id).cloned()
    }

    /// Removes the design if it belongs to `user_id`.
    pub fn delete(&self, user_id: &str, id: Uuid) -> bool {
        let mut guard = self.designs.write();
        match guard.get(&id) {
            Some(d) if d.user_id == user_id => {
                guard.remove(&id);
                true
            }
            _ => false,
        }
    }
}
