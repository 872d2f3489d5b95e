//! Avatar Pipeline Coordinator — one end-to-end timeline update per check-in.
//!
//! Flow: log habit → recompute score → build prompt (text model) → image
//! model → public upload → persist avatar record + profile URL.
//!
//! The pipeline is linear with no compensating rollback: the first failure
//! aborts it, steps committed before it stay committed, and the error names
//! the failed step so the caller can render "habit logged, avatar stale".

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::avatar::prompts::{build_avatar_prompt, tier_for_score, DriftTier, AVATAR_PROMPT_SYSTEM};
use crate::errors::AppError;
use crate::gen_client::{ImageGenerator, TextGenerator};
use crate::habits::store::{recompute_drift_score, HabitStore};
use crate::profile::store::ProfileStore;
use crate::storage::{avatar_object_key, initial_avatar_object_key, AvatarStorage};

/// The suspension points of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    LogHabit,
    ComputeScore,
    BuildPrompt,
    GenerateImage,
    UploadAvatar,
    PersistAvatar,
}

impl PipelineStep {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStep::LogHabit => "log_habit",
            PipelineStep::ComputeScore => "compute_score",
            PipelineStep::BuildPrompt => "build_prompt",
            PipelineStep::GenerateImage => "generate_image",
            PipelineStep::UploadAvatar => "upload_avatar",
            PipelineStep::PersistAvatar => "persist_avatar",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First failure of a pipeline run, tagged with the step that failed.
/// Everything committed before `step` stays committed.
#[derive(Debug, Error)]
#[error("avatar pipeline failed at {step}: {source}")]
pub struct PipelineError {
    pub step: PipelineStep,
    #[source]
    pub source: AppError,
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        AppError::Pipeline {
            step: e.step,
            source: Box::new(e.source),
        }
    }
}

fn step_err(step: PipelineStep) -> impl FnOnce(AppError) -> PipelineError {
    move |source| PipelineError { step, source }
}

/// Parameters for one timeline update.
#[derive(Debug, Clone)]
pub struct TimelineUpdate {
    pub user_id: Uuid,
    pub completed: bool,
}

/// Successful pipeline outcome, returned to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineOutcome {
    pub drift_score: i32,
    pub tier: DriftTier,
    pub avatar_url: String,
}

/// Runs the full check-in pipeline.
///
/// Steps:
/// 1. Append today's habit entry (idempotent per day).
/// 2. Recompute and persist the drift score (atomic read-compute-write).
/// 3. Build the prompt instruction and run text generation.
/// 4. Generate exactly one image.
/// 5. Upload it publicly under a fresh key.
/// 6. Persist the avatar record and point the profile at it.
pub async fn run_timeline_update(
    habits: &dyn HabitStore,
    profiles: &dyn ProfileStore,
    text_gen: &dyn TextGenerator,
    image_gen: &dyn ImageGenerator,
    storage: &dyn AvatarStorage,
    update: TimelineUpdate,
) -> Result<TimelineOutcome, PipelineError> {
    let user_id = update.user_id;

    habits
        .log_habit(user_id, update.completed)
        .await
        .map_err(step_err(PipelineStep::LogHabit))?;

    let score = recompute_drift_score(habits, profiles, user_id)
        .await
        .map_err(step_err(PipelineStep::ComputeScore))?;

    generate_and_persist_avatar(
        profiles,
        text_gen,
        image_gen,
        storage,
        user_id,
        Some(score),
        false,
    )
    .await
}

/// Generates the baseline avatar from the profile's stored score without
/// touching the habit log. Repeating this refreshes the single initial
/// record and overwrites the fixed initial object in place.
pub async fn run_initial_avatar(
    profiles: &dyn ProfileStore,
    text_gen: &dyn TextGenerator,
    image_gen: &dyn ImageGenerator,
    storage: &dyn AvatarStorage,
    user_id: Uuid,
) -> Result<TimelineOutcome, PipelineError> {
    generate_and_persist_avatar(profiles, text_gen, image_gen, storage, user_id, None, true).await
}

async fn generate_and_persist_avatar(
    profiles: &dyn ProfileStore,
    text_gen: &dyn TextGenerator,
    image_gen: &dyn ImageGenerator,
    storage: &dyn AvatarStorage,
    user_id: Uuid,
    score: Option<i32>,
    is_initial: bool,
) -> Result<TimelineOutcome, PipelineError> {
    let profile = profiles
        .fetch(user_id)
        .await
        .map_err(step_err(PipelineStep::BuildPrompt))?;
    let score = score.unwrap_or(profile.latest_drift_score);

    let instruction = build_avatar_prompt(&profile.base_description, &profile.goal, score);
    let image_prompt = text_gen
        .generate_text(&instruction, AVATAR_PROMPT_SYSTEM)
        .await
        .map_err(step_err(PipelineStep::BuildPrompt))?;
    info!("Image prompt built for user {user_id} (score {score})");

    let image_bytes = image_gen
        .generate_image(&image_prompt)
        .await
        .map_err(step_err(PipelineStep::GenerateImage))?;

    let key = if is_initial {
        initial_avatar_object_key(user_id)
    } else {
        avatar_object_key(user_id, Uuid::new_v4())
    };
    let avatar_url = storage
        .upload_public(image_bytes, &key, "image/png")
        .await
        .map_err(step_err(PipelineStep::UploadAvatar))?;

    profiles
        .save_avatar_record(user_id, &avatar_url, is_initial)
        .await
        .map_err(step_err(PipelineStep::PersistAvatar))?;
    profiles
        .set_current_avatar_url(user_id, &avatar_url)
        .await
        .map_err(step_err(PipelineStep::PersistAvatar))?;

    info!("Timeline updated for user {user_id}: score={score}, avatar={avatar_url}");

    Ok(TimelineOutcome {
        drift_score: score,
        tier: tier_for_score(score),
        avatar_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::Utc;

    use crate::models::avatar::AvatarRecordRow;
    use crate::models::habit::HabitEntryRow;
    use crate::models::user::UserProfileRow;
    use crate::profile::store::ProfileDetails;

    fn store_unavailable() -> AppError {
        AppError::Store(sqlx::Error::PoolClosed)
    }

    #[derive(Default)]
    struct FakeHabitStore {
        // newest first, matching the trait contract
        entries: Mutex<Vec<HabitEntryRow>>,
        fail_read: AtomicBool,
    }

    #[async_trait]
    impl HabitStore for FakeHabitStore {
        async fn log_habit(
            &self,
            user_id: Uuid,
            completed: bool,
        ) -> Result<HabitEntryRow, AppError> {
            let entry = HabitEntryRow {
                user_id,
                date: Utc::now().date_naive(),
                completed,
                created_at: Utc::now(),
            };
            self.entries.lock().unwrap().insert(0, entry.clone());
            Ok(entry)
        }

        async fn recent_entries(
            &self,
            _user_id: Uuid,
            limit_days: u32,
        ) -> Result<Vec<HabitEntryRow>, AppError> {
            if self.fail_read.load(Ordering::SeqCst) {
                return Err(store_unavailable());
            }
            let entries = self.entries.lock().unwrap();
            Ok(entries.iter().take(limit_days as usize).cloned().collect())
        }
    }

    struct FakeProfileStore {
        profile: Mutex<UserProfileRow>,
        records: Mutex<Vec<AvatarRecordRow>>,
        score_writes: AtomicU32,
    }

    impl FakeProfileStore {
        fn new(user_id: Uuid) -> Self {
            Self {
                profile: Mutex::new(UserProfileRow {
                    id: user_id,
                    name: "New User".to_string(),
                    goal: "Achieve something great".to_string(),
                    base_description: "A person with average build".to_string(),
                    base_photo_url: None,
                    current_avatar_url: None,
                    latest_drift_score: 50,
                    created_at: Utc::now(),
                }),
                records: Mutex::new(Vec::new()),
                score_writes: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ProfileStore for FakeProfileStore {
        async fn create(
            &self,
            _user_id: Uuid,
            _name: &str,
            _goal: &str,
            _base_description: &str,
        ) -> Result<UserProfileRow, AppError> {
            Ok(self.profile.lock().unwrap().clone())
        }

        async fn fetch(&self, _user_id: Uuid) -> Result<UserProfileRow, AppError> {
            Ok(self.profile.lock().unwrap().clone())
        }

        async fn update_details(
            &self,
            _user_id: Uuid,
            _details: &ProfileDetails,
        ) -> Result<UserProfileRow, AppError> {
            Ok(self.profile.lock().unwrap().clone())
        }

        async fn set_latest_drift_score(&self, _user_id: Uuid, score: i32) -> Result<(), AppError> {
            self.score_writes.fetch_add(1, Ordering::SeqCst);
            self.profile.lock().unwrap().latest_drift_score = score;
            Ok(())
        }

        async fn set_base_photo_url(&self, _user_id: Uuid, url: &str) -> Result<(), AppError> {
            self.profile.lock().unwrap().base_photo_url = Some(url.to_string());
            Ok(())
        }

        async fn set_current_avatar_url(&self, _user_id: Uuid, url: &str) -> Result<(), AppError> {
            self.profile.lock().unwrap().current_avatar_url = Some(url.to_string());
            Ok(())
        }

        async fn save_avatar_record(
            &self,
            user_id: Uuid,
            url: &str,
            is_initial: bool,
        ) -> Result<AvatarRecordRow, AppError> {
            let record = AvatarRecordRow {
                id: Uuid::new_v4(),
                user_id,
                url: url.to_string(),
                is_initial,
                created_at: Utc::now(),
            };
            self.records.lock().unwrap().push(record.clone());
            Ok(record)
        }
    }

    struct FakeTextGen;

    #[async_trait]
    impl TextGenerator for FakeTextGen {
        async fn generate_text(&self, _prompt: &str, _system: &str) -> Result<String, AppError> {
            Ok("A photorealistic portrait of the user".to_string())
        }
    }

    #[derive(Default)]
    struct FakeImageGen {
        fail: AtomicBool,
    }

    #[async_trait]
    impl ImageGenerator for FakeImageGen {
        async fn generate_image(&self, _prompt: &str) -> Result<Bytes, AppError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::Generation("provider unavailable".to_string()));
            }
            Ok(Bytes::from_static(b"fake-png-bytes"))
        }
    }

    #[derive(Default)]
    struct FakeStorage {
        keys: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AvatarStorage for FakeStorage {
        async fn upload_public(
            &self,
            _bytes: Bytes,
            key: &str,
            _content_type: &str,
        ) -> Result<String, AppError> {
            self.keys.lock().unwrap().push(key.to_string());
            Ok(format!("https://cdn.example.com/{key}"))
        }
    }

    #[tokio::test]
    async fn test_check_in_pipeline_success() {
        let user_id = Uuid::new_v4();
        let habits = FakeHabitStore::default();
        let profiles = FakeProfileStore::new(user_id);
        let storage = FakeStorage::default();

        let outcome = run_timeline_update(
            &habits,
            &profiles,
            &FakeTextGen,
            &FakeImageGen::default(),
            &storage,
            TimelineUpdate {
                user_id,
                completed: true,
            },
        )
        .await
        .unwrap();

        // One completed day from an empty history.
        assert_eq!(outcome.drift_score, 52);
        assert_eq!(outcome.tier, DriftTier::Steady);

        let profile = profiles.profile.lock().unwrap().clone();
        assert_eq!(profile.latest_drift_score, 52);
        assert_eq!(profile.current_avatar_url.as_deref(), Some(outcome.avatar_url.as_str()));

        let records = profiles.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_initial);

        let keys = storage.keys.lock().unwrap();
        assert!(keys[0].starts_with(&format!("avatars/{user_id}/")));
        assert!(keys[0].ends_with(".png"));
    }

    #[tokio::test]
    async fn test_abort_after_score_leaves_avatar_unchanged() {
        let user_id = Uuid::new_v4();
        let habits = FakeHabitStore::default();
        let profiles = FakeProfileStore::new(user_id);
        let image_gen = FakeImageGen::default();
        image_gen.fail.store(true, Ordering::SeqCst);

        let err = run_timeline_update(
            &habits,
            &profiles,
            &FakeTextGen,
            &image_gen,
            &FakeStorage::default(),
            TimelineUpdate {
                user_id,
                completed: false,
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.step, PipelineStep::GenerateImage);

        // Habit log and score stay committed; the avatar does not move.
        let profile = profiles.profile.lock().unwrap().clone();
        assert_eq!(habits.entries.lock().unwrap().len(), 1);
        assert_eq!(profile.latest_drift_score, 46);
        assert!(profile.current_avatar_url.is_none());
        assert!(profiles.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_read_failure_persists_nothing() {
        let user_id = Uuid::new_v4();
        let habits = FakeHabitStore::default();
        habits.fail_read.store(true, Ordering::SeqCst);
        let profiles = FakeProfileStore::new(user_id);

        let err = run_timeline_update(
            &habits,
            &profiles,
            &FakeTextGen,
            &FakeImageGen::default(),
            &FakeStorage::default(),
            TimelineUpdate {
                user_id,
                completed: true,
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.step, PipelineStep::ComputeScore);
        assert!(matches!(err.source, AppError::Store(_)));
        assert_eq!(profiles.score_writes.load(Ordering::SeqCst), 0);
        assert_eq!(profiles.profile.lock().unwrap().latest_drift_score, 50);
    }

    #[tokio::test]
    async fn test_initial_avatar_uses_fixed_key_and_flag() {
        let user_id = Uuid::new_v4();
        let profiles = FakeProfileStore::new(user_id);
        let storage = FakeStorage::default();

        let outcome = run_initial_avatar(
            &profiles,
            &FakeTextGen,
            &FakeImageGen::default(),
            &storage,
            user_id,
        )
        .await
        .unwrap();

        // Baseline profile score, untouched by any habit log.
        assert_eq!(outcome.drift_score, 50);
        assert_eq!(
            storage.keys.lock().unwrap()[0],
            format!("avatars/{user_id}/initial.png")
        );

        let records = profiles.records.lock().unwrap();
        assert!(records[0].is_initial);
        let profile = profiles.profile.lock().unwrap();
        assert!(profile.current_avatar_url.is_some());
        assert_eq!(profiles.score_writes.load(Ordering::SeqCst), 0);
    }
}
