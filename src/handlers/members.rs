use super::{discard_replaced_image, validation_context};
use crate::db::member::MemberRepository;
use crate::directory::FormOptions;
use crate::error::{AppError, AppResult};
use crate::extract::{Json, Path};
use crate::models::{MemberView, Permissions};
use crate::session::CurrentMember;
use crate::storage::{delete_images_settled, DeletionReport, ImageStore};
use crate::validation::MemberInput;
use crate::AppState;
use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

const DUPLICATE_MEMBER: &str = "A member with this email or roll number already exists";

pub async fn list_members(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
) -> AppResult<Json<Value>> {
    current.require(Permissions::MANAGE_MEMBERS)?;

    let members = match state.directory.members().await {
        Some(cached) => cached,
        None => {
            // Taken before the read so a write landing mid-query wins
            let generation = state.directory.generation();
            let members = MemberRepository::new(state.db_pool.clone()).list_all().await?;
            let views = members.iter().map(MemberView::from).collect();
            state.directory.store_members(views, generation).await
        }
    };

    Ok(Json(json!({ "success": true, "members": *members })))
}

pub async fn create_member(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
    Json(input): Json<MemberInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    current.require(Permissions::MANAGE_MEMBERS)?;

    let draft = input.validate(&validation_context(&state.config))?;
    let member = draft.into_member(Utc::now());

    // Unique email and roll number are enforced by the table
    MemberRepository::new(state.db_pool.clone())
        .create(&member)
        .await
        .map_err(|e| AppError::from_write(e, DUPLICATE_MEMBER))?;
    state.directory.invalidate().await;

    tracing::info!("{} added member {}", current.0.email, member);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "member": MemberView::from(&member) })),
    ))
}

pub async fn update_member(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
    Path(id): Path<Uuid>,
    Json(input): Json<MemberInput>,
) -> AppResult<Json<Value>> {
    current.require(Permissions::MANAGE_MEMBERS)?;

    let draft = input.validate(&validation_context(&state.config))?;
    let repo = MemberRepository::new(state.db_pool.clone());

    // Keep the old record around to find a replaced profile image
    let previous = repo.get_by_id(id).await?.ok_or(AppError::NotFound("Member not found"))?;

    let member = repo
        .update(id, &draft)
        .await
        .map_err(|e| AppError::from_write(e, DUPLICATE_MEMBER))?
        .ok_or(AppError::NotFound("Member not found"))?;
    state.directory.invalidate().await;

    discard_replaced_image(
        &state,
        previous.profile_image.as_deref(),
        member.profile_image.as_deref(),
    )
    .await;

    tracing::info!("{} updated member {}", current.0.email, member);
    Ok(Json(json!({ "success": true, "member": MemberView::from(&member) })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteMembers {
    pub ids: Vec<Uuid>,
}

/// Delete the members' images, then the members. Image failures never block the delete.
pub(crate) async fn remove_members<S: ImageStore>(
    repo: &MemberRepository,
    store: &Arc<S>,
    ids: &[Uuid],
) -> Result<(u64, DeletionReport), sqlx::Error> {
    let images = repo.profile_images(ids).await?;
    let report = delete_images_settled(store, images).await;
    if report.failed > 0 {
        tracing::warn!("{} of {} profile images could not be deleted", report.failed, report.attempted);
    }

    let deleted = repo.delete_many(ids).await?;
    Ok((deleted, report))
}

pub async fn delete_members(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
    Json(request): Json<DeleteMembers>,
) -> AppResult<Json<Value>> {
    current.require(Permissions::MANAGE_MEMBERS)?;

    if request.ids.is_empty() {
        return Err(AppError::BadRequest("No members selected".to_string()));
    }

    let repo = MemberRepository::new(state.db_pool.clone());
    let (deleted, report) = remove_members(&repo, &state.images, &request.ids).await?;
    state.directory.invalidate().await;

    tracing::info!("{} deleted {} member(s)", current.0.email, deleted);
    Ok(Json(json!({
        "success": true,
        "deleted": deleted,
        "images": report,
    })))
}

/// Form choices; falls back to the fixed lists when the database is unavailable.
pub async fn member_options(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
) -> AppResult<Json<Value>> {
    current.require(Permissions::MANAGE_MEMBERS)?;

    if let Some(cached) = state.directory.options().await {
        return Ok(Json(json!({ "success": true, "options": *cached })));
    }

    let generation = state.directory.generation();
    let repo = MemberRepository::new(state.db_pool.clone());
    let loaded = async {
        let branches = repo.distinct_branches().await?;
        let subdomains = repo.distinct_subdomains().await?;
        Ok::<_, sqlx::Error>(FormOptions::new(branches, subdomains))
    }
    .await;

    // Fallback lists are served but never cached
    let options = match loaded {
        Ok(options) => state.directory.store_options(options, generation).await,
        Err(e) => {
            tracing::error!("Failed to load member options, using defaults: {}", e);
            Arc::new(FormOptions::fallback())
        }
    };

    Ok(Json(json!({ "success": true, "options": *options })))
}

pub async fn list_branches(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
) -> AppResult<Json<Value>> {
    current.require(Permissions::MANAGE_MEMBERS)?;
    let branches = MemberRepository::new(state.db_pool.clone()).distinct_branches().await?;
    Ok(Json(json!({ "success": true, "branches": branches })))
}

pub async fn list_subdomains(
    State(state): State<Arc<AppState>>,
    current: CurrentMember,
) -> AppResult<Json<Value>> {
    current.require(Permissions::MANAGE_MEMBERS)?;
    let subdomains = MemberRepository::new(state.db_pool.clone()).distinct_subdomains().await?;
    Ok(Json(json!({ "success": true, "subdomains": subdomains })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Member;
    use sqlx::PgPool;
    use std::sync::Mutex;

    /// Storage that is down for every request.
    struct UnavailableStore {
        attempts: Mutex<Vec<String>>,
    }

    impl ImageStore for UnavailableStore {
        async fn delete_by_url(&self, image_url: &str) -> anyhow::Result<()> {
            self.attempts.lock().unwrap().push(image_url.to_string());
            anyhow::bail!("storage unavailable")
        }
    }

    async fn with_image(repo: &MemberRepository, email: &str, image: Option<&str>) -> Member {
        let member = Member::from_sign_in("Test Member".into(), email.into(), image.map(String::from));
        repo.create(&member).await.unwrap();
        member
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_remove_members_survives_image_failures(pool: PgPool) {
        let repo = MemberRepository::new(pool);
        let a = with_image(&repo, "a@kiit.ac.in", Some("https://img/upload/v1/K-1000/a.jpg")).await;
        let b = with_image(&repo, "b@kiit.ac.in", None).await;
        let c = with_image(&repo, "c@kiit.ac.in", Some("https://img/upload/v1/K-1000/c.jpg")).await;

        let store = Arc::new(UnavailableStore {
            attempts: Mutex::new(Vec::new()),
        });
        let (deleted, report) = remove_members(&repo, &store, &[a.id, b.id]).await.unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(report, DeletionReport { attempted: 1, failed: 1 });
        assert_eq!(store.attempts.lock().unwrap().len(), 1);

        let left: Vec<Uuid> = repo.list_all().await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(left, vec![c.id]);
    }
}
