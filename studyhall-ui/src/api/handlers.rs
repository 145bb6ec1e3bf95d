//! HTTP request handlers
//!
//! Admin writes all follow the same shape: check the gate, validate the
//! payload before touching the store, perform the write, then re-fetch the
//! curriculum snapshot. The tree is never mutated optimistically.

use crate::api::server::AppContext;
use crate::auth::{AuthPhase, GateDecision};
use crate::state::{AppEvent, SnapshotSource};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    Json,
};
use serde::{Deserialize, Serialize};
use studyhall_common::curriculum::{FoundChapter, FoundSubtopic, FoundTopic, SubjectNode};
use studyhall_common::models::{
    self, Chapter, Flashcard, FlashcardPatch, Identity, NewChapter, NewFlashcard, NewSubject,
    NewSubtopic, NewTopic, Subject, Subtopic, SubtopicPatch, TitlePatch, Topic,
};
use studyhall_common::profile::{ChapterProgress, Theme};
use studyhall_common::seed::{self, SeedReport};
use studyhall_common::Error;
use tracing::{info, warn};

// ============================================================================
// Response types and error mapping
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    /// Originally requested location, echoed back on auth redirects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

type HandlerError = (StatusCode, HeaderMap, Json<ErrorBody>);

fn fail(e: Error) -> HandlerError {
    let status = match &e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::Auth(_) => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        warn!("Request failed: {}", e);
    }
    (
        status,
        HeaderMap::new(),
        Json(ErrorBody { error: e.to_string(), from: None }),
    )
}

fn not_found(what: &str, id: &str) -> HandlerError {
    fail(Error::NotFound(format!("{} {} not found", what, id)))
}

/// Gate check for admin writes. Defer maps to 503 with Retry-After so a
/// client can retry once the session lookup settles; the 401 echoes the
/// requested path for the login redirect.
async fn require_admin(ctx: &AppContext, uri: &Uri) -> Result<(), HandlerError> {
    match ctx.gate.decision(Some(uri.path())).await {
        GateDecision::Allow => Ok(()),
        GateDecision::Defer => {
            let mut headers = HeaderMap::new();
            headers.insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                headers,
                Json(ErrorBody { error: "session check in progress".into(), from: None }),
            ))
        }
        GateDecision::RedirectToLogin { from } => Err((
            StatusCode::UNAUTHORIZED,
            HeaderMap::new(),
            Json(ErrorBody { error: "authentication required".into(), from }),
        )),
    }
}

/// Replace the snapshot after a successful write
async fn refetch(ctx: &AppContext) -> Result<SnapshotSource, HandlerError> {
    ctx.state
        .reload(ctx.store.as_ref(), ctx.fallback_to_bundled)
        .await
        .map_err(fail)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct CurriculumResponse {
    source: SnapshotSource,
    tree: studyhall_common::curriculum::CurriculumTree,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    source: SnapshotSource,
    subject_count: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    phase: AuthPhase,
    identity: Option<Identity>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    provider: String,
}

#[derive(Debug, Serialize)]
pub struct ThemeResponse {
    theme: Theme,
}

#[derive(Debug, Deserialize)]
pub struct SetThemeRequest {
    theme: Theme,
}

// ============================================================================
// Health and curriculum
// ============================================================================

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "studyhall-ui".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn get_curriculum(State(ctx): State<AppContext>) -> Json<CurriculumResponse> {
    Json(CurriculumResponse {
        source: ctx.state.source().await,
        tree: ctx.state.tree().await,
    })
}

pub async fn reload_curriculum(
    State(ctx): State<AppContext>,
) -> Result<Json<ReloadResponse>, HandlerError> {
    let source = refetch(&ctx).await?;
    let subject_count = ctx.state.tree().await.subjects.len();
    Ok(Json(ReloadResponse { source, subject_count }))
}

/// Seed the bundled dataset into the store, parent levels first
pub async fn seed_bundled(
    State(ctx): State<AppContext>,
    uri: Uri,
) -> Result<Json<SeedReport>, HandlerError> {
    require_admin(&ctx, &uri).await?;

    let dataset = seed::bundled_dataset().map_err(fail)?;
    let report = seed::seed_curriculum(ctx.store.as_ref(), &dataset)
        .await
        .map_err(fail)?;
    info!(
        "Seeded bundled dataset: {} subjects, {} chapters, {} topics, {} subtopics",
        report.subjects, report.chapters, report.topics, report.subtopics
    );

    refetch(&ctx).await?;
    ctx.state.broadcast_event(AppEvent::CurriculumSeeded {
        report,
        timestamp: chrono::Utc::now(),
    });
    Ok(Json(report))
}

// ============================================================================
// Lookups
// ============================================================================

pub async fn lookup_subject(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<SubjectNode>, HandlerError> {
    let tree = ctx.state.tree().await;
    tree.get_subject(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found("subject", &id))
}

pub async fn lookup_chapter(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<FoundChapter>, HandlerError> {
    let tree = ctx.state.tree().await;
    tree.find_chapter(&id)
        .map(Json)
        .ok_or_else(|| not_found("chapter", &id))
}

pub async fn lookup_topic(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<FoundTopic>, HandlerError> {
    let tree = ctx.state.tree().await;
    tree.find_topic(&id)
        .map(Json)
        .ok_or_else(|| not_found("topic", &id))
}

pub async fn lookup_subtopic(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<FoundSubtopic>, HandlerError> {
    let tree = ctx.state.tree().await;
    tree.find_subtopic(&id)
        .map(Json)
        .ok_or_else(|| not_found("subtopic", &id))
}

// ============================================================================
// Admin CRUD
// ============================================================================

pub async fn create_subject(
    State(ctx): State<AppContext>,
    uri: Uri,
    Json(new): Json<NewSubject>,
) -> Result<(StatusCode, Json<Subject>), HandlerError> {
    require_admin(&ctx, &uri).await?;
    models::validate_title(&new.title).map_err(fail)?;

    let created = ctx.store.insert_subject(new).await.map_err(fail)?;
    refetch(&ctx).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_subject(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    uri: Uri,
    Json(patch): Json<TitlePatch>,
) -> Result<StatusCode, HandlerError> {
    require_admin(&ctx, &uri).await?;
    models::validate_title(&patch.title).map_err(fail)?;

    ctx.store.update_subject(&id, patch).await.map_err(fail)?;
    refetch(&ctx).await?;
    Ok(StatusCode::OK)
}

pub async fn delete_subject(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    uri: Uri,
) -> Result<StatusCode, HandlerError> {
    require_admin(&ctx, &uri).await?;
    ctx.store.delete_subject(&id).await.map_err(fail)?;
    refetch(&ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_chapter(
    State(ctx): State<AppContext>,
    uri: Uri,
    Json(new): Json<NewChapter>,
) -> Result<(StatusCode, Json<Chapter>), HandlerError> {
    require_admin(&ctx, &uri).await?;
    models::validate_title(&new.title).map_err(fail)?;

    let created = ctx.store.insert_chapter(new).await.map_err(fail)?;
    refetch(&ctx).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_chapter(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    uri: Uri,
    Json(patch): Json<TitlePatch>,
) -> Result<StatusCode, HandlerError> {
    require_admin(&ctx, &uri).await?;
    models::validate_title(&patch.title).map_err(fail)?;

    ctx.store.update_chapter(&id, patch).await.map_err(fail)?;
    refetch(&ctx).await?;
    Ok(StatusCode::OK)
}

pub async fn delete_chapter(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    uri: Uri,
) -> Result<StatusCode, HandlerError> {
    require_admin(&ctx, &uri).await?;
    ctx.store.delete_chapter(&id).await.map_err(fail)?;
    refetch(&ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_topic(
    State(ctx): State<AppContext>,
    uri: Uri,
    Json(new): Json<NewTopic>,
) -> Result<(StatusCode, Json<Topic>), HandlerError> {
    require_admin(&ctx, &uri).await?;
    models::validate_title(&new.title).map_err(fail)?;

    let created = ctx.store.insert_topic(new).await.map_err(fail)?;
    refetch(&ctx).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_topic(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    uri: Uri,
    Json(patch): Json<TitlePatch>,
) -> Result<StatusCode, HandlerError> {
    require_admin(&ctx, &uri).await?;
    models::validate_title(&patch.title).map_err(fail)?;

    ctx.store.update_topic(&id, patch).await.map_err(fail)?;
    refetch(&ctx).await?;
    Ok(StatusCode::OK)
}

pub async fn delete_topic(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    uri: Uri,
) -> Result<StatusCode, HandlerError> {
    require_admin(&ctx, &uri).await?;
    ctx.store.delete_topic(&id).await.map_err(fail)?;
    refetch(&ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_subtopic(
    State(ctx): State<AppContext>,
    uri: Uri,
    Json(new): Json<NewSubtopic>,
) -> Result<(StatusCode, Json<Subtopic>), HandlerError> {
    require_admin(&ctx, &uri).await?;
    models::validate_title(&new.title).map_err(fail)?;

    let created = ctx.store.insert_subtopic(new).await.map_err(fail)?;
    refetch(&ctx).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_subtopic(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    uri: Uri,
    Json(patch): Json<SubtopicPatch>,
) -> Result<StatusCode, HandlerError> {
    require_admin(&ctx, &uri).await?;
    models::validate_title(&patch.title).map_err(fail)?;

    ctx.store.update_subtopic(&id, patch).await.map_err(fail)?;
    refetch(&ctx).await?;
    Ok(StatusCode::OK)
}

pub async fn delete_subtopic(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    uri: Uri,
) -> Result<StatusCode, HandlerError> {
    require_admin(&ctx, &uri).await?;
    ctx.store.delete_subtopic(&id).await.map_err(fail)?;
    refetch(&ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Flashcards
// ============================================================================

pub async fn list_flashcards(
    State(ctx): State<AppContext>,
    Path(chapter_id): Path<String>,
) -> Result<Json<Vec<Flashcard>>, HandlerError> {
    let cards = ctx.store.list_flashcards(&chapter_id).await.map_err(fail)?;
    Ok(Json(cards))
}

pub async fn create_flashcard(
    State(ctx): State<AppContext>,
    Path(chapter_id): Path<String>,
    uri: Uri,
    Json(new): Json<NewFlashcard>,
) -> Result<(StatusCode, Json<Flashcard>), HandlerError> {
    require_admin(&ctx, &uri).await?;
    models::validate_flashcard(&new.question, &new.answer).map_err(fail)?;

    let created = ctx
        .store
        .insert_flashcard(&chapter_id, new)
        .await
        .map_err(fail)?;
    ctx.state.broadcast_event(AppEvent::FlashcardsChanged {
        chapter_id,
        timestamp: chrono::Utc::now(),
    });
    Ok((StatusCode::CREATED, Json(created)))
}

/// Resolve a flashcard's owning chapter, needed for the change event
async fn flashcard_chapter(ctx: &AppContext, id: &str) -> Result<String, HandlerError> {
    let cards = ctx.store.list_all_flashcards().await.map_err(fail)?;
    cards
        .into_iter()
        .find(|c| c.id == id)
        .map(|c| c.chapter_id)
        .ok_or_else(|| not_found("flashcard", id))
}

pub async fn update_flashcard(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    uri: Uri,
    Json(patch): Json<FlashcardPatch>,
) -> Result<StatusCode, HandlerError> {
    require_admin(&ctx, &uri).await?;
    models::validate_flashcard(&patch.question, &patch.answer).map_err(fail)?;

    let chapter_id = flashcard_chapter(&ctx, &id).await?;
    ctx.store.update_flashcard(&id, patch).await.map_err(fail)?;
    ctx.state.broadcast_event(AppEvent::FlashcardsChanged {
        chapter_id,
        timestamp: chrono::Utc::now(),
    });
    Ok(StatusCode::OK)
}

pub async fn delete_flashcard(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    uri: Uri,
) -> Result<StatusCode, HandlerError> {
    require_admin(&ctx, &uri).await?;

    let chapter_id = flashcard_chapter(&ctx, &id).await?;
    ctx.store.delete_flashcard(&id).await.map_err(fail)?;
    ctx.state.broadcast_event(AppEvent::FlashcardsChanged {
        chapter_id,
        timestamp: chrono::Utc::now(),
    });
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Auth
// ============================================================================

pub async fn get_session(State(ctx): State<AppContext>) -> Json<SessionResponse> {
    Json(SessionResponse {
        phase: ctx.gate.phase().await,
        identity: ctx.gate.identity().await,
    })
}

pub async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, HandlerError> {
    ctx.gate
        .sign_in_with_provider(&req.provider)
        .await
        .map_err(fail)?;
    Ok(Json(SessionResponse {
        phase: ctx.gate.phase().await,
        identity: ctx.gate.identity().await,
    }))
}

/// Developer shortcut: installs the local sentinel identity without any
/// store round-trip
pub async fn login_bypass(State(ctx): State<AppContext>) -> Json<SessionResponse> {
    ctx.gate.login_as_developer().await;
    Json(SessionResponse {
        phase: ctx.gate.phase().await,
        identity: ctx.gate.identity().await,
    })
}

pub async fn logout(State(ctx): State<AppContext>) -> Result<StatusCode, HandlerError> {
    ctx.gate.logout().await.map_err(fail)?;
    Ok(StatusCode::OK)
}

// ============================================================================
// Local profile
// ============================================================================

pub async fn get_theme(State(ctx): State<AppContext>) -> Json<ThemeResponse> {
    Json(ThemeResponse { theme: ctx.profile.theme() })
}

pub async fn set_theme(
    State(ctx): State<AppContext>,
    Json(req): Json<SetThemeRequest>,
) -> Result<Json<ThemeResponse>, HandlerError> {
    let theme = ctx.profile.set_theme(req.theme).map_err(fail)?;
    ctx.state.broadcast_event(AppEvent::ThemeChanged {
        theme,
        timestamp: chrono::Utc::now(),
    });
    Ok(Json(ThemeResponse { theme }))
}

pub async fn get_progress(
    State(ctx): State<AppContext>,
) -> Json<std::collections::HashMap<String, ChapterProgress>> {
    Json(ctx.profile.progress())
}

/// Merge-updates a chapter's progress; completed subtopic lists are
/// unioned, scores replace only when present in the update
pub async fn update_progress(
    State(ctx): State<AppContext>,
    Path(chapter_id): Path<String>,
    Json(update): Json<ChapterProgress>,
) -> Result<Json<ChapterProgress>, HandlerError> {
    let merged = ctx
        .profile
        .update_progress(&chapter_id, update)
        .map_err(fail)?;
    Ok(Json(merged))
}
