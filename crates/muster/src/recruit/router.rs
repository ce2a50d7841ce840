use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    ChannelRef, ContentChoice, ContentKind, ContentPreference, Role, UserId,
};
use super::ledger::ParticipationLedger;
use super::registry::{AnnouncementPublisher, RecruitError, RecruitmentRegistry};
use super::session::{CalendarCursor, Session, SessionId, SessionStore, SessionUpdate, WizardStep};

/// Shared state behind the recruitment endpoints.
pub struct RecruitState<P, L> {
    pub registry: Arc<RecruitmentRegistry<P, L>>,
    pub sessions: Arc<SessionStore>,
}

impl<P, L> Clone for RecruitState<P, L> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

/// Router builder exposing the wizard-session and recruitment operations.
pub fn recruit_router<P, L>(
    registry: Arc<RecruitmentRegistry<P, L>>,
    sessions: Arc<SessionStore>,
) -> Router
where
    P: AnnouncementPublisher + 'static,
    L: ParticipationLedger + 'static,
{
    Router::new()
        .route("/api/v1/sessions", post(create_session::<P, L>))
        .route(
            "/api/v1/sessions/:session_id",
            get(get_session::<P, L>)
                .patch(patch_session::<P, L>)
                .delete(delete_session::<P, L>),
        )
        .route(
            "/api/v1/sessions/:session_id/submit",
            post(submit_session::<P, L>),
        )
        .route("/api/v1/recruitments", post(open_recruitment::<P, L>))
        .route("/api/v1/recruitments/:id", get(get_recruitment::<P, L>))
        .route(
            "/api/v1/recruitments/:id/applicants",
            post(add_applicant::<P, L>),
        )
        .route(
            "/api/v1/recruitments/:id/availability",
            post(set_availability::<P, L>),
        )
        .route(
            "/api/v1/recruitments/:id/preference",
            post(set_preference::<P, L>),
        )
        .route("/api/v1/recruitments/:id/withdraw", post(withdraw::<P, L>))
        .route(
            "/api/v1/recruitments/:id/confirm-content",
            post(confirm_content::<P, L>),
        )
        .route("/api/v1/recruitments/:id/close", post(close_recruitment::<P, L>))
        .with_state(RecruitState { registry, sessions })
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateSessionRequest {
    owner_id: String,
    content_kind: ContentKind,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionView {
    session_id: String,
    owner_id: String,
    content_kind: ContentKind,
    step: WizardStep,
    calendar_cursor: CalendarCursor,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected_time: Option<String>,
}

fn session_view(session: &Session) -> SessionView {
    SessionView {
        session_id: session.id.0.clone(),
        owner_id: session.owner_id.0.clone(),
        content_kind: session.content_kind,
        step: session.step,
        calendar_cursor: session.calendar_cursor,
        selected_date: session
            .selected_date
            .map(|date| date.format("%Y-%m-%d").to_string()),
        selected_time: session
            .selected_time
            .map(|time| time.format("%H:%M").to_string()),
    }
}

async fn create_session<P, L>(
    State(state): State<RecruitState<P, L>>,
    Json(request): Json<CreateSessionRequest>,
) -> Response
where
    P: AnnouncementPublisher + 'static,
    L: ParticipationLedger + 'static,
{
    let id = state
        .sessions
        .create(UserId(request.owner_id), request.content_kind);
    match state.sessions.get(&id) {
        Some(session) => (StatusCode::CREATED, Json(session_view(&session))).into_response(),
        None => (StatusCode::CREATED, Json(json!({ "session_id": id.0 }))).into_response(),
    }
}

async fn get_session<P, L>(
    State(state): State<RecruitState<P, L>>,
    Path(session_id): Path<String>,
) -> Response
where
    P: AnnouncementPublisher + 'static,
    L: ParticipationLedger + 'static,
{
    match state.sessions.get(&SessionId(session_id)) {
        Some(session) => (StatusCode::OK, Json(session_view(&session))).into_response(),
        None => session_absent_response(),
    }
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct SessionPatch {
    step: Option<WizardStep>,
    calendar_cursor: Option<CalendarCursor>,
    selected_date: Option<String>,
    selected_time: Option<String>,
}

async fn patch_session<P, L>(
    State(state): State<RecruitState<P, L>>,
    Path(session_id): Path<String>,
    Json(patch): Json<SessionPatch>,
) -> Response
where
    P: AnnouncementPublisher + 'static,
    L: ParticipationLedger + 'static,
{
    let selected_date = match patch.selected_date.as_deref().map(parse_date).transpose() {
        Ok(date) => date,
        Err(message) => return unprocessable(message),
    };
    let selected_time = match patch.selected_time.as_deref().map(parse_time).transpose() {
        Ok(time) => time,
        Err(message) => return unprocessable(message),
    };

    let id = SessionId(session_id);
    let updated = state.sessions.update(
        &id,
        SessionUpdate {
            step: patch.step,
            calendar_cursor: patch.calendar_cursor,
            selected_date,
            selected_time,
        },
    );
    if !updated {
        return session_absent_response();
    }
    match state.sessions.get(&id) {
        Some(session) => (StatusCode::OK, Json(session_view(&session))).into_response(),
        None => session_absent_response(),
    }
}

async fn delete_session<P, L>(
    State(state): State<RecruitState<P, L>>,
    Path(session_id): Path<String>,
) -> Response
where
    P: AnnouncementPublisher + 'static,
    L: ParticipationLedger + 'static,
{
    if state.sessions.delete(&SessionId(session_id)) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        session_absent_response()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitSessionRequest {
    host_name: String,
    channel: String,
    #[serde(default)]
    note: Option<String>,
}

/// Complete the wizard: open a recruitment from the session's selections and
/// reclaim the session.
async fn submit_session<P, L>(
    State(state): State<RecruitState<P, L>>,
    Path(session_id): Path<String>,
    Json(request): Json<SubmitSessionRequest>,
) -> Response
where
    P: AnnouncementPublisher + 'static,
    L: ParticipationLedger + 'static,
{
    let id = SessionId(session_id);
    let Some(session) = state.sessions.get(&id) else {
        return session_absent_response();
    };
    let (Some(date), Some(time)) = (session.selected_date, session.selected_time) else {
        return unprocessable("a date and a time must be selected first".to_string());
    };

    let opened = state.registry.open(
        session.content_kind,
        &date.format("%Y-%m-%d").to_string(),
        &time.format("%H:%M").to_string(),
        session.owner_id.clone(),
        &request.host_name,
        ChannelRef(request.channel),
        request.note,
    );
    match opened {
        Ok(recruitment_id) => {
            state.sessions.delete(&id);
            (
                StatusCode::CREATED,
                Json(json!({
                    "recruitment_id": recruitment_id.0,
                    "message": "recruitment announced",
                })),
            )
                .into_response()
        }
        Err(err) => recruit_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenRecruitmentRequest {
    content_kind: ContentKind,
    date: String,
    time: String,
    host_id: String,
    host_name: String,
    channel: String,
    #[serde(default)]
    note: Option<String>,
}

async fn open_recruitment<P, L>(
    State(state): State<RecruitState<P, L>>,
    Json(request): Json<OpenRecruitmentRequest>,
) -> Response
where
    P: AnnouncementPublisher + 'static,
    L: ParticipationLedger + 'static,
{
    let opened = state.registry.open(
        request.content_kind,
        &request.date,
        &request.time,
        UserId(request.host_id),
        &request.host_name,
        ChannelRef(request.channel),
        request.note,
    );
    match opened {
        Ok(id) => (
            StatusCode::CREATED,
            Json(json!({ "recruitment_id": id.0 })),
        )
            .into_response(),
        Err(err) => recruit_error_response(err),
    }
}

async fn get_recruitment<P, L>(
    State(state): State<RecruitState<P, L>>,
    Path(id): Path<String>,
) -> Response
where
    P: AnnouncementPublisher + 'static,
    L: ParticipationLedger + 'static,
{
    match state.registry.announcement(&super::domain::RecruitmentId(id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => recruit_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddApplicantRequest {
    identity: String,
    display_name: String,
    #[serde(default)]
    desired_role: Option<Role>,
}

async fn add_applicant<P, L>(
    State(state): State<RecruitState<P, L>>,
    Path(id): Path<String>,
    Json(request): Json<AddApplicantRequest>,
) -> Response
where
    P: AnnouncementPublisher + 'static,
    L: ParticipationLedger + 'static,
{
    let result = state.registry.add_applicant(
        &super::domain::RecruitmentId(id),
        UserId(request.identity),
        &request.display_name,
        request.desired_role,
    );
    message_response(result)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SetAvailabilityRequest {
    identity: String,
    display_name: String,
    available_from: String,
}

async fn set_availability<P, L>(
    State(state): State<RecruitState<P, L>>,
    Path(id): Path<String>,
    Json(request): Json<SetAvailabilityRequest>,
) -> Response
where
    P: AnnouncementPublisher + 'static,
    L: ParticipationLedger + 'static,
{
    let result = state.registry.set_availability(
        &super::domain::RecruitmentId(id),
        UserId(request.identity),
        &request.display_name,
        &request.available_from,
    );
    message_response(result)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SetPreferenceRequest {
    identity: String,
    display_name: String,
    preference: ContentPreference,
}

async fn set_preference<P, L>(
    State(state): State<RecruitState<P, L>>,
    Path(id): Path<String>,
    Json(request): Json<SetPreferenceRequest>,
) -> Response
where
    P: AnnouncementPublisher + 'static,
    L: ParticipationLedger + 'static,
{
    let result = state.registry.set_content_preference(
        &super::domain::RecruitmentId(id),
        UserId(request.identity),
        &request.display_name,
        request.preference,
    );
    message_response(result)
}

#[derive(Debug, Deserialize)]
pub(crate) struct WithdrawRequest {
    identity: String,
}

async fn withdraw<P, L>(
    State(state): State<RecruitState<P, L>>,
    Path(id): Path<String>,
    Json(request): Json<WithdrawRequest>,
) -> Response
where
    P: AnnouncementPublisher + 'static,
    L: ParticipationLedger + 'static,
{
    let result = state.registry.withdraw(
        &super::domain::RecruitmentId(id),
        &UserId(request.identity),
    );
    message_response(result)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConfirmContentRequest {
    host_id: String,
    content: ContentChoice,
}

async fn confirm_content<P, L>(
    State(state): State<RecruitState<P, L>>,
    Path(id): Path<String>,
    Json(request): Json<ConfirmContentRequest>,
) -> Response
where
    P: AnnouncementPublisher + 'static,
    L: ParticipationLedger + 'static,
{
    let result = state.registry.confirm_content(
        &super::domain::RecruitmentId(id),
        &UserId(request.host_id),
        request.content,
    );
    message_response(result)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CloseRequest {
    host_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CloseResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    confirmed_content: Option<ContentChoice>,
    confirmed_start_time: String,
    roster: Vec<UserId>,
    waiting_list: Vec<UserId>,
    assignments: BTreeMap<UserId, Role>,
}

async fn close_recruitment<P, L>(
    State(state): State<RecruitState<P, L>>,
    Path(id): Path<String>,
    Json(request): Json<CloseRequest>,
) -> Response
where
    P: AnnouncementPublisher + 'static,
    L: ParticipationLedger + 'static,
{
    match state.registry.close(
        &super::domain::RecruitmentId(id),
        &UserId(request.host_id),
    ) {
        Ok(outcome) => (
            StatusCode::OK,
            Json(CloseResponse {
                message: outcome.message,
                confirmed_content: outcome.confirmed_content,
                confirmed_start_time: outcome
                    .confirmed_start_time
                    .format("%H:%M")
                    .to_string(),
                roster: outcome.roster,
                waiting_list: outcome.waiting_list,
                assignments: outcome.assignments,
            }),
        )
            .into_response(),
        Err(err) => recruit_error_response(err),
    }
}

fn message_response(result: Result<String, RecruitError>) -> Response {
    match result {
        Ok(message) => (StatusCode::OK, Json(json!({ "message": message }))).into_response(),
        Err(err) => recruit_error_response(err),
    }
}

fn recruit_error_response(err: RecruitError) -> Response {
    let status = match &err {
        RecruitError::InvalidDateTime(_) | RecruitError::PastDateTime => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        RecruitError::NotFound => StatusCode::NOT_FOUND,
        RecruitError::AlreadyClosed
        | RecruitError::HostCannotWithdraw
        | RecruitError::NotAnApplicant => StatusCode::CONFLICT,
        RecruitError::NotHost => StatusCode::FORBIDDEN,
        RecruitError::AnnouncementFailed(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn session_absent_response() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "session expired or not found; start over" })),
    )
        .into_response()
}

fn unprocessable(message: String) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": message })),
    )
        .into_response()
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|err| format!("failed to parse '{raw}' as HH:MM ({err})"))
}
