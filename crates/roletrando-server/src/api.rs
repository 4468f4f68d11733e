use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use roletrando_core::content::{Question, QuestionLevel};
use roletrando_core::player::sanitize_name;
use roletrando_core::room::GameKind;

use crate::content::{Bank, ThemeContent, is_valid_theme_name};
use crate::error::AppError;
use crate::lifeline;
use crate::state::AppState;
use crate::stats::RankingEntry;

#[derive(Debug, Default, Deserialize)]
pub struct ThemeQuery {
    pub theme: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipQuery {
    pub exclude_index: Option<usize>,
    pub theme: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemesResponse {
    pub themes: Vec<String>,
    pub default_theme: String,
}

/// A bank question as served to clients. The answer is left out.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub level: u32,
    pub label: String,
    pub prize: String,
    pub question: String,
    pub options: Vec<String>,
    pub question_index: usize,
}

impl QuestionResponse {
    fn new(level: &QuestionLevel, index: usize, question: &Question) -> Self {
        Self {
            level: level.level,
            label: level.label.clone(),
            prize: level.prize.clone(),
            question: question.question.clone(),
            options: question.options.clone(),
            question_index: index,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub answer_index: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub correct: bool,
    pub correct_answer_index: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiftyFiftyResponse {
    pub hidden_options: Vec<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceResponse {
    pub audience_data: Vec<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub online_players: usize,
    pub active_rooms: usize,
    pub requests_processed: u64,
    pub uptime: String,
    pub games_created: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRequest {
    pub player_name: String,
    pub game: String,
    pub score: u64,
    #[serde(default)]
    pub winner: bool,
}

/// Largest score a single recorded game may report.
pub const MAX_RECORDED_SCORE: u64 = 1_000_000_000;

/// Games a result can be recorded for.
const RECORDABLE_GAMES: &[&str] = &["game", "quiz", "millionaire"];

fn parse_bank(raw: &str) -> Result<Bank, AppError> {
    Bank::from_str_opt(raw).ok_or_else(|| AppError::NotFound(format!("Unknown bank: {raw}")))
}

fn theme(state: &AppState, requested: Option<&str>) -> Arc<ThemeContent> {
    state.content.resolve(requested).1
}

fn find_question(
    content: &ThemeContent,
    bank: Bank,
    level: u32,
    index: usize,
) -> Result<&Question, AppError> {
    content.question(bank, level, index).ok_or_else(|| {
        AppError::NotFound(format!(
            "No question {index} at level {level} in {}",
            bank.as_str()
        ))
    })
}

/// GET /api/data/themes
pub async fn get_themes(State(state): State<AppState>) -> Json<ThemesResponse> {
    Json(ThemesResponse {
        themes: state.content.theme_names(),
        default_theme: state.content.default_theme().to_string(),
    })
}

/// GET /api/data/{bank}/questions
pub async fn get_questions(
    State(state): State<AppState>,
    Path(bank): Path<String>,
    Query(query): Query<ThemeQuery>,
) -> Result<Json<Vec<QuestionResponse>>, AppError> {
    let bank = parse_bank(&bank)?;
    let content = theme(&state, query.theme.as_deref());
    let questions = content
        .bank(bank)
        .iter()
        .flat_map(|level| {
            level
                .questions
                .iter()
                .enumerate()
                .map(move |(i, q)| QuestionResponse::new(level, i, q))
        })
        .collect();
    Ok(Json(questions))
}

/// POST /api/data/{bank}/answer/{level}/{questionIndex}
pub async fn post_answer(
    State(state): State<AppState>,
    Path((bank, level, index)): Path<(String, u32, usize)>,
    Query(query): Query<ThemeQuery>,
    Json(body): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    let bank = parse_bank(&bank)?;
    let content = theme(&state, query.theme.as_deref());
    let question = find_question(&content, bank, level, index)?;
    if body.answer_index >= question.options.len() {
        return Err(AppError::BadRequest(format!(
            "answerIndex out of range: {}",
            body.answer_index
        )));
    }
    Ok(Json(AnswerResponse {
        correct: body.answer_index == question.answer,
        correct_answer_index: question.answer,
    }))
}

/// GET /api/data/{bank}/lifeline/fiftyfifty/{level}/{questionIndex}
pub async fn get_fifty_fifty(
    State(state): State<AppState>,
    Path((bank, level, index)): Path<(String, u32, usize)>,
    Query(query): Query<ThemeQuery>,
) -> Result<Json<FiftyFiftyResponse>, AppError> {
    let bank = parse_bank(&bank)?;
    let content = theme(&state, query.theme.as_deref());
    let question = find_question(&content, bank, level, index)?;
    Ok(Json(FiftyFiftyResponse {
        hidden_options: lifeline::fifty_fifty(question, &mut rand::rng()),
    }))
}

/// GET /api/data/{bank}/lifeline/audience/{level}/{questionIndex}
pub async fn get_audience(
    State(state): State<AppState>,
    Path((bank, level, index)): Path<(String, u32, usize)>,
    Query(query): Query<ThemeQuery>,
) -> Result<Json<AudienceResponse>, AppError> {
    let bank = parse_bank(&bank)?;
    let content = theme(&state, query.theme.as_deref());
    let question = find_question(&content, bank, level, index)?;
    Ok(Json(AudienceResponse {
        audience_data: lifeline::audience(question, &mut rand::rng()),
    }))
}

/// GET /api/data/{bank}/lifeline/skip/{level}
pub async fn get_skip(
    State(state): State<AppState>,
    Path((bank, level)): Path<(String, u32)>,
    Query(query): Query<SkipQuery>,
) -> Result<Json<QuestionResponse>, AppError> {
    let bank = parse_bank(&bank)?;
    let content = theme(&state, query.theme.as_deref());
    let level = content
        .level(bank, level)
        .ok_or_else(|| AppError::NotFound(format!("No level {level} in {}", bank.as_str())))?;
    let index = lifeline::skip_index(level.questions.len(), query.exclude_index, &mut rand::rng())
        .ok_or_else(|| AppError::NotFound("No other question at this level".to_string()))?;
    Ok(Json(QuestionResponse::new(
        level,
        index,
        &level.questions[index],
    )))
}

/// GET /api/stats/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let active_rooms = state.rooms.read().await.room_count();
    Json(StatsResponse {
        online_players: state.ws_connection_count.load(Ordering::Relaxed),
        active_rooms,
        requests_processed: state.stats.requests(),
        uptime: state.stats.uptime(),
        games_created: state.stats.games_created(),
    })
}

/// GET /api/stats/ranking
pub async fn get_ranking(State(state): State<AppState>) -> Json<Vec<RankingEntry>> {
    Json(state.ranking.snapshot())
}

/// POST /api/history/record: results of games played outside a room,
/// e.g. the single-player millionaire game.
pub async fn post_record(
    State(state): State<AppState>,
    Json(body): Json<RecordRequest>,
) -> Result<StatusCode, AppError> {
    let name = sanitize_name(&body.player_name)
        .ok_or_else(|| AppError::BadRequest("playerName must be 1 to 32 characters".to_string()))?;
    if !RECORDABLE_GAMES.contains(&body.game.as_str()) {
        return Err(AppError::BadRequest(format!("Unknown game: {}", body.game)));
    }
    if body.score > MAX_RECORDED_SCORE {
        return Err(AppError::BadRequest(format!(
            "score must be at most {MAX_RECORDED_SCORE}"
        )));
    }
    state
        .ranking
        .record(&name, &body.game, body.score, body.winner);
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: String,
    pub game_kind: GameKind,
}

/// `POST /api/rooms/{gameKind}`: open a room under a server-chosen code.
pub async fn post_room(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<ThemeQuery>,
) -> Result<(StatusCode, Json<CreateRoomResponse>), AppError> {
    let kind = GameKind::from_str_opt(&kind)
        .ok_or_else(|| AppError::NotFound(format!("Unknown game kind: {kind}")))?;
    let theme = query.theme.as_deref();
    if theme.is_some_and(|t| !is_valid_theme_name(t)) {
        return Err(AppError::BadRequest("Invalid theme name".to_string()));
    }
    let handle = state
        .rooms
        .write()
        .await
        .create_room_with_fresh_code(kind, theme, state.room_context());
    Ok((
        StatusCode::CREATED,
        Json(CreateRoomResponse {
            room_id: handle.code,
            game_kind: kind,
        }),
    ))
}
