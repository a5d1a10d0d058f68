use crate::quizforge::handlers::bearer_token;
use crate::quizforge::quiz::QuizService;
use crate::quizforge::token::TokenSigner;
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct McqRequest {
    topic_input: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct McqResponse {
    pub mcqs: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct GradeRequest {
    result: String,
    collected_answers: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct GradeResponse {
    pub result1: String,
    pub result2: String,
    pub result3: String,
    pub result4: String,
}

fn authorize(headers: &HeaderMap, signer: &TokenSigner) -> Result<Uuid, (StatusCode, String)> {
    let Some(token) = bearer_token(headers) else {
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()));
    };

    signer.verify(&token).map_err(|e| {
        debug!("Token verification failed: {}", e);
        (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
    })
}

#[utoipa::path(
    post,
    path= "/generate_mcqs",
    request_body = McqRequest,
    responses (
        (status = 200, description = "Questions generated", body = McqResponse, content_type = "application/json"),
        (status = 401, description = "Missing or invalid session token", body = String),
        (status = 500, description = "Generation failure", body = String),
    ),
    tag= "quiz"
)]
// axum handler for question generation
#[instrument(skip_all)]
pub async fn generate_mcqs(
    signer: Extension<Arc<TokenSigner>>,
    quiz: Extension<Arc<QuizService>>,
    headers: HeaderMap,
    payload: Option<Json<McqRequest>>,
) -> impl IntoResponse {
    let user_id = match authorize(&headers, &signer) {
        Ok(user_id) => user_id,
        Err((status, message)) => return (status, message).into_response(),
    };

    let request: McqRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let topic = request.topic_input.trim().to_string();
    if topic.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing topic".to_string()).into_response();
    }

    debug!("Generating questions on {} for {}", topic, user_id);

    match quiz.generate_questions(&topic).await {
        Ok(mcqs) => (StatusCode::OK, Json(McqResponse { mcqs })).into_response(),
        Err(e) => {
            error!("Question generation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Question generation failed".to_string(),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path= "/generate_result",
    request_body = GradeRequest,
    responses (
        (status = 200, description = "Answers graded", body = GradeResponse, content_type = "application/json"),
        (status = 401, description = "Missing or invalid session token", body = String),
        (status = 500, description = "Generation failure", body = String),
    ),
    tag= "quiz"
)]
// axum handler for grading
#[instrument(skip_all)]
pub async fn generate_result(
    signer: Extension<Arc<TokenSigner>>,
    quiz: Extension<Arc<QuizService>>,
    headers: HeaderMap,
    payload: Option<Json<GradeRequest>>,
) -> impl IntoResponse {
    let user_id = match authorize(&headers, &signer) {
        Ok(user_id) => user_id,
        Err((status, message)) => return (status, message).into_response(),
    };

    let request: GradeRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    debug!("Grading answers for {}", user_id);

    match quiz
        .generate_result(&request.result, &request.collected_answers)
        .await
    {
        Ok(report) => (
            StatusCode::OK,
            Json(GradeResponse {
                result1: report.answer_key,
                result2: report.comparison,
                result3: report.summary,
                result4: report.suggestions,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Grading failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Grading failed".to_string(),
            )
                .into_response()
        }
    }
}
