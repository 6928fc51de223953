//! Ledger API handlers.
//!
//! Query-parameter driven endpoints for the settlement engine:
//! - Funding and debiting players
//! - Announcing, joining and resolving tournaments
//! - Reading balances and resetting the ledger
//!
//! Every reply is JSON. Successful writes answer `{"status":"ok","code":0}`;
//! failures answer `{"message": "...", "code": n}`.
//!
//! # Examples
//!
//! Join a tournament with two backers:
//! ```bash
//! curl -X POST 'http://127.0.0.1:5909/joinTournament?tournamentId=1&playerId=P0&backers=P1,P2'
//! ```
//!
//! Report results:
//! ```bash
//! curl -X POST http://127.0.0.1:5909/resultTournament \
//!   -d '{"tournamentId": 1, "winners": [{"playerId": "P0", "prize": 90}]}'
//! ```

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Instant;
use tourney_ledger::{LedgerError, TournamentId, TournamentOutcome};

use super::AppState;
use super::request_id::RequestId;
use crate::{logging, metrics};

pub const CODE_OK: i32 = 0;
pub const CODE_INTERNAL_ERROR: i32 = 1;
pub const CODE_WRONG_PARAMS: i32 = 2;
pub const CODE_INVALID_BODY: i32 = 3;
pub const CODE_UNPROCESSABLE: i32 = 4;

type Params = HashMap<String, String>;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
    pub code: i32,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            code: CODE_OK,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: i32,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub player: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsBody {
    pub tournament_id: TournamentId,
    #[serde(default)]
    pub winners: Vec<WinnerPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerPayload {
    pub player_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub prize: Decimal,
}

/// Failure reply of a ledger endpoint
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed query parameter
    WrongParams(&'static str),
    /// Request body is not valid results JSON
    InvalidBody(String),
    /// The settlement engine refused the operation
    Unprocessable(String),
    /// Administrative operation failed
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::WrongParams(_) | ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> i32 {
        match self {
            ApiError::WrongParams(_) => CODE_WRONG_PARAMS,
            ApiError::InvalidBody(_) => CODE_INVALID_BODY,
            ApiError::Unprocessable(_) => CODE_UNPROCESSABLE,
            ApiError::Internal(_) => CODE_INTERNAL_ERROR,
        }
    }

    fn message(self) -> String {
        match self {
            ApiError::WrongParams(message) => message.to_string(),
            ApiError::InvalidBody(message)
            | ApiError::Unprocessable(message)
            | ApiError::Internal(message) => message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let body = ErrorResponse {
            message: self.message(),
            code,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Parameter parsing
// ============================================================================

fn player_param(params: &Params) -> Result<&str, ApiError> {
    params
        .get("playerId")
        .map(String::as_str)
        .filter(|player| !player.is_empty())
        .ok_or(ApiError::WrongParams("Invalid player id"))
}

/// Largest amount a single request may move
const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA764_0000, 0x0DE0_B6B3, 0, false, 0);

/// Amount between 1 and `MAX_AMOUNT`, in plain or scientific notation
fn amount_param(params: &Params, key: &str, message: &'static str) -> Result<Decimal, ApiError> {
    params
        .get(key)
        .and_then(|raw| {
            Decimal::from_str(raw)
                .or_else(|_| Decimal::from_scientific(raw))
                .ok()
        })
        .filter(|amount| (Decimal::ONE..=MAX_AMOUNT).contains(amount))
        .ok_or(ApiError::WrongParams(message))
}

fn tournament_param(params: &Params) -> Result<TournamentId, ApiError> {
    params
        .get("tournamentId")
        .and_then(|raw| raw.parse::<TournamentId>().ok())
        .filter(|id| *id >= 1)
        .ok_or(ApiError::WrongParams("Invalid tournament id"))
}

/// Comma-separated backer names; an absent or empty parameter means no backers
fn backers_param(params: &Params) -> Vec<String> {
    match params.get("backers").map(String::as_str) {
        None | Some("") => Vec::new(),
        Some(raw) => raw.split(',').map(str::to_string).collect(),
    }
}

/// Record and log a refused operation, producing its reply
fn refused(
    request_id: &RequestId,
    operation: &'static str,
    tournament_id: Option<TournamentId>,
    err: LedgerError,
) -> ApiError {
    metrics::ledger_operation(operation, metrics::outcome_label(&err));
    logging::log_settlement_event(
        request_id.as_str(),
        operation,
        err.player(),
        tournament_id,
        &err.to_string(),
    );
    ApiError::Unprocessable(format!("Error: {}", err.client_message()))
}

fn accepted(operation: &'static str) -> ApiResult<StatusResponse> {
    metrics::ledger_operation(operation, "ok");
    Ok(Json(StatusResponse::ok()))
}

// ============================================================================
// Handlers
// ============================================================================

/// Debit a player unconditionally.
///
/// `POST /take?playerId=<name>&points=<amount>`
pub async fn take(
    State(state): State<AppState>,
    request_id: RequestId,
    Query(params): Query<Params>,
) -> ApiResult<StatusResponse> {
    let player = player_param(&params)?;
    let points = amount_param(&params, "points", "Invalid points amount")?;

    match state.engine.take(player, points).await {
        Ok(_) => accepted("take"),
        Err(e) => Err(refused(&request_id, "take", None, e)),
    }
}

/// Credit a player, creating them if absent.
///
/// `POST /fund?playerId=<name>&points=<amount>`
pub async fn fund(
    State(state): State<AppState>,
    request_id: RequestId,
    Query(params): Query<Params>,
) -> ApiResult<StatusResponse> {
    let player = player_param(&params)?;
    let points = amount_param(&params, "points", "Invalid points amount")?;

    match state.engine.fund(player, points).await {
        Ok(_) => accepted("fund"),
        Err(e) => Err(refused(&request_id, "fund", None, e)),
    }
}

/// `POST /announceTournament?tournamentId=<id>&deposit=<amount>`
pub async fn announce_tournament(
    State(state): State<AppState>,
    request_id: RequestId,
    Query(params): Query<Params>,
) -> ApiResult<StatusResponse> {
    let tournament_id = tournament_param(&params)?;
    let deposit = amount_param(&params, "deposit", "Invalid deposit amount")?;

    match state.engine.announce_tournament(tournament_id, deposit).await {
        Ok(()) => accepted("announce"),
        Err(e) => Err(refused(&request_id, "announce", Some(tournament_id), e)),
    }
}

/// Enter a player into a tournament, optionally backed by other players.
///
/// `POST /joinTournament?tournamentId=<id>&playerId=<name>&backers=<a,b,...>`
pub async fn join_tournament(
    State(state): State<AppState>,
    request_id: RequestId,
    Query(params): Query<Params>,
) -> ApiResult<StatusResponse> {
    let tournament_id = tournament_param(&params)?;
    let player = player_param(&params)?;
    let backers = backers_param(&params);

    match state
        .engine
        .join_tournament(player, tournament_id, &backers)
        .await
    {
        Ok(()) => accepted("join"),
        Err(e) => Err(refused(&request_id, "join", Some(tournament_id), e)),
    }
}

/// Pay out tournament results.
///
/// `POST /resultTournament` with body
/// `{"tournamentId": 1, "winners": [{"playerId": "P0", "prize": 90}]}`
pub async fn result_tournament(
    State(state): State<AppState>,
    request_id: RequestId,
    body: Bytes,
) -> ApiResult<StatusResponse> {
    let results: ResultsBody = serde_json::from_slice(&body)
        .map_err(|e| ApiError::InvalidBody(format!("Invalid body: {e}")))?;

    let outcomes: Vec<TournamentOutcome> = results
        .winners
        .into_iter()
        .map(|winner| TournamentOutcome::new(winner.player_id, winner.prize))
        .collect();

    let started = Instant::now();
    let resolved = state
        .engine
        .resolve_tournament(results.tournament_id, &outcomes)
        .await;
    logging::log_performance(
        "resolve",
        started.elapsed().as_millis() as u64,
        Some(&format!(
            "tournament {} with {} result(s)",
            results.tournament_id,
            outcomes.len()
        )),
    );

    match resolved {
        Ok(()) => accepted("resolve"),
        Err(e) => Err(refused(
            &request_id,
            "resolve",
            Some(results.tournament_id),
            e,
        )),
    }
}

/// `GET /balance?playerId=<name>`
pub async fn balance(
    State(state): State<AppState>,
    request_id: RequestId,
    Query(params): Query<Params>,
) -> ApiResult<BalanceResponse> {
    let player = player_param(&params)?;

    match state.engine.balance(player).await {
        Ok(balance) => Ok(Json(BalanceResponse {
            player: player.to_string(),
            balance,
        })),
        Err(e) => Err(refused(&request_id, "balance", None, e)),
    }
}

/// Drop all ledger data and seed the default players.
///
/// `POST /reset`
pub async fn reset(
    State(state): State<AppState>,
    request_id: RequestId,
) -> ApiResult<StatusResponse> {
    let started = Instant::now();
    let reset = state.engine.reset(true).await;
    logging::log_performance("reset", started.elapsed().as_millis() as u64, None);

    match reset {
        Ok(()) => accepted("reset"),
        Err(e) => {
            metrics::ledger_operation("reset", metrics::outcome_label(&e));
            logging::log_settlement_event(request_id.as_str(), "reset", None, None, &e.to_string());
            Err(ApiError::Internal(format!(
                "Internal error: {}",
                e.client_message()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_player_param_rejects_empty() {
        assert!(player_param(&params(&[("playerId", "")])).is_err());
        assert!(player_param(&params(&[])).is_err());
        assert_eq!(player_param(&params(&[("playerId", "P1")])).unwrap(), "P1");
    }

    #[test]
    fn test_amount_param_requires_at_least_one() {
        let parse = |raw| amount_param(&params(&[("points", raw)]), "points", "Invalid points amount");

        assert_eq!(parse("1").unwrap(), Decimal::ONE);
        assert_eq!(parse("12.5").unwrap(), Decimal::new(125, 1));
        assert_eq!(parse("1e3").unwrap(), Decimal::from(1000));
        assert!(parse("0.99").is_err());
        assert!(parse("-5").is_err());
        assert!(parse("abc").is_err());
    }

    #[test]
    fn test_amount_param_caps_large_amounts() {
        let parse = |raw| amount_param(&params(&[("points", raw)]), "points", "Invalid points amount");

        assert_eq!(MAX_AMOUNT, Decimal::from(1_000_000_000_000_000_000u64));
        assert_eq!(parse("1e18").unwrap(), MAX_AMOUNT);
        assert!(parse("1000000000000000000.01").is_err());
        assert!(parse("50000000000000000000000000000").is_err());
        assert!(parse("7e28").is_err());
    }

    #[test]
    fn test_tournament_param_must_be_positive_integer() {
        let parse = |raw| tournament_param(&params(&[("tournamentId", raw)]));

        assert_eq!(parse("7").unwrap(), 7);
        assert!(parse("0").is_err());
        assert!(parse("1.5").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_backers_param_splits_on_commas() {
        assert!(backers_param(&params(&[])).is_empty());
        assert!(backers_param(&params(&[("backers", "")])).is_empty());
        assert_eq!(
            backers_param(&params(&[("backers", "P1,P2")])),
            vec!["P1".to_string(), "P2".to_string()]
        );
    }

    #[test]
    fn test_status_response_shape() {
        let json = serde_json::to_string(&StatusResponse::ok()).unwrap();
        assert_eq!(json, r#"{"status":"ok","code":0}"#);
    }

    #[test]
    fn test_api_error_codes() {
        assert_eq!(ApiError::WrongParams("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::WrongParams("x").code(), CODE_WRONG_PARAMS);
        assert_eq!(ApiError::InvalidBody(String::new()).code(), CODE_INVALID_BODY);
        assert_eq!(
            ApiError::Unprocessable(String::new()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Internal(String::new()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_results_body_accepts_integer_and_float_prizes() {
        let body: ResultsBody = serde_json::from_str(
            r#"{"tournamentId": 3, "winners": [{"playerId": "P0", "prize": 90}, {"playerId": "P1", "prize": 12.5}]}"#,
        )
        .unwrap();

        assert_eq!(body.tournament_id, 3);
        assert_eq!(body.winners[0].prize, Decimal::from(90));
        assert_eq!(body.winners[1].prize, Decimal::new(125, 1));
    }
}
