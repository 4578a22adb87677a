use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream as async_stream;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::{
    application::{
        usecases::DispatchSignalUseCase, AppError, Notifier, SignalCooldownManager,
        SignalPublisher, SignalQuery, SignalStore,
    },
    domain::{OutcomeKind, SignalOutcome, SignalSubmission, Symbol, Timestamp},
    infrastructure::signal_bus::SignalBus,
};

#[derive(Clone)]
pub struct ApiState {
    pub gate: Arc<SignalCooldownManager>,
    pub store: Arc<dyn SignalStore>,
    pub notifier: Arc<dyn Notifier>,
    pub publisher: Option<Arc<dyn SignalPublisher>>,
    pub api_token: Option<String>,
    pub signal_bus: Option<SignalBus>,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/cooldowns", get(cooldown_status))
        .route("/cooldowns/clear", post(clear_all_cooldowns))
        .route("/cooldowns/startup/reset", post(reset_startup_cooldown))
        .route(
            "/cooldowns/{symbol}",
            get(check_symbol).delete(clear_symbol_cooldown),
        )
        .route("/signals", post(submit_signal).get(list_signals))
        .route("/signals/stream", get(stream_signals))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn cooldown_status(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    if let Err(rejection) = check_auth(&headers, &state.api_token) {
        return rejection.into_response();
    }
    Json(state.gate.get_status()).into_response()
}

async fn check_symbol(
    State(state): State<ApiState>,
    Path(symbol): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = check_auth(&headers, &state.api_token) {
        return rejection.into_response();
    }
    match Symbol::parse(&symbol) {
        Ok(symbol) => Json(state.gate.can_send_signal(&symbol)).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

async fn clear_all_cooldowns(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    if let Err(rejection) = check_auth(&headers, &state.api_token) {
        return rejection.into_response();
    }
    state.gate.clear_all_cooldowns();
    Json(state.gate.get_status()).into_response()
}

async fn clear_symbol_cooldown(
    State(state): State<ApiState>,
    Path(symbol): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = check_auth(&headers, &state.api_token) {
        return rejection.into_response();
    }
    match Symbol::parse(&symbol) {
        Ok(symbol) => {
            state.gate.clear_symbol_cooldown(&symbol);
            Json(state.gate.get_status()).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

async fn reset_startup_cooldown(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    if let Err(rejection) = check_auth(&headers, &state.api_token) {
        return rejection.into_response();
    }
    state.gate.reset_startup_cooldown();
    Json(state.gate.get_status()).into_response()
}

async fn submit_signal(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(submission): Json<SignalSubmission>,
) -> Response {
    if let Err(rejection) = check_auth(&headers, &state.api_token) {
        return rejection.into_response();
    }

    let signal = match submission.into_signal(state.gate.now()) {
        Ok(s) => s,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let dispatch = DispatchSignalUseCase {
        gate: &state.gate,
        store: state.store.as_ref(),
        notifier: state.notifier.as_ref(),
        publisher: state.publisher.as_deref(),
    };

    match dispatch.execute(signal).await {
        Ok(record) => {
            let code = match record.outcome {
                SignalOutcome::Blocked { .. } => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::OK,
            };
            (code, Json(record)).into_response()
        }
        Err(e @ AppError::Notifier(_)) => {
            (StatusCode::BAD_GATEWAY, format!("error: {e}")).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {e}")).into_response(),
    }
}

#[derive(Deserialize)]
struct SignalsQuery {
    limit: Option<u32>,
    since: Option<String>, // "24h" | "7d" | "30m" | "3600s"
    symbol: Option<String>,
    outcome: Option<String>,
}

async fn list_signals(
    State(state): State<ApiState>,
    Query(q): Query<SignalsQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = check_auth(&headers, &state.api_token) {
        return rejection.into_response();
    }

    let query = match build_query(&q, state.gate.now()) {
        Ok(query) => query,
        Err(msg) => return (StatusCode::BAD_REQUEST, msg).into_response(),
    };

    match state.store.list_records(query).await {
        Ok(v) => Json(v).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {e}")).into_response(),
    }
}

fn build_query(q: &SignalsQuery, now: Timestamp) -> Result<SignalQuery, String> {
    let since = match q.since.as_deref() {
        Some(v) => Some(
            parse_since(v, now).ok_or_else(|| "invalid since (use 24h/7d/30m/3600s)".to_string())?,
        ),
        None => None,
    };
    let symbol = match q.symbol.as_deref() {
        Some(s) => Some(Symbol::parse(s).map_err(|e| e.to_string())?),
        None => None,
    };
    let outcome = match q.outcome.as_deref() {
        Some(o) => Some(
            OutcomeKind::parse(o)
                .ok_or_else(|| "invalid outcome (dispatched/blocked/duplicate)".to_string())?,
        ),
        None => None,
    };

    Ok(SignalQuery {
        since,
        limit: q.limit.unwrap_or(100).min(500),
        symbol,
        outcome,
    })
}

#[derive(Deserialize)]
struct StreamQuery {
    replay: Option<u32>,
}

async fn stream_signals(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(q): Query<StreamQuery>,
) -> Response {
    if let Err(rejection) = check_auth(&headers, &state.api_token) {
        return rejection.into_response();
    }

    let Some(bus) = state.signal_bus.clone() else {
        return (
            StatusCode::NOT_IMPLEMENTED,
            "signal stream not enabled".to_string(),
        )
            .into_response();
    };

    // subscribe first so nothing dispatched during the replay query is missed
    let rx = bus.subscribe();

    // 1) history, oldest first
    let history_query = SignalQuery {
        limit: q.replay.unwrap_or(20).min(200),
        outcome: Some(OutcomeKind::Dispatched),
        ..SignalQuery::default()
    };
    let history = match state.store.list_records(history_query).await {
        Ok(mut items) => {
            items.reverse();
            items
        }
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {e}")).into_response();
        }
    };

    // 2) live
    let live = BroadcastStream::new(rx).filter_map(|msg| {
        // lagged receivers skip what they missed
        let record = msg.ok()?;
        let data = serde_json::to_string(&record).ok()?;
        Some(Ok::<SseEvent, Infallible>(
            SseEvent::default()
                .event("signal")
                .id(record.signal.signal_id)
                .data(data),
        ))
    });

    let out_stream = async_stream! {
        for record in history {
            let data = serde_json::to_string(&record).unwrap_or_else(|_| "{}".to_string());
            yield Ok::<SseEvent, Infallible>(
                SseEvent::default().event("replay").id(record.signal.signal_id).data(data),
            );
        }

        tokio::pin!(live);
        while let Some(item) = live.next().await {
            yield item;
        }
    };

    Sse::new(out_stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn check_auth(headers: &HeaderMap, token: &Option<String>) -> Result<(), (StatusCode, String)> {
    let Some(expected) = token else {
        return Ok(());
    }; // no token configured: open access
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if auth == format!("Bearer {}", expected) {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "unauthorized".to_string()))
    }
}

fn parse_since(s: &str, now: Timestamp) -> Option<Timestamp> {
    let s = s.trim();
    let (split, _) = s.char_indices().last()?;
    let (num_part, unit) = s.split_at(split);
    let n: i64 = num_part.parse().ok()?;
    let unit_ms: i64 = match unit {
        "s" => 1_000,
        "m" => 60 * 1_000,
        "h" => 60 * 60 * 1_000,
        "d" => 24 * 60 * 60 * 1_000,
        _ => return None,
    };
    if n < 0 {
        return None;
    }
    Some(now.saturating_sub(n.checked_mul(unit_ms)?))
}
