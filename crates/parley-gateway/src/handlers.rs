//! Route handlers - one per channel, all following the same three steps:
//! parse the envelope, run a fresh collaborator, return its response.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde_json::Value;
use tracing::{error, info, warn};

use parley_core::{AgentError, AgentProtocol, ChannelType};

use crate::error::GatewayError;
use crate::protocol::{ChannelRequest, GREETING};
use crate::server::GatewayState;

type Payload = Result<Json<ChannelRequest>, JsonRejection>;

pub async fn index() -> &'static str {
    GREETING
}

pub async fn status(State(state): State<GatewayState>) -> Json<Value> {
    let uptime = state.start_time.elapsed().as_secs();
    Json(serde_json::json!({
        "status": "ok",
        "uptime_secs": uptime,
        "channels": ChannelType::ALL,
    }))
}

pub async fn voice(
    State(state): State<GatewayState>,
    payload: Payload,
) -> Result<Json<Value>, GatewayError> {
    handle_channel(&state, ChannelType::Voice, payload).await
}

pub async fn chat(
    State(state): State<GatewayState>,
    payload: Payload,
) -> Result<Json<Value>, GatewayError> {
    handle_channel(&state, ChannelType::Chat, payload).await
}

pub async fn email(
    State(state): State<GatewayState>,
    payload: Payload,
) -> Result<Json<Value>, GatewayError> {
    handle_channel(&state, ChannelType::Email, payload).await
}

pub async fn text(
    State(state): State<GatewayState>,
    payload: Payload,
) -> Result<Json<Value>, GatewayError> {
    handle_channel(&state, ChannelType::Text, payload).await
}

async fn handle_channel(
    state: &GatewayState,
    channel: ChannelType,
    payload: Payload,
) -> Result<Json<Value>, GatewayError> {
    let Json(request) = payload.map_err(|rejection| {
        let err = GatewayError::from(rejection);
        warn!("Rejected {} request: {}", channel, err);
        err
    })?;

    info!(
        "Handling {} input ({} chars)",
        channel,
        request.input.chars().count()
    );

    // Collaborator lives for this request only
    let agent = state.factory.create();
    match run_agent(agent, channel, &request.input).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            error!("Agent failed on {} input: {}", channel, e);
            Err(e.into())
        }
    }
}

async fn run_agent(
    mut agent: Box<dyn AgentProtocol>,
    channel: ChannelType,
    input: &str,
) -> Result<Value, AgentError> {
    agent.process(channel, input).await?;
    agent.generate_response().await
}
