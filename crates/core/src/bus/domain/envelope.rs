use serde_json::{json, Value};
use thiserror::Error;

use crate::session::domain::phase::PhaseCode;
use crate::shared::constants::GAME_START_ID;

/// A store-affecting or query request decoded from an inbound envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundCommand {
    SetPlayers(u32),
    SetGameStart(bool),
    Reset,
    SystemInfoRequest,
}

/// Result of decoding an inbound envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// Our own publication, looped back through an overlapping subscription.
    SelfEcho,
    Commands(Vec<InboundCommand>),
}

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// Decodes `{sender, method, outputs?, numPlayers?, gameStart?, reset?, info?}`.
///
/// One envelope may carry several commands. Commands are returned in the
/// order they should be applied: reset, player count, game start, queries.
/// Unknown fields are ignored; an envelope with nothing recognisable decodes
/// to an empty command list.
pub fn decode_inbound(payload: &str, own_identity: &str) -> Result<Inbound, EnvelopeError> {
    let value: Value = serde_json::from_str(payload)?;
    let Some(envelope) = value.as_object() else {
        return Err(EnvelopeError::NotAnObject);
    };

    if envelope.get("sender").and_then(Value::as_str) == Some(own_identity) {
        return Ok(Inbound::SelfEcho);
    }

    let method = envelope.get("method").and_then(Value::as_str);
    let outputs = envelope.get("outputs");
    let mut commands = Vec::new();

    let reset_by_method = method == Some("put") && outputs.and_then(Value::as_str) == Some("reset");
    let reset_by_flag = envelope.get("reset").map(lenient_bool).unwrap_or(false);
    if reset_by_method || reset_by_flag {
        commands.push(InboundCommand::Reset);
    }

    match envelope.get("numPlayers") {
        None | Some(Value::Null) => {}
        Some(raw) => {
            let players = lenient_int(raw).clamp(0, u32::MAX as i64) as u32;
            commands.push(InboundCommand::SetPlayers(players));
        }
    }

    let start_output = outputs
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .any(|output| {
            output.get("id").map(lenient_int) == Some(GAME_START_ID)
                && output.get("value").map(lenient_int) == Some(1)
        });
    if start_output {
        commands.push(InboundCommand::SetGameStart(true));
    } else if let Some(raw) = envelope.get("gameStart").filter(|v| !v.is_null()) {
        commands.push(InboundCommand::SetGameStart(lenient_bool(raw)));
    }

    if method == Some("get") && envelope.get("info").and_then(Value::as_str) == Some("system") {
        commands.push(InboundCommand::SystemInfoRequest);
    }

    Ok(Inbound::Commands(commands))
}

/// Integer from a JSON number or numeric string; anything else is `0`.
fn lenient_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Bool(b) => *b as i64,
        _ => 0,
    }
}

fn lenient_bool(value: &Value) -> bool {
    match value {
        Value::String(s) if s.trim().eq_ignore_ascii_case("true") => true,
        _ => lenient_int(value) != 0,
    }
}

/// `{sender, method: "info", outputs: [{id: 1, value: <phase>}]}`
pub fn phase_report(sender: &str, code: PhaseCode) -> String {
    json!({
        "sender": sender,
        "method": "info",
        "outputs": [{ "id": GAME_START_ID, "value": code.value() }],
    })
    .to_string()
}

/// Asks the control system for the player count.
pub fn ask_players(sender: &str) -> String {
    json!({
        "sender": sender,
        "numPlayers": null,
        "method": "get",
    })
    .to_string()
}

/// Presence announcement, sent on startup and in reply to a system query.
pub fn system_info(sender: &str, ip: &str, version: &str, trigger: &str) -> String {
    json!({
        "sender": sender,
        "connected": true,
        "ip": ip,
        "version": version,
        "method": "info",
        "trigger": trigger,
    })
    .to_string()
}

pub fn disconnected(sender: &str) -> String {
    json!({
        "sender": sender,
        "connected": false,
        "method": "info",
    })
    .to_string()
}
