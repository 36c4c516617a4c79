/*
 * Responsibility
 * - Request/response DTOs for the programming utilities
 */
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct UuidResponse {
    pub uuid: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct JwtDebuggerQuery {
    // Token to decode; defaults to the caller's own token.
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtDebuggerResponse {
    pub header: serde_json::Value,
    pub payload: serde_json::Value,
}
