//! Request and response bodies

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize)]
pub struct UidResponse {
    pub uid: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub pubkey: String,
    pub signature: String,
    #[serde(default)]
    pub ecosystem: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub ecosystem_id: String,
    pub key_id: String,
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct TxStatusResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<TxStatusMessage>,
}

#[derive(Debug, Serialize)]
pub struct TxStatusMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub error: String,
}

/// `sendTx` form: reserved envelope fields plus arbitrary contract
/// parameters, all urlencoded.
#[derive(Debug, Deserialize)]
pub struct SendTxForm {
    #[serde(flatten)]
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct SendTxResponse {
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
    pub result: String,
}

#[derive(Debug, Deserialize)]
pub struct EcosystemQuery {
    #[serde(default)]
    pub ecosystem: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub amount: String,
    pub money: String,
}
