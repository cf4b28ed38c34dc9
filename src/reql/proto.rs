use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result, ServerErrorKind};

/// Magic number announcing the V1_0 handshake.
pub const V1_0: u32 = 0x34c2_bdc3;

/// Protocol version sent in the first handshake message.
pub const PROTOCOL_VERSION: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Start = 1,
    Continue = 2,
    Stop = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    SuccessAtom,
    SuccessSequence,
    SuccessPartial,
    WaitComplete,
    ServerInfo,
    ClientError,
    CompileError,
    RuntimeError,
}

impl ResponseType {
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(ResponseType::SuccessAtom),
            2 => Some(ResponseType::SuccessSequence),
            3 => Some(ResponseType::SuccessPartial),
            4 => Some(ResponseType::WaitComplete),
            5 => Some(ResponseType::ServerInfo),
            16 => Some(ResponseType::ClientError),
            17 => Some(ResponseType::CompileError),
            18 => Some(ResponseType::RuntimeError),
            _ => None,
        }
    }
}

/// A decoded response body.
#[derive(Debug, Deserialize)]
pub struct Response {
    pub t: i64,
    #[serde(default)]
    pub r: Vec<Value>,
    #[serde(default)]
    pub b: Option<Value>,
}

impl Response {
    pub fn kind(&self) -> Result<ResponseType> {
        ResponseType::from_i64(self.t)
            .ok_or_else(|| Error::protocol(format!("unknown response type {}", self.t)))
    }

    /// Turns the error response types into `Error::Server`.
    pub fn into_result(self) -> Result<(ResponseType, Vec<Value>)> {
        let kind = self.kind()?;
        let error_kind = match kind {
            ResponseType::ClientError => ServerErrorKind::Client,
            ResponseType::CompileError => ServerErrorKind::Compile,
            ResponseType::RuntimeError => ServerErrorKind::Runtime,
            _ => return Ok((kind, self.r)),
        };
        let message = match self.r.first() {
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => "no message".to_string(),
        };
        Err(Error::server(error_kind, message))
    }
}
