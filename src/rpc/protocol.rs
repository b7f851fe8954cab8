use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, RemoteError, Result};

/// One frame on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Envelope {
    Request {
        id: u64,
        target: String,
        method: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    Response {
        id: u64,
        #[serde(default)]
        result: Value,
    },
    Error {
        id: u64,
        error: RemoteError,
    },
}

impl Envelope {
    pub const fn id(&self) -> u64 {
        match self {
            Self::Request { id, .. } | Self::Response { id, .. } | Self::Error { id, .. } => *id,
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(frame: &str) -> Result<Self> {
        Ok(serde_json::from_str(frame)?)
    }
}

/// Decode positional argument `index` of `method`. A missing argument reads
/// as `null`, so optional parameters may be omitted.
pub fn arg<T: DeserializeOwned>(method: &str, args: &[Value], index: usize) -> Result<T> {
    let value = args.get(index).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| Error::invalid_arguments(method, format!("argument {index}: {e}")))
}

pub fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_envelope_wire_shape() {
        let request = Envelope::Request {
            id: 7,
            target: "ExtHostWorkspace".into(),
            method: "$acceptWorkspaceData".into(),
            args: vec![Value::Null],
        };
        let json: Value = serde_json::from_str(&request.encode().unwrap()).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "request",
                "id": 7,
                "target": "ExtHostWorkspace",
                "method": "$acceptWorkspaceData",
                "args": [null]
            })
        );

        let error = Envelope::decode(
            r#"{"type":"error","id":3,"error":{"kind":"unresolvedProxy","message":"gone"}}"#,
        )
        .unwrap();
        assert_eq!(error.id(), 3);
        let Envelope::Error { error, .. } = error else {
            panic!("expected error envelope");
        };
        assert_eq!(error.kind, ErrorKind::UnresolvedProxy);
    }

    #[test]
    fn test_arg_decoding() {
        let args = vec![json!("bridge.ping"), json!(3)];
        let id: String = arg("$executeCommand", &args, 0).unwrap();
        assert_eq!(id, "bridge.ping");
        let missing: Option<Vec<Value>> = arg("$executeCommand", &args, 5).unwrap();
        assert!(missing.is_none());

        let err = arg::<String>("$executeCommand", &args, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }
}
