use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JsdAdapterError;

/// An incoming protocol message. Only `request` messages are acted upon.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub seq: i64,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

impl Request {
    pub fn is_request(&self) -> bool {
        self.type_ == "request"
    }

    /// Deserializes the required `arguments` object of this request.
    pub fn arguments<T: DeserializeOwned>(&self) -> Result<T, JsdAdapterError> {
        let arguments = self
            .arguments
            .clone()
            .ok_or_else(|| JsdAdapterError::MissingArguments(self.command.clone()))?;

        serde_json::from_value(arguments).map_err(|source| JsdAdapterError::InvalidArguments {
            command: self.command.clone(),
            source,
        })
    }

    /// Like [`Request::arguments`], but an absent `arguments` object is not an error.
    pub fn optional_arguments<T: DeserializeOwned>(&self) -> Result<Option<T>, JsdAdapterError> {
        match self.arguments {
            Some(_) => self.arguments().map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub seq: i64,
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub request_seq: i64,
    pub success: bool,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Response {
    pub fn success(seq: i64, request: &Request, body: Option<Value>) -> Self {
        Self {
            seq,
            type_: "response",
            request_seq: request.seq,
            success: true,
            command: request.command.clone(),
            message: None,
            body,
        }
    }

    pub fn error(seq: i64, request: &Request, message: impl Into<String>) -> Self {
        Self {
            seq,
            type_: "response",
            request_seq: request.seq,
            success: false,
            command: request.command.clone(),
            message: Some(message.into()),
            body: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub seq: i64,
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Event {
    pub fn new(seq: i64, event: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            seq,
            type_: "event",
            event: event.into(),
            body,
        }
    }
}

/// Launch configuration sent by the client
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LaunchArgs {
    pub program: String,
    #[serde(default)]
    pub stop_on_entry: bool,
    #[serde(default)]
    pub no_debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_request_without_arguments() {
        let request: Request =
            serde_json::from_value(json!({"seq": 3, "type": "request", "command": "continue"})).unwrap();

        assert!(request.is_request());
        assert!(request.arguments.is_none());
        assert!(matches!(
            request.arguments::<LaunchArgs>(),
            Err(JsdAdapterError::MissingArguments(command)) if command == "continue"
        ));
        assert!(matches!(request.optional_arguments::<LaunchArgs>(), Ok(None)));
    }

    #[rstest]
    #[case::defaults(json!({"program": "main.js"}), false, false)]
    #[case::stop_on_entry(json!({"program": "main.js", "stopOnEntry": true}), true, false)]
    #[case::no_debug(json!({"program": "main.js", "noDebug": true, "type": "jsd"}), false, true)]
    fn test_launch_args(#[case] arguments: Value, #[case] stop_on_entry: bool, #[case] no_debug: bool) {
        let request: Request = serde_json::from_value(
            json!({"seq": 1, "type": "request", "command": "launch", "arguments": arguments}),
        )
        .unwrap();
        let args: LaunchArgs = request.arguments().unwrap();

        assert_eq!(args.program, "main.js");
        assert_eq!(args.stop_on_entry, stop_on_entry);
        assert_eq!(args.no_debug, no_debug);
    }

    #[test]
    fn test_launch_args_without_program() {
        let request: Request = serde_json::from_value(
            json!({"seq": 1, "type": "request", "command": "launch", "arguments": {"stopOnEntry": true}}),
        )
        .unwrap();

        assert!(matches!(
            request.arguments::<LaunchArgs>(),
            Err(JsdAdapterError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_response_serialization() {
        let request: Request =
            serde_json::from_value(json!({"seq": 7, "type": "request", "command": "threads"})).unwrap();

        let ok = serde_json::to_value(Response::success(2, &request, None)).unwrap();
        assert_eq!(
            ok,
            json!({"seq": 2, "type": "response", "request_seq": 7, "success": true, "command": "threads"})
        );

        let err = serde_json::to_value(Response::error(3, &request, "boom")).unwrap();
        assert_eq!(err["success"], json!(false));
        assert_eq!(err["message"], json!("boom"));
        assert!(err.get("body").is_none());
    }
}
