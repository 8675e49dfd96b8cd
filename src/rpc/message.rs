use std::io::{self, Read, Write};

use rmpv::Value;

use crate::rpc::RpcError;

const REQUEST: u64 = 0;
const RESPONSE: u64 = 1;
const NOTIFICATION: u64 = 2;

/// One msgpack-rpc message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request {
        id: u32,
        method: String,
        params: Vec<Value>,
    },
    Response {
        id: u32,
        error: Value,
        result: Value,
    },
    Notification {
        method: String,
        params: Vec<Value>,
    },
}

impl Message {
    /// Read the next message. `Ok(None)` means the peer closed the stream
    /// between messages.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Self>, RpcError> {
        let value = match rmpv::decode::read_value(reader) {
            Ok(value) => value,
            Err(rmpv::decode::Error::InvalidMarkerRead(err))
                if err.kind() == io::ErrorKind::UnexpectedEof =>
            {
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        Self::from_value(value).map(Some)
    }

    pub fn from_value(value: Value) -> Result<Self, RpcError> {
        let Value::Array(fields) = value else {
            return Err(RpcError::Protocol(format!("expected array, got {value}")));
        };

        let mut fields = fields.into_iter();
        let kind = fields
            .next()
            .and_then(|kind| kind.as_u64())
            .ok_or_else(|| RpcError::Protocol("missing message type".to_string()))?;

        let message = match kind {
            REQUEST => Message::Request {
                id: take_id(fields.next())?,
                method: take_method(fields.next())?,
                params: take_params(fields.next())?,
            },
            RESPONSE => Message::Response {
                id: take_id(fields.next())?,
                error: fields.next().unwrap_or(Value::Nil),
                result: fields.next().unwrap_or(Value::Nil),
            },
            NOTIFICATION => Message::Notification {
                method: take_method(fields.next())?,
                params: take_params(fields.next())?,
            },
            other => {
                return Err(RpcError::Protocol(format!("unknown message type {other}")));
            }
        };

        if fields.next().is_some() {
            return Err(RpcError::Protocol("trailing message fields".to_string()));
        }

        Ok(message)
    }

    pub fn into_value(self) -> Value {
        match self {
            Message::Request { id, method, params } => Value::Array(vec![
                Value::from(REQUEST),
                Value::from(id),
                Value::from(method),
                Value::Array(params),
            ]),
            Message::Response { id, error, result } => {
                Value::Array(vec![Value::from(RESPONSE), Value::from(id), error, result])
            }
            Message::Notification { method, params } => Value::Array(vec![
                Value::from(NOTIFICATION),
                Value::from(method),
                Value::Array(params),
            ]),
        }
    }

    /// Encode and write the whole message in one `write_all`, so concurrent
    /// writers behind a lock never interleave partial frames.
    pub fn write_to<W: Write + ?Sized>(self, writer: &mut W) -> Result<(), RpcError> {
        let mut frame = Vec::new();
        rmpv::encode::write_value(&mut frame, &self.into_value())
            .map_err(|err| RpcError::Encode(err.to_string()))?;
        writer.write_all(&frame)?;
        writer.flush()?;
        Ok(())
    }
}

fn take_id(value: Option<Value>) -> Result<u32, RpcError> {
    value
        .and_then(|id| id.as_u64())
        .and_then(|id| u32::try_from(id).ok())
        .ok_or_else(|| RpcError::Protocol("invalid message id".to_string()))
}

fn take_method(value: Option<Value>) -> Result<String, RpcError> {
    match value {
        Some(Value::String(method)) => method
            .into_str()
            .ok_or_else(|| RpcError::Protocol("method name is not utf-8".to_string())),
        _ => Err(RpcError::Protocol("missing method name".to_string())),
    }
}

fn take_params(value: Option<Value>) -> Result<Vec<Value>, RpcError> {
    match value {
        Some(Value::Array(params)) => Ok(params),
        // Some clients send nil for an empty parameter list.
        Some(Value::Nil) | None => Ok(Vec::new()),
        Some(other) => Err(RpcError::Protocol(format!(
            "params must be an array, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: Value) -> Vec<u8> {
        let mut bytes = Vec::new();
        rmpv::encode::write_value(&mut bytes, &value).unwrap();
        bytes
    }

    #[test]
    fn decodes_request() {
        let bytes = encode(Value::Array(vec![
            Value::from(0),
            Value::from(7),
            Value::from("poll"),
            Value::Array(vec![]),
        ]));

        let message = Message::read_from(&mut bytes.as_slice()).unwrap();
        assert_eq!(
            message,
            Some(Message::Request {
                id: 7,
                method: "poll".to_string(),
                params: vec![],
            })
        );
    }

    #[test]
    fn decodes_notification_with_nil_params() {
        let bytes = encode(Value::Array(vec![
            Value::from(2),
            Value::from("MyPluginFoo"),
            Value::Nil,
        ]));

        let message = Message::read_from(&mut bytes.as_slice()).unwrap();
        assert_eq!(
            message,
            Some(Message::Notification {
                method: "MyPluginFoo".to_string(),
                params: vec![],
            })
        );
    }

    #[test]
    fn decodes_error_response() {
        let bytes = encode(Value::Array(vec![
            Value::from(1),
            Value::from(3),
            Value::Array(vec![Value::from(0), Value::from("boom")]),
            Value::Nil,
        ]));

        let Some(Message::Response { id, error, result }) =
            Message::read_from(&mut bytes.as_slice()).unwrap()
        else {
            panic!("expected a response");
        };
        assert_eq!(id, 3);
        assert!(error.is_array());
        assert!(result.is_nil());
    }

    #[test]
    fn reads_consecutive_messages_then_eof() {
        let mut bytes = Vec::new();
        Message::Notification {
            method: "a".to_string(),
            params: vec![],
        }
        .write_to(&mut bytes)
        .unwrap();
        Message::Notification {
            method: "b".to_string(),
            params: vec![Value::from(1)],
        }
        .write_to(&mut bytes)
        .unwrap();

        let mut reader = bytes.as_slice();
        let first = Message::read_from(&mut reader).unwrap().unwrap();
        let second = Message::read_from(&mut reader).unwrap().unwrap();
        assert!(matches!(first, Message::Notification { ref method, .. } if method == "a"));
        assert!(matches!(second, Message::Notification { ref params, .. } if params.len() == 1));
        assert_eq!(Message::read_from(&mut reader).unwrap(), None);
    }

    #[test]
    fn empty_stream_is_eof() {
        let mut reader: &[u8] = &[];
        assert_eq!(Message::read_from(&mut reader).unwrap(), None);
    }

    #[test]
    fn rejects_non_array() {
        let err = Message::from_value(Value::from("hello")).unwrap_err();
        assert!(matches!(err, RpcError::Protocol(_)));
    }

    #[test]
    fn rejects_unknown_type() {
        let err = Message::from_value(Value::Array(vec![Value::from(9)])).unwrap_err();
        assert!(matches!(err, RpcError::Protocol(ref msg) if msg.contains("unknown")));
    }

    #[test]
    fn rejects_request_without_method() {
        let err = Message::from_value(Value::Array(vec![
            Value::from(0),
            Value::from(1),
            Value::from(42),
            Value::Array(vec![]),
        ]))
        .unwrap_err();
        assert!(matches!(err, RpcError::Protocol(_)));
    }

    #[test]
    fn rejects_trailing_fields() {
        let err = Message::from_value(Value::Array(vec![
            Value::from(2),
            Value::from("x"),
            Value::Array(vec![]),
            Value::Nil,
        ]))
        .unwrap_err();
        assert!(matches!(err, RpcError::Protocol(ref msg) if msg.contains("trailing")));
    }

    #[test]
    fn truncated_frame_is_a_decode_error() {
        let bytes = encode(Value::Array(vec![
            Value::from(2),
            Value::from("MyPluginFoo"),
            Value::Array(vec![]),
        ]));

        let mut reader = &bytes[..bytes.len() - 3];
        assert!(matches!(
            Message::read_from(&mut reader),
            Err(RpcError::Decode(_))
        ));
    }
}
