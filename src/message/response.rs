//! Response messages (server to client).

use std::fmt;

use super::sig;
use crate::packstream::{DecodeError, PackStreamDecoder, Value, ValueMap};
use crate::version::BoltVersion;

/// All response messages.
#[derive(Debug, Clone)]
pub enum Response {
    /// SUCCESS: the request completed, with summary metadata
    Success(Success),
    /// RECORD: one row of a result stream
    Record(Record),
    /// IGNORED: the request was skipped because the server is in a
    /// failed or interrupted state
    Ignored,
    /// FAILURE: the request failed with a server error
    Failure(Failure),
}

impl Response {
    /// The message signature byte.
    pub fn signature(&self) -> u8 {
        match self {
            Response::Success(_) => sig::SUCCESS,
            Response::Record(_) => sig::RECORD,
            Response::Ignored => sig::IGNORED,
            Response::Failure(_) => sig::FAILURE,
        }
    }

    /// The message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Response::Success(_) => "SUCCESS",
            Response::Record(_) => "RECORD",
            Response::Ignored => "IGNORED",
            Response::Failure(_) => "FAILURE",
        }
    }

    /// Check if this is a SUCCESS response.
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }

    /// Check if this is a FAILURE response.
    pub fn is_failure(&self) -> bool {
        matches!(self, Response::Failure(_))
    }

    /// Decode one complete response message from a dechunked buffer.
    ///
    /// The end marker delimits exactly one message, so any bytes left
    /// after the fields are a protocol violation.
    pub fn from_bytes(data: &[u8], version: BoltVersion) -> Result<Self, DecodeError> {
        let mut decoder = PackStreamDecoder::new(data, version);
        let (signature, field_count) = decoder.read_struct_header()?;

        let response = match signature {
            sig::SUCCESS => Response::Success(Success {
                metadata: metadata_field(&mut decoder, field_count, "SUCCESS")?,
            }),
            sig::RECORD => {
                if field_count != 1 {
                    return Err(DecodeError::InvalidStructure(
                        "RECORD requires exactly one field".into(),
                    ));
                }
                match decoder.decode()? {
                    Value::List(values) => Response::Record(Record { values }),
                    other => {
                        return Err(DecodeError::InvalidStructure(format!(
                            "RECORD field must be a list, got {}",
                            other.type_name()
                        )))
                    }
                }
            }
            sig::IGNORED => {
                if field_count != 0 {
                    return Err(DecodeError::InvalidStructure(
                        "IGNORED carries no fields".into(),
                    ));
                }
                Response::Ignored
            }
            sig::FAILURE => {
                let metadata = metadata_field(&mut decoder, field_count, "FAILURE")?;
                let code = required_string(&metadata, "code")?;
                let message = required_string(&metadata, "message")?;
                Response::Failure(Failure { code, message })
            }
            other => return Err(DecodeError::UnknownSignature(other)),
        };

        if !decoder.is_empty() {
            return Err(DecodeError::TrailingBytes(decoder.remaining()));
        }
        Ok(response)
    }
}

fn metadata_field(
    decoder: &mut PackStreamDecoder<'_>,
    field_count: usize,
    what: &'static str,
) -> Result<ValueMap, DecodeError> {
    match field_count {
        0 => Ok(ValueMap::new()),
        1 => match decoder.decode()? {
            Value::Map(map) => Ok(map),
            other => Err(DecodeError::InvalidStructure(format!(
                "{} metadata must be a map, got {}",
                what,
                other.type_name()
            ))),
        },
        n => Err(DecodeError::InvalidStructure(format!(
            "{} carries at most one field, got {}",
            what, n
        ))),
    }
}

fn required_string(metadata: &ValueMap, key: &'static str) -> Result<String, DecodeError> {
    metadata
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| DecodeError::InvalidStructure(format!("FAILURE requires a {} string", key)))
}

/// SUCCESS: summary metadata for a completed request.
#[derive(Debug, Clone, Default)]
pub struct Success {
    /// Raw metadata map
    pub metadata: ValueMap,
}

impl Success {
    /// Create a summary from raw metadata.
    pub fn new(metadata: ValueMap) -> Self {
        Self { metadata }
    }

    /// Get a metadata entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Column names announced by a RUN success.
    pub fn fields(&self) -> Option<Vec<String>> {
        match self.metadata.get("fields")? {
            Value::List(list) => Some(
                list.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Bookmark issued after a completed stream or commit.
    pub fn bookmark(&self) -> Option<&str> {
        self.metadata.get("bookmark").and_then(|v| v.as_str())
    }

    /// Server agent string from an INIT/HELLO success.
    pub fn server(&self) -> Option<&str> {
        self.metadata.get("server").and_then(|v| v.as_str())
    }

    /// Result type from a stream summary, e.g. `"r"` for read-only.
    pub fn result_type(&self) -> Option<&str> {
        self.metadata.get("type").and_then(|v| v.as_str())
    }

    /// Milliseconds until the first record was available.
    pub fn t_first(&self) -> Option<i64> {
        self.metadata.get("t_first").and_then(|v| v.as_int())
    }

    /// Milliseconds until the last record was consumed.
    pub fn t_last(&self) -> Option<i64> {
        self.metadata.get("t_last").and_then(|v| v.as_int())
    }
}

/// RECORD: one row of a result stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Field values, positionally matching the RUN summary's `fields`
    pub values: Vec<Value>,
}

impl Record {
    /// Create a record from field values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a field by position.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Take ownership of the field values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// FAILURE: a server-reported error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Server error code, e.g. `Neo.ClientError.Statement.SyntaxError`
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl Failure {
    /// Create a failure from code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Client errors are the caller's fault and will not succeed on retry.
    pub fn is_client_error(&self) -> bool {
        self.code.starts_with("Neo.ClientError")
    }

    /// Transient errors may succeed when retried on a fresh session.
    pub fn is_transient_error(&self) -> bool {
        self.code.starts_with("Neo.TransientError")
    }

    /// Database errors are server-side faults.
    pub fn is_database_error(&self) -> bool {
        self.code.starts_with("Neo.DatabaseError")
    }

    /// Whether the failure happened during authentication.
    pub fn is_auth_error(&self) -> bool {
        self.code.contains("Security") || self.code.contains("Authentication")
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::sig;
    use crate::packstream::PackStreamEncoder;

    fn success_bytes(entries: &[(&str, Value)]) -> Vec<u8> {
        let mut enc = PackStreamEncoder::new(BoltVersion::V3);
        enc.encode_struct_header(1, sig::SUCCESS).unwrap();
        let mut map = ValueMap::new();
        for (k, v) in entries {
            map.insert(k.to_string(), v.clone());
        }
        enc.encode_map(&map).unwrap();
        enc.into_bytes().to_vec()
    }

    #[test]
    fn test_decode_success() {
        let data = success_bytes(&[
            ("fields", Value::List(vec![Value::String("n".into())])),
            ("t_first", Value::Int(3)),
        ]);
        let response = Response::from_bytes(&data, BoltVersion::V3).unwrap();
        assert!(response.is_success());
        match response {
            Response::Success(s) => {
                assert_eq!(s.fields(), Some(vec!["n".to_string()]));
                assert_eq!(s.t_first(), Some(3));
                assert!(s.bookmark().is_none());
            }
            other => panic!("expected SUCCESS, got {}", other.name()),
        }
    }

    #[test]
    fn test_decode_record() {
        // RECORD [[1, "x"]]
        let data = [0xB1, 0x71, 0x92, 0x01, 0x81, b'x'];
        let response = Response::from_bytes(&data, BoltVersion::V3).unwrap();
        match response {
            Response::Record(r) => {
                assert_eq!(r.len(), 2);
                assert_eq!(r.get(0), Some(&Value::Int(1)));
                assert_eq!(r.get(1), Some(&Value::String("x".into())));
            }
            other => panic!("expected RECORD, got {}", other.name()),
        }
    }

    #[test]
    fn test_decode_ignored() {
        let data = [0xB0, 0x7E];
        let response = Response::from_bytes(&data, BoltVersion::V1).unwrap();
        assert!(matches!(response, Response::Ignored));
    }

    #[test]
    fn test_decode_failure() {
        let mut enc = PackStreamEncoder::new(BoltVersion::V1);
        enc.encode_struct_header(1, sig::FAILURE).unwrap();
        let mut map = ValueMap::new();
        map.insert(
            "code".to_string(),
            Value::String("Neo.ClientError.Statement.SyntaxError".into()),
        );
        map.insert("message".to_string(), Value::String("bad input".into()));
        enc.encode_map(&map).unwrap();

        let response = Response::from_bytes(enc.as_bytes(), BoltVersion::V1).unwrap();
        match response {
            Response::Failure(f) => {
                assert!(f.is_client_error());
                assert!(!f.is_transient_error());
                assert_eq!(f.message, "bad input");
                assert!(f.to_string().contains("SyntaxError"));
            }
            other => panic!("expected FAILURE, got {}", other.name()),
        }
    }

    #[test]
    fn test_failure_requires_code_and_message() {
        let mut enc = PackStreamEncoder::new(BoltVersion::V1);
        enc.encode_struct_header(1, sig::FAILURE).unwrap();
        enc.encode_map(&ValueMap::new()).unwrap();

        let err = Response::from_bytes(enc.as_bytes(), BoltVersion::V1).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidStructure(_)));
    }

    #[test]
    fn test_unknown_response_signature() {
        let data = [0xB0, 0x10]; // RUN is not a response
        let err = Response::from_bytes(&data, BoltVersion::V3).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownSignature(0x10)));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut data = vec![0xB0, 0x7E];
        data.push(0x00);
        let err = Response::from_bytes(&data, BoltVersion::V1).unwrap_err();
        assert!(matches!(err, DecodeError::TrailingBytes(1)));
    }

    #[test]
    fn test_failure_classification() {
        assert!(Failure::new("Neo.TransientError.General.DatabaseUnavailable", "").is_transient_error());
        assert!(Failure::new("Neo.DatabaseError.General.UnknownError", "").is_database_error());
        assert!(Failure::new("Neo.ClientError.Security.Unauthorized", "").is_auth_error());
        assert!(!Failure::new("Neo.ClientError.Statement.SyntaxError", "").is_auth_error());
    }

    #[test]
    fn test_empty_success_metadata() {
        let data = [0xB0, 0x70];
        let response = Response::from_bytes(&data, BoltVersion::V1).unwrap();
        match response {
            Response::Success(s) => assert!(s.metadata.is_empty()),
            other => panic!("expected SUCCESS, got {}", other.name()),
        }
    }
}
