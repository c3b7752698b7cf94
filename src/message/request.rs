//! Request messages (client to server).

use std::time::Duration;

use bytes::BytesMut;

use super::sig;
use crate::packstream::{EncodeError, PackStreamEncoder, Value, ValueMap};
use crate::version::BoltVersion;

/// Access mode hint carried in transaction metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Read-write access (default)
    #[default]
    Write,
    /// Read-only access
    Read,
}

impl AccessMode {
    /// Metadata string form.
    pub fn as_str(self) -> &'static str {
        match self {
            AccessMode::Read => "r",
            AccessMode::Write => "w",
        }
    }
}

/// Authentication material for INIT/HELLO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auth {
    /// Authentication scheme, e.g. `basic`
    pub scheme: String,
    /// Principal (username)
    pub principal: Option<String>,
    /// Credentials (password)
    pub credentials: Option<String>,
}

impl Auth {
    /// Basic username/password authentication.
    pub fn basic(principal: impl Into<String>, credentials: impl Into<String>) -> Self {
        Self {
            scheme: "basic".to_string(),
            principal: Some(principal.into()),
            credentials: Some(credentials.into()),
        }
    }

    /// No authentication.
    pub fn none() -> Self {
        Self {
            scheme: "none".to_string(),
            principal: None,
            credentials: None,
        }
    }

    /// Whether this token carries no credentials at all.
    pub fn is_none(&self) -> bool {
        self.scheme == "none"
    }

    /// Token entries as a map. Empty when no credentials are present.
    pub fn entries(&self) -> ValueMap {
        let mut map = ValueMap::new();
        if self.is_none() {
            return map;
        }
        map.insert("scheme".to_string(), Value::String(self.scheme.clone()));
        if let Some(ref p) = self.principal {
            map.insert("principal".to_string(), Value::String(p.clone()));
        }
        if let Some(ref c) = self.credentials {
            map.insert("credentials".to_string(), Value::String(c.clone()));
        }
        map
    }
}

/// All request messages.
#[derive(Debug, Clone)]
pub enum Request {
    /// INIT (v1/v2) / HELLO (v3): authenticate the connection
    Init(Init),
    /// RUN: submit a statement
    Run(Run),
    /// DISCARD_ALL: drop the pending result stream
    DiscardAll,
    /// PULL_ALL: fetch the pending result stream
    PullAll,
    /// ACK_FAILURE (v1/v2): acknowledge a failure
    AckFailure,
    /// RESET: discard all outstanding work and return to ready
    Reset,
    /// BEGIN (v3): open an explicit transaction
    Begin(Begin),
    /// COMMIT (v3): commit the open transaction
    Commit,
    /// ROLLBACK (v3): roll back the open transaction
    Rollback,
    /// GOODBYE (v3): close the connection gracefully, no response
    Goodbye,
}

impl Request {
    /// The message signature byte.
    pub fn signature(&self) -> u8 {
        match self {
            Request::Init(_) => sig::INIT,
            Request::Run(_) => sig::RUN,
            Request::DiscardAll => sig::DISCARD_ALL,
            Request::PullAll => sig::PULL_ALL,
            Request::AckFailure => sig::ACK_FAILURE,
            Request::Reset => sig::RESET,
            Request::Begin(_) => sig::BEGIN,
            Request::Commit => sig::COMMIT,
            Request::Rollback => sig::ROLLBACK,
            Request::Goodbye => sig::GOODBYE,
        }
    }

    /// The message name for logging.
    pub fn name(&self, version: BoltVersion) -> &'static str {
        match self {
            Request::Init(_) => {
                if version.uses_hello() {
                    "HELLO"
                } else {
                    "INIT"
                }
            }
            Request::Run(_) => "RUN",
            Request::DiscardAll => "DISCARD_ALL",
            Request::PullAll => "PULL_ALL",
            Request::AckFailure => "ACK_FAILURE",
            Request::Reset => "RESET",
            Request::Begin(_) => "BEGIN",
            Request::Commit => "COMMIT",
            Request::Rollback => "ROLLBACK",
            Request::Goodbye => "GOODBYE",
        }
    }

    /// Whether this message exists at the given version.
    pub fn supported_by(&self, version: BoltVersion) -> bool {
        match self {
            Request::AckFailure => version.uses_ack_failure(),
            Request::Begin(_) | Request::Commit | Request::Rollback | Request::Goodbye => {
                version.supports_transactions()
            }
            _ => true,
        }
    }

    /// Encode this message into the given encoder.
    pub fn encode_into(&self, enc: &mut PackStreamEncoder) -> Result<(), EncodeError> {
        match self {
            Request::Init(m) => m.encode_into(enc),
            Request::Run(m) => m.encode_into(enc),
            Request::Begin(m) => m.encode_into(enc),
            empty => enc.encode_struct_header(0, empty.signature()),
        }
    }

    /// Encode to a fresh byte buffer.
    pub fn to_bytes(&self, version: BoltVersion) -> Result<BytesMut, EncodeError> {
        let mut enc = PackStreamEncoder::new(version);
        self.encode_into(&mut enc)?;
        Ok(enc.into_bytes())
    }
}

/// INIT / HELLO: the first message on an authenticated session.
///
/// Before version 3 this encodes as `INIT [user_agent, auth_map]`; at
/// version 3 the user agent joins the auth entries in a single HELLO map.
#[derive(Debug, Clone)]
pub struct Init {
    /// Client identification string
    pub user_agent: String,
    /// Authentication token
    pub auth: Auth,
}

impl Init {
    /// Create a new INIT/HELLO message.
    pub fn new(user_agent: impl Into<String>, auth: Auth) -> Self {
        Self {
            user_agent: user_agent.into(),
            auth,
        }
    }

    fn encode_into(&self, enc: &mut PackStreamEncoder) -> Result<(), EncodeError> {
        if enc.version().uses_hello() {
            let mut map = ValueMap::new();
            map.insert(
                "user_agent".to_string(),
                Value::String(self.user_agent.clone()),
            );
            for (key, value) in self.auth.entries() {
                map.insert(key, value);
            }
            enc.encode_struct_header(1, sig::INIT)?;
            enc.encode_map(&map)
        } else {
            enc.encode_struct_header(2, sig::INIT)?;
            enc.encode_string(&self.user_agent)?;
            enc.encode_map(&self.auth.entries())
        }
    }
}

/// RUN: submit a statement with parameters.
#[derive(Debug, Clone)]
pub struct Run {
    /// Statement text
    pub statement: String,
    /// Statement parameters
    pub parameters: ValueMap,
    /// Extra metadata, only carried at version 3
    pub extra: ValueMap,
}

impl Run {
    /// Create a new RUN message.
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            parameters: ValueMap::new(),
            extra: ValueMap::new(),
        }
    }

    /// Set all parameters at once.
    pub fn with_parameters(mut self, parameters: ValueMap) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set a single parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Set causal-consistency bookmarks (version 3 metadata).
    pub fn with_bookmarks(mut self, bookmarks: Vec<String>) -> Self {
        let list: Vec<Value> = bookmarks.into_iter().map(Value::String).collect();
        self.extra.insert("bookmarks".to_string(), Value::List(list));
        self
    }

    /// Set the server-side transaction timeout (version 3 metadata).
    pub fn with_tx_timeout(mut self, timeout: Duration) -> Self {
        self.extra.insert(
            "tx_timeout".to_string(),
            Value::Int(timeout.as_millis() as i64),
        );
        self
    }

    /// Attach custom transaction metadata (version 3 metadata).
    pub fn with_tx_metadata(mut self, metadata: ValueMap) -> Self {
        self.extra
            .insert("tx_metadata".to_string(), Value::Map(metadata));
        self
    }

    /// Set the access mode hint (version 3 metadata).
    pub fn with_mode(mut self, mode: AccessMode) -> Self {
        if mode == AccessMode::Read {
            self.extra
                .insert("mode".to_string(), Value::String("r".to_string()));
        }
        self
    }

    fn encode_into(&self, enc: &mut PackStreamEncoder) -> Result<(), EncodeError> {
        if enc.version().run_has_metadata() {
            enc.encode_struct_header(3, sig::RUN)?;
            enc.encode_string(&self.statement)?;
            enc.encode_map(&self.parameters)?;
            enc.encode_map(&self.extra)
        } else {
            enc.encode_struct_header(2, sig::RUN)?;
            enc.encode_string(&self.statement)?;
            enc.encode_map(&self.parameters)
        }
    }
}

/// BEGIN: open an explicit transaction (version 3).
#[derive(Debug, Clone, Default)]
pub struct Begin {
    /// Bookmarks the transaction must causally follow
    pub bookmarks: Vec<String>,
    /// Server-side transaction timeout
    pub tx_timeout: Option<Duration>,
    /// Access mode hint
    pub mode: AccessMode,
    /// Custom transaction metadata
    pub tx_metadata: ValueMap,
}

impl Begin {
    /// Create an empty BEGIN message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bookmarks.
    pub fn with_bookmarks(mut self, bookmarks: Vec<String>) -> Self {
        self.bookmarks = bookmarks;
        self
    }

    /// Set the server-side transaction timeout.
    pub fn with_tx_timeout(mut self, timeout: Duration) -> Self {
        self.tx_timeout = Some(timeout);
        self
    }

    /// Set the access mode hint.
    pub fn with_mode(mut self, mode: AccessMode) -> Self {
        self.mode = mode;
        self
    }

    /// Attach custom transaction metadata.
    pub fn with_tx_metadata(mut self, metadata: ValueMap) -> Self {
        self.tx_metadata = metadata;
        self
    }

    /// Build the metadata map this message carries.
    pub fn metadata_map(&self) -> ValueMap {
        let mut map = ValueMap::new();
        if !self.bookmarks.is_empty() {
            let list: Vec<Value> = self
                .bookmarks
                .iter()
                .map(|b| Value::String(b.clone()))
                .collect();
            map.insert("bookmarks".to_string(), Value::List(list));
        }
        if let Some(timeout) = self.tx_timeout {
            map.insert(
                "tx_timeout".to_string(),
                Value::Int(timeout.as_millis() as i64),
            );
        }
        if self.mode == AccessMode::Read {
            map.insert("mode".to_string(), Value::String("r".to_string()));
        }
        if !self.tx_metadata.is_empty() {
            map.insert(
                "tx_metadata".to_string(),
                Value::Map(self.tx_metadata.clone()),
            );
        }
        map
    }

    fn encode_into(&self, enc: &mut PackStreamEncoder) -> Result<(), EncodeError> {
        enc.encode_struct_header(1, sig::BEGIN)?;
        enc.encode_map(&self.metadata_map())
    }
}
