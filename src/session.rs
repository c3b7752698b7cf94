//! Session state machine.
//!
//! A session owns one transport for its whole life: it negotiates the
//! protocol version, enforces legal message sequences, pairs pipelined
//! requests with their responses in FIFO order, and recovers from server
//! failures via `RESET` (or `ACK_FAILURE` before version 3).
//!
//! The session is not re-entrant. It suspends only at transport reads and
//! writes; everything else is pure in-memory work.

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace, warn};

use crate::chunk::{MessageCodec, DEFAULT_MAX_MESSAGE_SIZE};
use crate::error::{BoltError, BoltResult};
use crate::handshake;
use crate::message::{Auth, Begin, Init, Record, Request, Response, Run, Success};
use crate::version::BoltVersion;

/// Default client identification string.
pub const USER_AGENT: &str = "ArcaDB-Client/0.3.0";

/// Observable session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport yet
    Disconnected,
    /// Handshake done, not yet authenticated
    Connected,
    /// Authenticated and idle
    Ready,
    /// A result stream is open
    Streaming,
    /// Inside an explicit transaction, idle
    TxReady,
    /// Inside an explicit transaction with an open result stream
    TxStreaming,
    /// A request failed; the server ignores everything until recovery
    Failed,
    /// Outstanding work is being discarded
    Interrupted,
    /// The session is unusable and must be discarded
    Defunct,
}

/// Session tuning knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline applied to every transport read and write. `None` waits
    /// forever.
    pub io_timeout: Option<Duration>,
    /// Cap on a single reassembled incoming message.
    pub max_message_size: usize,
    /// Client identification sent with INIT/HELLO.
    pub user_agent: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            io_timeout: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl SessionConfig {
    /// Set the transport deadline.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    /// Set the incoming message size cap.
    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    /// Set the client identification string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// One reply from the server, paired with its originating request.
#[derive(Debug)]
pub enum Reply {
    /// The request completed; summary metadata attached
    Summary(Success),
    /// One row of the open result stream
    Record(Record),
    /// The request was skipped by a failed or interrupted server
    Ignored,
}

/// What the session still expects an answer for, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Init,
    Run { in_tx: bool },
    Pull { in_tx: bool },
    Discard { in_tx: bool },
    AckFailure,
    Begin,
    Commit,
    Rollback,
    /// A RESET with the number of drained requests whose responses may
    /// still arrive ahead of the RESET's own SUCCESS.
    Reset { leftover: usize },
}

/// One protocol conversation bound to one transport.
///
/// The transport is any ordered, reliable byte stream; the session never
/// opens or pools connections itself.
pub struct Session<T> {
    transport: T,
    version: BoltVersion,
    state: SessionState,
    /// State assuming every queued request succeeds; legality checks for
    /// pipelined sends run against this instead of `state`.
    projected: SessionState,
    codec: MessageCodec,
    read_buf: BytesMut,
    write_buf: BytesMut,
    pending: VecDeque<Pending>,
    /// Replies owed to the caller for requests drained by a RESET.
    drained_replies: usize,
    last_bookmark: Option<String>,
    io_timeout: Option<Duration>,
    user_agent: String,
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Open a session: run the handshake on a fresh transport with the
    /// given version proposals.
    pub async fn open(transport: T, proposals: &[BoltVersion]) -> BoltResult<Self> {
        Self::open_with(transport, proposals, SessionConfig::default()).await
    }

    /// Open a session with explicit configuration.
    ///
    /// On handshake failure the transport is closed by dropping it.
    pub async fn open_with(
        mut transport: T,
        proposals: &[BoltVersion],
        config: SessionConfig,
    ) -> BoltResult<Self> {
        let negotiation = handshake::negotiate(&mut transport, proposals);
        let version = match config.io_timeout {
            Some(limit) => tokio::time::timeout(limit, negotiation)
                .await
                .map_err(|_| BoltError::Timeout)?,
            None => negotiation.await,
        }?;

        Ok(Self {
            transport,
            version,
            state: SessionState::Connected,
            projected: SessionState::Connected,
            codec: MessageCodec::with_max_size(version, config.max_message_size),
            read_buf: BytesMut::with_capacity(8192),
            write_buf: BytesMut::with_capacity(8192),
            pending: VecDeque::new(),
            drained_replies: 0,
            last_bookmark: None,
            io_timeout: config.io_timeout,
            user_agent: config.user_agent,
        })
    }

    /// The negotiated protocol version.
    pub fn version(&self) -> BoltVersion {
        self.version
    }

    /// The current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The most recent bookmark seen in any summary.
    pub fn last_bookmark(&self) -> Option<&str> {
        self.last_bookmark.as_deref()
    }

    /// Whether the session can accept a new statement.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready | SessionState::TxReady)
    }

    // ------------------------------------------------------------------
    // Pipelining surface
    // ------------------------------------------------------------------

    /// Write one request without waiting for its response.
    ///
    /// Responses arrive strictly in request order via [`Session::fetch`].
    /// A `RESET` takes precedence: every request still awaiting a reply
    /// is resolved as [`Reply::Ignored`] immediately.
    pub async fn send(&mut self, request: Request) -> BoltResult<()> {
        if self.state == SessionState::Defunct {
            return Err(BoltError::protocol("session is defunct"));
        }
        if !request.supported_by(self.version) {
            return Err(BoltError::protocol(format!(
                "{} is not available at Bolt v{}",
                request.name(self.version),
                self.version
            )));
        }

        trace!(request = request.name(self.version), "send");

        match &request {
            Request::Goodbye => {
                self.encode_request(&request)?;
                self.flush_write_buf().await?;
                self.state = SessionState::Defunct;
                self.projected = SessionState::Defunct;
                Ok(())
            }
            Request::Reset => {
                self.encode_request(&request)?;
                self.flush_write_buf().await?;
                let leftover = self.pending.len();
                self.drained_replies += leftover;
                self.pending.clear();
                self.pending.push_back(Pending::Reset { leftover });
                self.state = SessionState::Interrupted;
                self.projected = SessionState::Ready;
                Ok(())
            }
            _ => {
                self.encode_request(&request)?;
                let kind = self.admit(&request)?;
                self.flush_write_buf().await?;
                self.pending.push_back(kind);
                Ok(())
            }
        }
    }

    /// Read the next reply, paired with the oldest outstanding request.
    pub async fn fetch(&mut self) -> BoltResult<Reply> {
        if self.drained_replies > 0 {
            self.drained_replies -= 1;
            return Ok(Reply::Ignored);
        }
        if self.state == SessionState::Defunct {
            return Err(BoltError::protocol("session is defunct"));
        }

        loop {
            let response = self.read_response().await?;
            trace!(response = response.name(), "recv");

            match response {
                Response::Record(record) => match self.pending.front() {
                    Some(Pending::Pull { .. }) => return Ok(Reply::Record(record)),
                    Some(Pending::Reset { .. }) => continue,
                    _ => {
                        return Err(self.defunct(BoltError::protocol(
                            "RECORD without a PULL_ALL outstanding",
                        )))
                    }
                },

                Response::Ignored => {
                    if let Some(Pending::Reset { leftover }) = self.pending.front_mut() {
                        if *leftover == 0 {
                            return Err(
                                self.defunct(BoltError::protocol("IGNORED in response to RESET"))
                            );
                        }
                        *leftover -= 1;
                        continue;
                    }
                    if self.pending.pop_front().is_some() {
                        return Ok(Reply::Ignored);
                    }
                    return Err(
                        self.defunct(BoltError::protocol("response without an outstanding request"))
                    );
                }

                Response::Success(summary) => match self.pending.pop_front() {
                    Some(kind) => {
                        self.on_success(kind, &summary);
                        return Ok(Reply::Summary(summary));
                    }
                    None => {
                        return Err(self
                            .defunct(BoltError::protocol("response without an outstanding request")))
                    }
                },

                Response::Failure(failure) => {
                    if let Some(Pending::Reset { leftover }) = self.pending.front_mut() {
                        if *leftover > 0 {
                            *leftover -= 1;
                            warn!(code = %failure.code, "failure superseded by RESET");
                            continue;
                        }
                        self.pending.pop_front();
                        return Err(self.defunct(BoltError::ServerFailure {
                            code: failure.code,
                            message: failure.message,
                        }));
                    }
                    match self.pending.pop_front() {
                        Some(kind) => {
                            return Err(self.on_failure(kind, failure.code, failure.message))
                        }
                        None => {
                            return Err(self.defunct(BoltError::protocol(
                                "response without an outstanding request",
                            )))
                        }
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // High-level operations
    // ------------------------------------------------------------------

    /// Authenticate the connection with INIT (HELLO at version 3).
    ///
    /// A server failure here leaves the session defunct.
    pub async fn authenticate(&mut self, auth: Auth) -> BoltResult<Success> {
        let init = Init::new(self.user_agent.clone(), auth);
        self.send(Request::Init(init)).await?;
        let summary = self.expect_summary("INIT").await?;
        debug!(server = summary.server().unwrap_or("unknown"), "authenticated");
        Ok(summary)
    }

    /// Submit a statement. On success the returned summary carries the
    /// column names and the session starts streaming.
    pub async fn run(&mut self, run: Run) -> BoltResult<Success> {
        self.send(Request::Run(run)).await?;
        self.expect_summary("RUN").await
    }

    /// Request the open result stream.
    pub async fn pull(&mut self) -> BoltResult<RecordStream<'_, T>> {
        self.send(Request::PullAll).await?;
        Ok(RecordStream {
            session: self,
            summary: None,
            done: false,
        })
    }

    /// Pull the whole result stream into memory.
    pub async fn pull_all(&mut self) -> BoltResult<(Vec<Record>, Success)> {
        let mut stream = self.pull().await?;
        let mut records = Vec::new();
        while let Some(record) = stream.next().await? {
            records.push(record);
        }
        match stream.into_summary() {
            Some(summary) => Ok((records, summary)),
            None => Err(BoltError::protocol("result stream ended without a summary")),
        }
    }

    /// Drop the open result stream without transferring it.
    pub async fn discard(&mut self) -> BoltResult<Success> {
        self.send(Request::DiscardAll).await?;
        self.expect_summary("DISCARD_ALL").await
    }

    /// Open an explicit transaction (version 3).
    ///
    /// When the caller supplies no bookmarks, the most recent bookmark
    /// seen on this session is folded in for causal consistency.
    pub async fn begin(&mut self, mut begin: Begin) -> BoltResult<Success> {
        if begin.bookmarks.is_empty() {
            if let Some(ref bookmark) = self.last_bookmark {
                begin.bookmarks.push(bookmark.clone());
            }
        }
        self.send(Request::Begin(begin)).await?;
        self.expect_summary("BEGIN").await
    }

    /// Commit the open transaction, returning the bookmark it produced.
    pub async fn commit(&mut self) -> BoltResult<Option<String>> {
        self.send(Request::Commit).await?;
        let summary = self.expect_summary("COMMIT").await?;
        Ok(summary.bookmark().map(str::to_string))
    }

    /// Roll back the open transaction.
    pub async fn rollback(&mut self) -> BoltResult<()> {
        self.send(Request::Rollback).await?;
        self.expect_summary("ROLLBACK").await.map(|_| ())
    }

    /// Acknowledge a failure (versions 1 and 2).
    pub async fn ack_failure(&mut self) -> BoltResult<()> {
        self.send(Request::AckFailure).await?;
        self.expect_summary("ACK_FAILURE").await.map(|_| ())
    }

    /// Discard all outstanding work and return the session to ready.
    ///
    /// Legal in every live state. Replies owed to requests drained by the
    /// RESET are consumed here as ignored.
    pub async fn reset(&mut self) -> BoltResult<()> {
        self.send(Request::Reset).await?;
        loop {
            match self.fetch().await? {
                Reply::Summary(_) => {
                    debug!("session reset");
                    return Ok(());
                }
                Reply::Ignored | Reply::Record(_) => continue,
            }
        }
    }

    /// Close the session: send GOODBYE when the version supports it, then
    /// shut the transport down.
    pub async fn close(mut self) -> BoltResult<()> {
        if self.version.supports_goodbye() && self.state != SessionState::Defunct {
            let _ = self.send(Request::Goodbye).await;
        }
        let timeout = self.io_timeout;
        io_deadline(timeout, self.transport.shutdown()).await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn expect_summary(&mut self, what: &'static str) -> BoltResult<Success> {
        match self.fetch().await? {
            Reply::Summary(summary) => Ok(summary),
            Reply::Ignored => Err(BoltError::protocol(format!(
                "{} ignored; the session requires RESET to recover",
                what
            ))),
            Reply::Record(_) => Err(self.defunct(BoltError::protocol(format!(
                "unexpected RECORD in response to {}",
                what
            )))),
        }
    }

    /// Validate a request against the projected state and account for its
    /// expected outcome. Requests sent into a failed or interrupted
    /// session are admitted anyway; the server answers them with IGNORED.
    fn admit(&mut self, request: &Request) -> BoltResult<Pending> {
        use SessionState::*;

        let kind = match request {
            Request::Init(_) => {
                if self.projected != Connected {
                    return Err(self.bad_state(request));
                }
                self.projected = Ready;
                Pending::Init
            }
            Request::Run(_) => match self.projected {
                Ready => {
                    self.projected = Streaming;
                    Pending::Run { in_tx: false }
                }
                TxReady => {
                    self.projected = TxStreaming;
                    Pending::Run { in_tx: true }
                }
                Failed | Interrupted => {
                    self.mark_interrupted();
                    Pending::Run { in_tx: false }
                }
                _ => return Err(self.bad_state(request)),
            },
            Request::PullAll => match self.projected {
                Streaming => {
                    self.projected = Ready;
                    Pending::Pull { in_tx: false }
                }
                TxStreaming => {
                    self.projected = TxReady;
                    Pending::Pull { in_tx: true }
                }
                Failed | Interrupted => {
                    self.mark_interrupted();
                    Pending::Pull { in_tx: false }
                }
                _ => return Err(self.bad_state(request)),
            },
            Request::DiscardAll => match self.projected {
                Streaming => {
                    self.projected = Ready;
                    Pending::Discard { in_tx: false }
                }
                TxStreaming => {
                    self.projected = TxReady;
                    Pending::Discard { in_tx: true }
                }
                Failed | Interrupted => {
                    self.mark_interrupted();
                    Pending::Discard { in_tx: false }
                }
                _ => return Err(self.bad_state(request)),
            },
            Request::AckFailure => match self.projected {
                Failed | Interrupted => {
                    self.projected = Ready;
                    Pending::AckFailure
                }
                _ => return Err(self.bad_state(request)),
            },
            Request::Begin(_) => match self.projected {
                Ready => {
                    self.projected = TxReady;
                    Pending::Begin
                }
                Failed | Interrupted => {
                    self.mark_interrupted();
                    Pending::Begin
                }
                _ => return Err(self.bad_state(request)),
            },
            Request::Commit => match self.projected {
                TxReady => {
                    self.projected = Ready;
                    Pending::Commit
                }
                Failed | Interrupted => {
                    self.mark_interrupted();
                    Pending::Commit
                }
                _ => return Err(self.bad_state(request)),
            },
            Request::Rollback => match self.projected {
                TxReady => {
                    self.projected = Ready;
                    Pending::Rollback
                }
                Failed | Interrupted => {
                    self.mark_interrupted();
                    Pending::Rollback
                }
                _ => return Err(self.bad_state(request)),
            },
            Request::Reset | Request::Goodbye => return Err(self.bad_state(request)),
        };
        Ok(kind)
    }

    fn bad_state(&self, request: &Request) -> BoltError {
        BoltError::protocol(format!(
            "{} is not permitted in state {:?}",
            request.name(self.version),
            self.projected
        ))
    }

    fn mark_interrupted(&mut self) {
        self.state = SessionState::Interrupted;
        self.projected = SessionState::Interrupted;
    }

    fn on_success(&mut self, kind: Pending, summary: &Success) {
        use SessionState::*;

        if let Some(bookmark) = summary.bookmark() {
            self.last_bookmark = Some(bookmark.to_string());
        }

        self.state = match kind {
            Pending::Init => Ready,
            Pending::Run { in_tx: false } => Streaming,
            Pending::Run { in_tx: true } => TxStreaming,
            Pending::Pull { in_tx: false } | Pending::Discard { in_tx: false } => Ready,
            Pending::Pull { in_tx: true } | Pending::Discard { in_tx: true } => TxReady,
            Pending::AckFailure => Ready,
            Pending::Begin => TxReady,
            Pending::Commit | Pending::Rollback => Ready,
            Pending::Reset { .. } => Ready,
        };
        if self.pending.is_empty() {
            self.projected = self.state;
        }
    }

    fn on_failure(&mut self, kind: Pending, code: String, message: String) -> BoltError {
        warn!(code = %code, "server failure");
        match kind {
            Pending::Init => self.defunct(BoltError::Auth { code, message }),
            Pending::AckFailure => {
                // the recovery path itself failed; nothing left to recover
                self.defunct(BoltError::ServerFailure { code, message })
            }
            _ => {
                self.state = SessionState::Failed;
                self.projected = SessionState::Failed;
                BoltError::ServerFailure { code, message }
            }
        }
    }

    fn defunct(&mut self, err: BoltError) -> BoltError {
        self.state = SessionState::Defunct;
        self.projected = SessionState::Defunct;
        self.pending.clear();
        self.drained_replies = 0;
        err
    }

    fn encode_request(&mut self, request: &Request) -> BoltResult<()> {
        self.write_buf.clear();
        // an encode failure never reaches the wire; the session stays
        // healthy
        self.codec.encode(request, &mut self.write_buf)
    }

    async fn flush_write_buf(&mut self) -> BoltResult<()> {
        let timeout = self.io_timeout;
        let transport = &mut self.transport;
        let buf = &self.write_buf;
        let result = io_deadline(timeout, async {
            transport.write_all(buf).await?;
            transport.flush().await
        })
        .await;
        result.map_err(|e| self.defunct(e))
    }

    async fn read_response(&mut self) -> BoltResult<Response> {
        loop {
            match self.codec.decode(&mut self.read_buf) {
                Ok(Some(response)) => return Ok(response),
                Ok(None) => {}
                Err(e) => return Err(self.defunct(e)),
            }

            let timeout = self.io_timeout;
            let transport = &mut self.transport;
            let buf = &mut self.read_buf;
            let n = match io_deadline(timeout, transport.read_buf(buf)).await {
                Ok(n) => n,
                Err(e) => return Err(self.defunct(e)),
            };
            if n == 0 {
                let err = BoltError::Transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                ));
                return Err(self.defunct(err));
            }
        }
    }
}

impl<T> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("version", &self.version)
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .field("last_bookmark", &self.last_bookmark)
            .finish()
    }
}

/// A result stream produced by [`Session::pull`].
///
/// Records arrive one at a time; after the stream ends the terminating
/// summary is available via [`RecordStream::summary`].
pub struct RecordStream<'s, T> {
    session: &'s mut Session<T>,
    summary: Option<Success>,
    done: bool,
}

impl<T> RecordStream<'_, T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// The next record, or `None` once the summary has arrived.
    pub async fn next(&mut self) -> BoltResult<Option<Record>> {
        if self.done {
            return Ok(None);
        }
        match self.session.fetch().await {
            Ok(Reply::Record(record)) => Ok(Some(record)),
            Ok(Reply::Summary(summary)) => {
                self.summary = Some(summary);
                self.done = true;
                Ok(None)
            }
            Ok(Reply::Ignored) => {
                self.done = true;
                Err(BoltError::protocol(
                    "PULL_ALL ignored; the session requires RESET to recover",
                ))
            }
            Err(e) => {
                self.done = true;
                Err(e)
            }
        }
    }

    /// The terminating summary, once the stream is exhausted.
    pub fn summary(&self) -> Option<&Success> {
        self.summary.as_ref()
    }

    /// Take the terminating summary.
    pub fn into_summary(self) -> Option<Success> {
        self.summary
    }
}

async fn io_deadline<F, O>(limit: Option<Duration>, fut: F) -> BoltResult<O>
where
    F: Future<Output = io::Result<O>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(BoltError::from),
            Err(_) => Err(BoltError::Timeout),
        },
        None => fut.await.map_err(BoltError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{write_chunked, Dechunker};
    use crate::error::HandshakeError;
    use crate::message::sig;
    use crate::packstream::{PackStreamDecoder, PackStreamEncoder, Date, Value, ValueMap};
    use tokio::io::{duplex, DuplexStream};

    /// Scripted server side of a duplex transport.
    struct Peer {
        stream: DuplexStream,
        buf: BytesMut,
        dechunker: Dechunker,
    }

    impl Peer {
        fn new(stream: DuplexStream) -> Self {
            Self {
                stream,
                buf: BytesMut::new(),
                dechunker: Dechunker::new(),
            }
        }

        async fn handshake(&mut self, select: u32) -> [u8; 20] {
            let mut request = [0u8; 20];
            self.stream.read_exact(&mut request).await.unwrap();
            self.stream.write_all(&select.to_be_bytes()).await.unwrap();
            request
        }

        async fn expect_message(&mut self) -> BytesMut {
            loop {
                if let Some(payload) = self.dechunker.decode(&mut self.buf).unwrap() {
                    return payload;
                }
                let n = self.stream.read_buf(&mut self.buf).await.unwrap();
                assert!(n > 0, "client closed while a message was expected");
            }
        }

        async fn send(&mut self, payload: &[u8]) {
            let mut framed = BytesMut::new();
            write_chunked(payload, &mut framed);
            self.stream.write_all(&framed).await.unwrap();
        }
    }

    fn success(entries: &[(&str, Value)]) -> Vec<u8> {
        let mut enc = PackStreamEncoder::new(BoltVersion::V3);
        enc.encode_struct_header(1, sig::SUCCESS).unwrap();
        let mut map = ValueMap::new();
        for (k, v) in entries {
            map.insert((*k).to_string(), v.clone());
        }
        enc.encode_map(&map).unwrap();
        enc.as_bytes().to_vec()
    }

    fn record(values: Vec<Value>) -> Vec<u8> {
        let mut enc = PackStreamEncoder::new(BoltVersion::V3);
        enc.encode_struct_header(1, sig::RECORD).unwrap();
        enc.encode_list(&values).unwrap();
        enc.as_bytes().to_vec()
    }

    fn failure(code: &str, message: &str) -> Vec<u8> {
        let mut enc = PackStreamEncoder::new(BoltVersion::V3);
        enc.encode_struct_header(1, sig::FAILURE).unwrap();
        let mut map = ValueMap::new();
        map.insert("code".to_string(), Value::String(code.into()));
        map.insert("message".to_string(), Value::String(message.into()));
        enc.encode_map(&map).unwrap();
        enc.as_bytes().to_vec()
    }

    const IGNORED: [u8; 2] = [0xB0, 0x7E];

    fn fields_of(summary: &Success) -> Vec<String> {
        summary.fields().unwrap_or_default()
    }

    async fn ready_session(select: u32) -> (Session<DuplexStream>, Peer) {
        let (client, server) = duplex(1 << 20);
        let mut peer = Peer::new(server);

        let open = Session::open(client, &BoltVersion::ALL);
        let (session, _) = tokio::join!(open, peer.handshake(select));
        let mut session = session.unwrap();

        let auth = session.authenticate(Auth::none());
        let serve = async {
            peer.expect_message().await;
            peer.send(&success(&[("server", Value::String("ArcaDB/0.3".into()))]))
                .await;
        };
        let (auth, _) = tokio::join!(auth, serve);
        auth.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        (session, peer)
    }

    #[tokio::test]
    async fn test_open_negotiates_version() {
        let (client, server) = duplex(1 << 16);
        let mut peer = Peer::new(server);

        let open = Session::open(client, &BoltVersion::ALL);
        let (session, request) = tokio::join!(open, peer.handshake(3));
        let session = session.unwrap();

        assert_eq!(
            request,
            [
                0x60, 0x60, 0xB0, 0x17, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x02, 0x00,
                0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
            ]
        );
        assert_eq!(session.version(), BoltVersion::V3);
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_open_no_common_version() {
        let (client, server) = duplex(1 << 16);
        let mut peer = Peer::new(server);

        let open = Session::open(client, &BoltVersion::ALL);
        let (result, _) = tokio::join!(open, peer.handshake(0));
        let err = result.err().unwrap();
        assert!(matches!(
            err,
            BoltError::Handshake(HandshakeError::NoCommonVersion)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_uses_hello_at_v3() {
        let (client, server) = duplex(1 << 16);
        let mut peer = Peer::new(server);

        let open = Session::open(client, &BoltVersion::ALL);
        let (session, _) = tokio::join!(open, peer.handshake(3));
        let mut session = session.unwrap();

        let auth = session.authenticate(Auth::basic("user", "secret"));
        let serve = async {
            let hello = peer.expect_message().await;
            peer.send(&success(&[("server", Value::String("ArcaDB/0.3".into()))]))
                .await;
            hello
        };
        let (auth, hello) = tokio::join!(auth, serve);

        let summary = auth.unwrap();
        assert_eq!(summary.server(), Some("ArcaDB/0.3"));
        assert_eq!(session.state(), SessionState::Ready);
        // HELLO is a single-map structure
        assert_eq!(hello[0], 0xB1);
        assert_eq!(hello[1], sig::INIT);
    }

    #[tokio::test]
    async fn test_authenticate_failure_is_fatal() {
        let (client, server) = duplex(1 << 16);
        let mut peer = Peer::new(server);

        let open = Session::open(client, &BoltVersion::ALL);
        let (session, _) = tokio::join!(open, peer.handshake(3));
        let mut session = session.unwrap();

        let auth = session.authenticate(Auth::basic("user", "wrong"));
        let serve = async {
            peer.expect_message().await;
            peer.send(&failure(
                "Neo.ClientError.Security.Unauthorized",
                "invalid credentials",
            ))
            .await;
        };
        let (auth, _) = tokio::join!(auth, serve);

        let err = auth.err().unwrap();
        assert!(matches!(err, BoltError::Auth { .. }));
        assert_eq!(session.state(), SessionState::Defunct);
    }

    #[tokio::test]
    async fn test_run_pull_happy_path() {
        let (mut session, mut peer) = ready_session(3).await;

        let client = async {
            let summary = session.run(Run::new("RETURN 1 AS n")).await.unwrap();
            assert_eq!(fields_of(&summary), vec!["n".to_string()]);
            assert_eq!(session.state(), SessionState::Streaming);

            let (records, summary) = session.pull_all().await.unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].get(0), Some(&Value::Int(1)));
            assert_eq!(summary.result_type(), Some("r"));
            assert_eq!(session.state(), SessionState::Ready);
        };
        let serve = async {
            let run = peer.expect_message().await;
            assert_eq!(run[1], sig::RUN);
            peer.send(&success(&[(
                "fields",
                Value::List(vec![Value::String("n".into())]),
            )]))
            .await;

            let pull = peer.expect_message().await;
            assert_eq!(pull[1], sig::PULL_ALL);
            peer.send(&record(vec![Value::Int(1)])).await;
            peer.send(&success(&[("type", Value::String("r".into()))]))
                .await;
        };
        tokio::join!(client, serve);
    }

    #[tokio::test]
    async fn test_failure_recovery_with_ack_failure_v1() {
        let (mut session, mut peer) = ready_session(1).await;
        assert_eq!(session.version(), BoltVersion::V1);

        let client = async {
            let err = session.run(Run::new("BAD CYPHER")).await.err().unwrap();
            assert!(matches!(err, BoltError::ServerFailure { .. }));
            assert!(err.is_recoverable());
            assert_eq!(session.state(), SessionState::Failed);

            // a pipelined request after the failure comes back ignored
            session.send(Request::Run(Run::new("RETURN 1"))).await.unwrap();
            assert_eq!(session.state(), SessionState::Interrupted);
            assert!(matches!(session.fetch().await.unwrap(), Reply::Ignored));

            session.ack_failure().await.unwrap();
            assert_eq!(session.state(), SessionState::Ready);

            let summary = session.run(Run::new("RETURN 1 AS n")).await.unwrap();
            assert_eq!(fields_of(&summary), vec!["n".to_string()]);

            let (records, _) = session.pull_all().await.unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(session.state(), SessionState::Ready);
        };
        let serve = async {
            let run = peer.expect_message().await;
            // v1 RUN carries two fields
            assert_eq!(run[0], 0xB2);
            assert_eq!(run[1], sig::RUN);
            peer.send(&failure(
                "Neo.ClientError.Statement.SyntaxError",
                "Invalid input 'BAD'",
            ))
            .await;

            peer.expect_message().await; // the doomed RUN
            peer.send(&IGNORED).await;

            let ack = peer.expect_message().await;
            assert_eq!(ack[1], sig::ACK_FAILURE);
            peer.send(&success(&[])).await;

            peer.expect_message().await; // RUN
            peer.send(&success(&[(
                "fields",
                Value::List(vec![Value::String("n".into())]),
            )]))
            .await;
            peer.expect_message().await; // PULL_ALL
            peer.send(&record(vec![Value::Int(1)])).await;
            peer.send(&success(&[])).await;
        };
        tokio::join!(client, serve);
    }

    #[tokio::test]
    async fn test_ack_failure_rejected_at_v3() {
        let (mut session, _peer) = ready_session(3).await;
        let err = session.ack_failure().await.err().unwrap();
        assert!(matches!(err, BoltError::Protocol(_)));
        // nothing was sent; the session is still usable
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_transactions_rejected_below_v3() {
        let (mut session, _peer) = ready_session(2).await;
        let err = session.begin(Begin::new()).await.err().unwrap();
        assert!(matches!(err, BoltError::Protocol(_)));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_run_not_permitted_before_authentication() {
        let (client, server) = duplex(1 << 16);
        let mut peer = Peer::new(server);

        let open = Session::open(client, &BoltVersion::ALL);
        let (session, _) = tokio::join!(open, peer.handshake(3));
        let mut session = session.unwrap();

        let err = session.run(Run::new("RETURN 1")).await.err().unwrap();
        assert!(matches!(err, BoltError::Protocol(_)));
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_pipelined_run_and_pull() {
        let (mut session, mut peer) = ready_session(3).await;

        let client = async {
            session
                .send(Request::Run(Run::new("RETURN 1 AS n")))
                .await
                .unwrap();
            session.send(Request::PullAll).await.unwrap();

            match session.fetch().await.unwrap() {
                Reply::Summary(s) => assert_eq!(fields_of(&s), vec!["n".to_string()]),
                other => panic!("expected RUN summary, got {:?}", other),
            }
            match session.fetch().await.unwrap() {
                Reply::Record(r) => assert_eq!(r.get(0), Some(&Value::Int(1))),
                other => panic!("expected record, got {:?}", other),
            }
            match session.fetch().await.unwrap() {
                Reply::Summary(_) => {}
                other => panic!("expected stream summary, got {:?}", other),
            }
            assert_eq!(session.state(), SessionState::Ready);
        };
        let serve = async {
            peer.expect_message().await;
            peer.expect_message().await;
            peer.send(&success(&[(
                "fields",
                Value::List(vec![Value::String("n".into())]),
            )]))
            .await;
            peer.send(&record(vec![Value::Int(1)])).await;
            peer.send(&success(&[])).await;
        };
        tokio::join!(client, serve);
    }

    #[tokio::test]
    async fn test_reset_resolves_outstanding_as_ignored() {
        let (mut session, mut peer) = ready_session(3).await;

        let client = async {
            session
                .send(Request::Run(Run::new("RETURN 1")))
                .await
                .unwrap();
            session.send(Request::PullAll).await.unwrap();

            session.reset().await.unwrap();
            assert_eq!(session.state(), SessionState::Ready);

            // the session is usable again
            let summary = session.run(Run::new("RETURN 2 AS m")).await.unwrap();
            assert_eq!(fields_of(&summary), vec!["m".to_string()]);
        };
        let serve = async {
            peer.expect_message().await; // RUN
            peer.expect_message().await; // PULL_ALL
            let reset = peer.expect_message().await;
            assert_eq!(reset[1], sig::RESET);
            peer.send(&IGNORED).await;
            peer.send(&IGNORED).await;
            peer.send(&success(&[])).await;

            peer.expect_message().await; // RUN
            peer.send(&success(&[(
                "fields",
                Value::List(vec![Value::String("m".into())]),
            )]))
            .await;
        };
        tokio::join!(client, serve);
    }

    #[tokio::test]
    async fn test_reset_in_flight_matches_first_plain_success() {
        let (mut session, mut peer) = ready_session(3).await;

        let client = async {
            session
                .send(Request::Run(Run::new("RETURN 1")))
                .await
                .unwrap();
            session.reset().await.unwrap();
            assert_eq!(session.state(), SessionState::Ready);
        };
        let serve = async {
            peer.expect_message().await; // RUN
            peer.expect_message().await; // RESET
            // the RUN completed before the server saw the RESET; its
            // SUCCESS matches the RESET per the precedence rule
            peer.send(&success(&[])).await;
        };
        tokio::join!(client, serve);
    }

    #[tokio::test]
    async fn test_transaction_commit_and_bookmark_carry() {
        let (mut session, mut peer) = ready_session(3).await;

        let client = async {
            session.begin(Begin::new()).await.unwrap();
            assert_eq!(session.state(), SessionState::TxReady);

            session.run(Run::new("CREATE (n)")).await.unwrap();
            assert_eq!(session.state(), SessionState::TxStreaming);

            let (_, summary) = session.pull_all().await.unwrap();
            assert_eq!(summary.bookmark(), Some("bm:1"));
            assert_eq!(session.state(), SessionState::TxReady);

            let bookmark = session.commit().await.unwrap();
            assert_eq!(bookmark.as_deref(), Some("bm:2"));
            assert_eq!(session.state(), SessionState::Ready);
            assert_eq!(session.last_bookmark(), Some("bm:2"));

            // the next BEGIN folds the bookmark in
            session.begin(Begin::new()).await.unwrap();
            session.rollback().await.unwrap();
            assert_eq!(session.state(), SessionState::Ready);
        };
        let serve = async {
            let begin = peer.expect_message().await;
            assert_eq!(begin[1], sig::BEGIN);
            peer.send(&success(&[])).await;

            peer.expect_message().await; // RUN
            peer.send(&success(&[("fields", Value::List(vec![]))])).await;
            peer.expect_message().await; // PULL_ALL
            peer.send(&success(&[("bookmark", Value::String("bm:1".into()))]))
                .await;

            let commit = peer.expect_message().await;
            assert_eq!(commit[1], sig::COMMIT);
            peer.send(&success(&[("bookmark", Value::String("bm:2".into()))]))
                .await;

            let begin = peer.expect_message().await;
            let mut decoder = PackStreamDecoder::new(&begin, BoltVersion::V3);
            let (signature, field_count) = decoder.read_struct_header().unwrap();
            assert_eq!(signature, sig::BEGIN);
            assert_eq!(field_count, 1);
            let metadata = decoder.decode().unwrap();
            let bookmarks = metadata.as_map().unwrap().get("bookmarks").unwrap();
            assert_eq!(
                bookmarks,
                &Value::List(vec![Value::String("bm:2".into())])
            );
            peer.send(&success(&[])).await;

            let rollback = peer.expect_message().await;
            assert_eq!(rollback[1], sig::ROLLBACK);
            peer.send(&success(&[])).await;
        };
        tokio::join!(client, serve);
    }

    #[tokio::test]
    async fn test_unsolicited_response_is_fatal() {
        let (mut session, mut peer) = ready_session(3).await;

        peer.send(&success(&[])).await;
        let err = session.fetch().await.err().unwrap();
        assert!(matches!(err, BoltError::Protocol(_)));
        assert_eq!(session.state(), SessionState::Defunct);

        // a defunct session refuses further work
        let err = session.run(Run::new("RETURN 1")).await.err().unwrap();
        assert!(matches!(err, BoltError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_io_timeout_marks_session_defunct() {
        let (client, server) = duplex(1 << 16);
        let mut peer = Peer::new(server);

        let config = SessionConfig::default().with_io_timeout(Duration::from_millis(50));
        let open = Session::open_with(client, &BoltVersion::ALL, config);
        let (session, _) = tokio::join!(open, peer.handshake(3));
        let mut session = session.unwrap();

        let auth = session.authenticate(Auth::none());
        let serve = async {
            // swallow the HELLO and never answer
            peer.expect_message().await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        };
        tokio::select! {
            result = auth => {
                let err = result.err().unwrap();
                assert!(matches!(err, BoltError::Timeout));
            }
            _ = serve => panic!("server script finished unexpectedly"),
        }
        assert_eq!(session.state(), SessionState::Defunct);
    }

    #[tokio::test]
    async fn test_close_sends_goodbye_at_v3() {
        let (session, mut peer) = ready_session(3).await;

        let client = session.close();
        let serve = async {
            let goodbye = peer.expect_message().await;
            assert_eq!(goodbye[1], sig::GOODBYE);
            // transport shuts down afterwards
            let n = peer.stream.read_buf(&mut peer.buf).await.unwrap();
            assert_eq!(n, 0);
        };
        let (closed, _) = tokio::join!(client, serve);
        closed.unwrap();
    }

    #[tokio::test]
    async fn test_close_is_silent_below_v3() {
        let (session, mut peer) = ready_session(1).await;

        let client = session.close();
        let serve = async {
            let n = peer.stream.read_buf(&mut peer.buf).await.unwrap();
            assert_eq!(n, 0, "nothing but the shutdown is expected");
        };
        let (closed, _) = tokio::join!(client, serve);
        closed.unwrap();
    }

    #[tokio::test]
    async fn test_encode_error_leaves_session_healthy() {
        let (mut session, mut peer) = ready_session(1).await;

        // temporal parameters do not exist at v1; nothing reaches the wire
        let run = Run::new("RETURN $d").with_param("d", Value::Date(Date::new(0)));
        let err = session.run(run).await.err().unwrap();
        assert!(matches!(err, BoltError::Encode(_)));
        assert!(err.is_recoverable());
        assert_eq!(session.state(), SessionState::Ready);

        // the session still works
        let client = async {
            session.run(Run::new("RETURN 1")).await.unwrap();
        };
        let serve = async {
            peer.expect_message().await;
            peer.send(&success(&[("fields", Value::List(vec![]))])).await;
        };
        tokio::join!(client, serve);
    }

    #[tokio::test]
    async fn test_discard_returns_to_ready() {
        let (mut session, mut peer) = ready_session(3).await;

        let client = async {
            session.run(Run::new("MATCH (n) RETURN n")).await.unwrap();
            let summary = session.discard().await.unwrap();
            assert_eq!(summary.result_type(), Some("r"));
            assert_eq!(session.state(), SessionState::Ready);
        };
        let serve = async {
            peer.expect_message().await; // RUN
            peer.send(&success(&[("fields", Value::List(vec![]))])).await;
            let discard = peer.expect_message().await;
            assert_eq!(discard[1], sig::DISCARD_ALL);
            peer.send(&success(&[("type", Value::String("r".into()))]))
                .await;
        };
        tokio::join!(client, serve);
    }

    #[tokio::test]
    async fn test_record_stream_incremental() {
        let (mut session, mut peer) = ready_session(3).await;

        let client = async {
            session.run(Run::new("UNWIND [1,2,3] AS n RETURN n")).await.unwrap();
            let mut stream = session.pull().await.unwrap();
            let mut seen = Vec::new();
            while let Some(record) = stream.next().await.unwrap() {
                seen.push(record.into_values().remove(0));
            }
            assert_eq!(seen, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
            assert!(stream.summary().is_some());
            assert_eq!(session.state(), SessionState::Ready);
        };
        let serve = async {
            peer.expect_message().await; // RUN
            peer.send(&success(&[(
                "fields",
                Value::List(vec![Value::String("n".into())]),
            )]))
            .await;
            peer.expect_message().await; // PULL_ALL
            for i in 1..=3 {
                peer.send(&record(vec![Value::Int(i)])).await;
            }
            peer.send(&success(&[])).await;
        };
        tokio::join!(client, serve);
    }
}
