//! # ArcaDB Bolt Core
//!
//! The core Bolt protocol layer of the ArcaDB graph database client:
//! PackStream serialization, chunked message framing, version negotiation
//! and the session state machine.
//!
//! This crate deliberately stops at the protocol boundary. It consumes any
//! ordered, reliable byte stream (`AsyncRead + AsyncWrite`) and exposes
//! typed request submission and typed response streams; sockets, pooling,
//! retry orchestration and the user-facing query API live in the driver
//! layer built on top of it.
//!
//! ## Protocol Versions
//!
//! Versions 1, 2 and 3 are supported and negotiated per connection:
//!
//! - **v1** - INIT authentication, ACK_FAILURE recovery
//! - **v2** - adds temporal and spatial value types
//! - **v3** - HELLO/GOODBYE, explicit transactions, RUN metadata
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use arcadb_bolt::{Auth, BoltVersion, Run, Session};
//! use tokio::net::TcpStream;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = TcpStream::connect("localhost:7687").await?;
//!     let mut session = Session::open(transport, &BoltVersion::ALL).await?;
//!
//!     session.authenticate(Auth::basic("arcadb", "password")).await?;
//!
//!     let summary = session.run(Run::new("RETURN 1 AS n")).await?;
//!     println!("columns: {:?}", summary.fields());
//!
//!     let (records, _summary) = session.pull_all().await?;
//!     for record in records {
//!         println!("{:?}", record.values);
//!     }
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Pipelining
//!
//! Several requests may be written before any response is read; replies
//! come back strictly in request order:
//!
//! ```rust,no_run
//! # use arcadb_bolt::{Request, Run, Session};
//! # async fn example(
//! #     session: &mut Session<tokio::net::TcpStream>,
//! # ) -> Result<(), arcadb_bolt::BoltError> {
//! session.send(Request::Run(Run::new("RETURN 1"))).await?;
//! session.send(Request::PullAll).await?;
//! let run_summary = session.fetch().await?;
//! let first_reply = session.fetch().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Recovery
//!
//! A server `FAILURE` moves the session into a failed state in which every
//! further request is answered with `IGNORED`. [`Session::reset`] (any
//! version) or [`Session::ack_failure`] (before version 3) restores it.
//!
//! ## Modules
//!
//! - [`packstream`] - value model and binary serialization
//! - [`message`] - request and response message types
//! - [`chunk`] - chunked framing codec
//! - [`handshake`] - version negotiation
//! - [`session`] - the session state machine
//! - [`version`] - version dispatch
//! - [`error`] - the error taxonomy

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod chunk;
pub mod error;
pub mod handshake;
pub mod message;
pub mod packstream;
pub mod session;
pub mod version;

// Re-exports for convenience
pub use error::{BoltError, BoltResult, HandshakeError};
pub use message::{AccessMode, Auth, Begin, Failure, Init, Record, Request, Response, Run, Success};
pub use packstream::{
    Date, Duration, LocalDateTime, LocalTime, Node, OffsetDateTime, OffsetTime, Path, Point2D,
    Point3D, Relationship, Struct, UnboundRelationship, Value, ValueMap, ZonedDateTime,
};
pub use session::{RecordStream, Reply, Session, SessionConfig, SessionState};
pub use version::BoltVersion;
