//! A client driver for a document-oriented database cluster: sessions, a node-selecting request
//! executor, and a topology that keeps itself current.
//!
//! ```no_run
//! # async fn run() -> ravendb::Result<()> {
//! use ravendb::{Conventions, Store, TransportOptions};
//!
//! let store = Store::new(
//!     &["http://localhost:8080"],
//!     "Northwind",
//!     Conventions::default(),
//!     TransportOptions::default(),
//!     None,
//!     None,
//! )?;
//!
//! let mut session = store.open_session().await;
//! if let Some(doc) = session.load("orders/1").await? {
//!     println!("{doc}");
//! }
//! session.save_changes().await?;
//! # Ok(())
//! # }
//! ```

mod command;
mod connection;
mod conventions;
mod error;
mod event;
mod executor;
mod node;
mod registry;
mod selector;
mod session;
mod store;
mod topology;
mod trace;

pub use crate::{
    command::{Batch, BatchCommandItem, BatchResult, BatchResultItem, Command, GetDocuments},
    conventions::{Conventions, RequestOptions},
    error::{Error, ErrorKind, Result},
    event::{
        request::{
            RequestEvent, RequestEventHandler, RequestFailedEvent, RequestStartedEvent,
            RequestSucceededEvent,
        },
        topology::{RefreshReason, TopologyEvent, TopologyEventHandler},
    },
    node::{Health, Scheme, TransportOptions},
    session::{DocumentMetadata, Session, SessionDocument},
    store::Store,
};
