//! Authenticated request gateway for the storefront API.
//!
//! Every outbound request carries the current access token. When the API
//! rejects it with 401, the request waits for a single shared refresh of the
//! token and is replayed once; concurrent failures never cause more than one
//! refresh call. A failed refresh terminates the session.
//!
//! # Components
//!
//! - [`store`]: token store, the single source of truth for the session
//! - [`storage`]: key/value persistence under the store
//! - [`dispatcher`]: bearer injection and one-shot 401 recovery
//! - [`coordinator`]: single-flight refresh episodes
//! - [`refresh`]: refresh endpoint transport and rotation policy
//! - [`terminator`]: session teardown, hooks and lifecycle events
//! - [`auth`]: login, registration, logout, profile

pub mod auth;
pub mod client;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod refresh;
pub mod session;
pub mod storage;
pub mod store;
pub mod terminator;

pub use auth::{AuthApi, RegisterRequest};
pub use client::{Gateway, GatewayBuilder};
pub use coordinator::RefreshCoordinator;
pub use dispatcher::{ApiResponse, Dispatcher, RequestDescriptor};
pub use error::{GatewayError, Result};
pub use refresh::{HttpRefreshClient, RefreshClient, RefreshPolicy};
pub use session::{Session, TokenPair};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use store::TokenStore;
pub use terminator::{
    HookError, SessionEvent, SessionTerminator, TerminationHook, TerminationReason,
};

// Re-exported so callers can build descriptors without depending on reqwest.
pub use reqwest::Method;
