//! Wire protocol for sessync.
//!
//! This crate defines what the authentication backend and the session
//! core exchange:
//!
//! - **Types** ([`UserSession`], [`SessionInfo`], [`SessionTokens`],
//!   [`LoginRequest`], [`LoginResponse`]): the records that travel
//!   between the backend and the client.
//! - **Envelope** ([`ApiEnvelope`]): the backend wraps most bodies as
//!   `{ "success": .., "message": .., "data": .. }`; decoders accept both
//!   the wrapped and the bare form.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those records are
//!   turned into and out of bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (HTTP bodies) → Protocol (UserSession, ..) → Session (cache state)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, decode_api};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ApiEnvelope, LoginData, LoginRequest, LoginResponse, Role, SessionInfo,
    SessionTokens, UserId, UserSession,
};
