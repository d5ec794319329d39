//! Request extractors.
//!
//! - [`identity::ClientIdentity`] -- The trusted client identity of a request.
//! - [`identity::LastEventId`] -- The optional `Last-Event-ID` of a reconnect.

pub mod identity;
