//! # Panelgate (panel authentication core)
//!
//! `panelgate` authenticates panel operators and guards the panel's routes.
//!
//! ## Credentials
//!
//! Passwords are stored as self-describing Argon2id credentials
//! (`$argon2id$<hex salt>$<hex key>`). Accounts created before the switch
//! still carry an unprefixed SHA-224 digest; those are verified once with
//! the legacy scheme and immediately rewritten as Argon2id credentials.
//!
//! ## Sessions
//!
//! A successful login yields a stateless HS256 token valid for 24 hours.
//! Nothing about the session is kept server-side; the signing secret lives
//! in the config store and is read on every call.
//!
//! ## Access gate
//!
//! Every panel route is gated on the request host and path prefix. The
//! policy is read per request and the gate fails closed: an unset or
//! partially set policy rejects the request with `500` instead of letting
//! it through.

pub mod auth;
pub mod cli;
pub mod panelgate;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
