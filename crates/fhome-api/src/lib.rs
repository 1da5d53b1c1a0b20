// fhome-api: Async Rust client for the F&Home cloud WebSocket protocol
//
// Login runs on a short-lived setup connection; configuration fetches and
// device actions run on a separate resource connection. Every inbound frame
// is broadcast to all waiting callers, which filter by action name and
// request token.

pub mod auth;
pub mod client;
pub mod codec;
pub mod connection;
mod correlator;
pub mod error;
pub mod layout;
pub mod messages;
pub mod models;
mod router;
pub mod token;

pub use auth::{Credentials, SessionState, resource_password_hash};
pub use client::Client;
pub use connection::{ConnectConfig, Connection, ConnectionRole, Connector, FrameListener, Transport};
pub use correlator::Expectation;
pub use error::Error;
pub use layout::{Cell, HomeLayout, Icon, Panel};
pub use messages::Frame;
pub use token::TokenGenerator;
