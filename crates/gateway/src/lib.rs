//! Market Router library.
//!
//! Routes natural-language requests to one of the market-data API's
//! operations: the query is embedded, matched against an index of operation
//! descriptions, filtered by the caller's subscription plan, handed to a
//! function-calling language model, and the chosen call is validated and
//! executed.
//!
//! The same pipeline backs the HTTP server (`market-router` binary) and the
//! `mr-cli route` command. A second, smaller pipeline in [`docs`] answers
//! questions about the API from its published documentation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod credentials;
pub mod db;
pub mod dispatch;
pub mod docs;
pub mod error;
pub mod openai;
pub mod registry;
pub mod router;
pub mod routes;
pub mod state;
pub mod tool_selection;
