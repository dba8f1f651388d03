// Library root
// -----------
// This crate exposes the pieces behind the `cloudrive` binary so the login
// handshake can be driven and tested without a terminal.
//
// Module responsibilities:
// - `oauth`: the loopback OAuth2 authorization-code login (URL building,
//   redirect listener, browser launch, token exchange, orchestration).
// - `store`: client credentials and token set on disk.
// - `config`: provider endpoints and fixed login constants.
// - `error`: the login error taxonomy and user-facing hints.
// - `api`: authenticated calls to the storage API.
// - `ui` / `cli`: terminal prompts, output and argument parsing.
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod oauth;
pub mod store;
pub mod ui;
