//! Deskpilot: a chat backend that lets a vision-language model drive a remote desktop.
//!
//! The HTTP layer ([`api`]) accepts a conversation and a sandbox identifier, the
//! [`dispatch`] loop streams the model's answer, executing every action object it
//! contains against the sandbox through [`action`], and the resulting events are
//! streamed back to the client.

pub mod action;
pub mod api;
pub mod config;
pub mod dispatch;
pub mod inference;
pub mod sandbox;

#[cfg(test)]
mod testing;
