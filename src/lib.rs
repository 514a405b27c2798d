//! QuickReply Library
//!
//! Core modules for the QuickReply clipboard reply assistant: copy a
//! selection, have a model answer it, click to paste the answer.

pub mod backend;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod history;
pub mod input;
pub mod listener;
pub mod media;
pub mod method;
pub mod notify;
pub mod prompts;
pub mod remote;
pub mod resolver;
pub mod session;
pub mod worker;
