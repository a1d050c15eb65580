#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod auth;
pub mod client;
pub mod config;
pub(crate) mod control;
pub mod error;
pub mod message;
pub mod types;
pub mod ws;

pub use client::Client;
pub use message::Message;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;
