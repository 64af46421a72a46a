//! Core types and scheduling logic for Datebook.
//!
//! This crate is free of HTTP and database dependencies. Storage is reached
//! through [`store::CalendarStore`], outbound messages through
//! [`notify::Notifier`], and time through [`clock::Clock`].

pub mod budget;
pub mod clock;
pub mod conflict;
pub mod diary;
pub mod error;
pub mod event;
pub mod notify;
pub mod participant;
pub mod reminder;
pub mod service;
pub mod store;
pub mod timezone;
pub mod user;

pub use error::{Error, Result};
