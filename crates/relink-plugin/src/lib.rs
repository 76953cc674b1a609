//! Relink Plugin Library
//!
//! Host-facing orchestration: conversion commands, rename handling,
//! automatic conversion of freshly typed links, and the host boundary
//! traits everything runs behind.

pub mod api;
pub mod commands;
pub mod convert;
pub mod extract;
pub mod host;
pub mod index;
pub mod memory;
pub mod session;
pub mod vfs;


pub use convert::{
    convert_file, convert_folder, convert_vault, fix_proposed_change, handle_document_changed,
    update_links_for_rename, ConvertError, ConvertOrigin, ConvertOutcome, ConvertReport,
};
pub use host::{HostError, LinkIndex, NoticeSink, SettingsStore, VaultFiles};
pub use session::Session;
