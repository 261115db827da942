//! CLI Commands

pub mod account;
pub mod download;
pub mod share;
pub mod upload;
