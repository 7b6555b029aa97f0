#![allow(unused_assignments)] // thiserror/miette proc macros trigger false positives

pub mod api;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod inventory;
pub mod record;
pub mod server;
pub mod tool;
