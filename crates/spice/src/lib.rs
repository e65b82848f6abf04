//! Spice - build tool for the Spice programming language
//!
//! A command-line tool that drives the `spicec` compiler and the system
//! linker to build, run, install and uninstall Spice programs.

pub mod cli;
pub mod commands;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod env;
pub mod linker;
pub mod objects;
pub mod paths;
pub mod pipeline;
pub mod platform;
pub mod process;
pub mod request;
pub mod toolchain;
