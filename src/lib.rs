#![forbid(unsafe_code)]

pub mod archive;
pub mod cli;
pub mod derivatives;
pub mod error;
pub mod formats;
pub mod links;
pub mod logging;
pub mod signals;
