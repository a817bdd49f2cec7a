#![doc = include_str!("../README.md")]

mod error;
mod prelude;

pub mod text;

pub use error::{Error, Result};
