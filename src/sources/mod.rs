//! Configuration source layer: the backing document and the environment overlay.

mod env;
mod file;

pub use env::EnvOverlay;
pub use file::{DocumentFormat, FileSource};
