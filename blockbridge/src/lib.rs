pub mod app;
pub mod blocks;
pub mod cli;
pub mod decompiler;
pub mod shape;
pub mod syntax;
pub mod types;
pub mod utils;
pub mod verifier;

#[cfg(test)]
mod tests;

pub use decompiler::{Decompiled, Decompiler};
