//! Format backends, one module per underlying engine.

pub mod ffmpeg;
pub mod image;
pub mod office;
pub mod slides;
pub mod table;
