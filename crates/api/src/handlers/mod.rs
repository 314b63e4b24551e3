pub mod pipeline;
pub mod webhook;
