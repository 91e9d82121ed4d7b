pub mod classify;
pub mod common;
pub mod corrections;
pub mod notifications;
pub mod patterns;
pub mod settings;
pub mod suggestions;
