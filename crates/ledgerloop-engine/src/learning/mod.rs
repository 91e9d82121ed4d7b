pub mod aggregate;
pub mod config;
pub mod context;
#[cfg(feature = "http-llm")]
pub mod http_llm;
pub mod keywords;
pub mod llm;
pub mod matcher;
pub mod notify;
pub mod policy;
pub mod seed;
pub mod tracker;
pub mod types;
pub mod validator;
