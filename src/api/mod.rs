pub mod chat_server;
pub mod completion_client;
pub mod config_manager;
pub mod data_models;
pub mod error_handler;
pub mod history_store;
pub mod prompt_builder;
pub mod reply_engine;
pub mod response_formatter;
pub mod typewriter;
