//! Bot module: the dialog state machine
//!
//! This module is split into several submodules:
//! - `dialogue_manager`: the router, session checkpointing and error recovery
//! - `message_handler`: typed text, commands and photos
//! - `callback_handler`: inline keyboard presses
//! - `ui_builder`: keyboards and message bodies

pub mod callback_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;

pub use dialogue_manager::DialogRouter;
pub use ui_builder::{Button, Keyboard};
