//! # Telefit Telegram Bot
//!
//! A Telegram bot that estimates the calories in food photos, lets the user
//! correct the result, and logs saved foods and workouts to a daily progress
//! record.

pub mod action_codec;
pub mod adapters;
pub mod bot;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod ledger;
pub mod localization;
pub mod records;
pub mod session_store;
