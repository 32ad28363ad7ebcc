//! Chat client for a remote knowledge-query service, built around a strictly linted session engine.

// Interdiction stricte de pratiques dangereuses ou non idiomatiques
#![deny(unsafe_code)] // Le code unsafe est interdit
#![deny(missing_docs)] // Toute fonction, struct, enum ou module public doit être documenté
#![deny(non_camel_case_types)]
#![deny(unused_must_use)] // Oblige à gérer explicitement les Result et Option
#![deny(non_snake_case)]
#![deny(non_upper_case_globals)]
#![deny(nonstandard_style)]
#![forbid(unsafe_op_in_unsafe_fn)]

// Clippy pour stricte discipline
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)] // Interdit unwrap()
#![deny(clippy::expect_used)] // Interdit expect()
#![deny(clippy::panic)] // Interdit panic!()
#![deny(clippy::print_stdout)] // Interdit println!() en production
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_in_result)]
#![deny(clippy::redundant_clone)]
#![deny(clippy::shadow_unrelated)]
#![deny(clippy::too_many_arguments)]
#![deny(clippy::cognitive_complexity)]
#![deny(overflowing_literals)]
// Les tests utilisent unwrap/panic librement
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

/// Chat session engine and its collaborators (encoder, HTTP clients, token store).
pub mod chat;
/// Entry helpers to start the terminal chat client.
pub mod start_chat_client;
/// Line-oriented terminal view driving the chat engine.
pub mod terminal;
