//! Imob86 listing export to Meta/Google home listing catalog converter.
//!
//! See [`feed`] for the conversion pipeline and [`api`] for the HTTP surface.

pub mod api;
pub mod config;
pub mod feed;
pub mod util;
