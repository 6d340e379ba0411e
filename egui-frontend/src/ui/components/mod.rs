//! # UI Components Module
//!
//! ## Module Organization:
//! - `header` - Title, greeting / login button and the error banner
//! - `calendar_renderer` - The day × slot reservation grid
//! - `modals` - Login prompt and blocking notices
//! - `theme` - Shared colors

pub mod calendar_renderer;
pub mod header;
pub mod modals;
pub mod theme;
