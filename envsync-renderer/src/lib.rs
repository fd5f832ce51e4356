//! # envsync-renderer
//!
//! Tera-based rendering of the downstream environment config (`puppet.conf`):
//! the base config followed by one section per live environment.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use envsync_core::LocalName;
//! use envsync_renderer::Renderer;
//!
//! fn render(envs: &[LocalName]) {
//!     if let Ok(renderer) = Renderer::new() {
//!         if let Ok(text) = renderer.render(Some("[main]\n"), envs) {
//!             println!("{text}");
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::ConfigContext;
pub use engine::Renderer;
pub use error::RenderError;
