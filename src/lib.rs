//! Portrait studio: one uploaded photo in, six AI-stylized portraits out.
//!
//! The page served by [`web`] collects the fal key and the photo, the
//! [`studio::PortraitStudio`] action stages and uploads it, and the
//! [`orchestrator::GenerationOrchestrator`] fans out one image-to-image
//! request per entry of [`styles::STYLE_CATALOG`].

pub mod config;
pub mod credential;
pub mod errors;
pub mod orchestrator;
pub mod providers;
pub mod staging;
pub mod studio;
pub mod styles;
pub mod util;
pub mod web;
