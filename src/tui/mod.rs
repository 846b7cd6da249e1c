//! TUI module: Terminal User Interface using Ratatui.
//!
//! Provides a medical-themed interface for:
//! - Startup progress while models are prepared
//! - Dashboard with model status and recent assessments
//! - Patient data input
//! - Risk results and additional comparison charts

mod app;
mod styles;
mod ui;
mod worker;

pub use app::App;
pub use styles::MedicalTheme;
pub use worker::{StartupProgress, StartupWorker, StartupWorkerHandle};
