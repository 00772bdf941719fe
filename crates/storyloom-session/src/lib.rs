//! # storyloom-session
//!
//! Story session management for Storyloom.
//!
//! This crate provides:
//! - [`SessionManager`]: the single-flight story state machine
//! - [`HistoryStore`]: the role-alternating transcript with rewind and
//!   regenerate support
//! - System prompt assembly from the narrator instruction and the player
//!   character
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use storyloom_core::{CharacterProfile, Config};
//! use storyloom_session::SessionManager;
//!
//! let config = Config::load_validated()?;
//! let manager = SessionManager::from_config(&config);
//!
//! let opening = manager.start_session(CharacterProfile::default()).await?;
//! let next = manager.send_turn(&opening.options[0]).await?;
//!
//! // Branch: go back to the opening scene and choose differently
//! manager.rewind_to(0).await?;
//! ```

pub mod history;
pub mod manager;
pub mod prompt;

pub use history::{HistoryError, HistoryStore, SceneMarker};
pub use manager::{SessionManager, SessionManagerBuilder, SessionState};
pub use prompt::build_system_prompt;
