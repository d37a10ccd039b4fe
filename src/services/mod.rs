//! Services layer for POLLX
//!
//! Request-level operations over the stores. Route handlers stay thin and
//! delegate here; votes go through the ledger instead.
//!
//! ## Services
//!
//! - **Accounts**: signup, login streaks, profiles and mention search
//! - **Polls**: creation, moderation, owner edits and cascading deletes
//! - **Comments**: threaded comments and reactions
//! - **Notifications**: the recipient's inbox
//! - **Elections**: candidacies, leadership profiles and elections

pub mod accounts;
pub mod comments;
pub mod elections;
pub mod notifications;
pub mod polls;

pub use accounts::{next_streak, AccountService, ProfileUpdate, Session, SettingsPatch};
pub use comments::CommentService;
pub use elections::{ApplyInput, CreateElectionInput, ElectionService, JoinInput};
pub use notifications::NotificationService;
pub use polls::{CreatePollInput, PollEdit, PollService};
