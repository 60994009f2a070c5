//! AirEstate client auth core.
//!
//! ARCHITECTURE
//! ============
//! Everything hard — token signing, magic-link validation, row-level
//! access control — happens inside the hosted provider. This crate is the
//! client-side core that talks to it:
//!
//! - [`session::SessionStore`]: one consistent, reactive view of "who is
//!   signed in", shared by any number of consumers.
//! - [`flow::MagicLinkFlow`]: the per-form request cycle for one-time
//!   sign-in links.
//! - [`recovery`]: classification of redirect errors (expired link, access
//!   denied, everything else) and the resend path.
//! - [`todos`]: CRUD against the row-level-secured todo store.
//!
//! The provider itself sits behind the [`identity::IdentityService`] trait
//! so tests run against in-process doubles.

pub mod config;
pub mod flow;
pub mod identity;
pub mod recovery;
pub mod session;
pub mod todos;

pub use config::{ConfigError, ProviderConfig};
pub use flow::{FlowPhase, FlowState, MagicLinkFlow};
pub use identity::http::HttpIdentityService;
pub use identity::{AuthEvent, AuthEventKind, Identity, IdentityService, ProviderError, Session};
pub use recovery::{ErrorCategory, ErrorContext, ErrorInfo, RecoveryPage, classify};
pub use session::{SessionState, SessionStore, SessionSubscription};
pub use todos::{HttpTodoStore, Todo, TodoError, TodoStore};
