//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod accreditation;
pub mod application;
pub mod mobility_program;
pub mod password_reset;
pub mod program;
pub mod publication;
pub mod session;
pub mod user;

pub use accreditation::{AccreditationRepository, SqlxAccreditationRepository};
pub use application::{ApplicationFilter, ApplicationRepository, SqlxApplicationRepository};
pub use mobility_program::{MobilityProgramRepository, SqlxMobilityProgramRepository};
pub use password_reset::{PasswordResetRepository, SqlxPasswordResetRepository};
pub use program::{ProgramRepository, SqlxProgramRepository};
pub use publication::{PublicationRepository, SqlxPublicationRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Whether a repository error was caused by a UNIQUE constraint
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}
