//! Services layer - Business logic
//!
//! Every operation takes the calling identity explicitly (`&Caller`) and
//! consults the authorization policy before touching a repository. Services
//! are transport-agnostic; the HTTP layer only resolves the session cookie
//! into a `Caller`.

pub mod accreditation;
pub mod application;
pub mod email;
pub mod error;
pub mod mobility_program;
pub mod password;
pub mod password_reset;
pub mod policy;
pub mod program;
pub mod publication;
pub mod rate_limiter;
pub mod user;
pub mod validation;

pub use accreditation::AccreditationService;
pub use application::ApplicationService;
pub use email::{create_mailer, EmailService, LogMailer, Mailer, OutgoingEmail, SmtpMailer};
pub use error::{FieldErrors, ServiceError};
pub use mobility_program::MobilityProgramService;
pub use password::{hash_password, verify_password};
pub use password_reset::{
    generate_token, hash_token, PasswordResetService, ResetConfirmInput, ResetOptions,
    ResetRequestInput,
};
pub use policy::{authorize, AccessDenied, Action, Caller, RecordOwnership, Resource, Scope};
pub use program::ProgramService;
pub use publication::PublicationService;
pub use rate_limiter::{AttemptLimiter, RateLimiters};
pub use user::{
    ChangePasswordInput, LoginInput, RegisterInput, UniversityRegisterInput, UserService,
};
