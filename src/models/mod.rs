//! Data models
//!
//! Database entities of the portal (users, sessions, reset tokens and the
//! catalogue records) together with their API input types.

mod accreditation;
mod application;
mod mobility_program;
mod password_reset;
mod program;
mod publication;
mod session;
mod user;

pub use accreditation::{
    Accreditation, AccreditationDetail, CreateAccreditationInput, UpdateAccreditationInput,
};
pub use application::{
    Application, ApplicationStatus, CreateApplicationInput, ReplaceApplicationInput,
    UpdateApplicationInput,
};
pub use mobility_program::{
    CreateMobilityProgramInput, MobilityProgram, UpdateMobilityProgramInput,
};
pub use password_reset::{PasswordResetToken, TokenState};
pub use program::{CreateProgramInput, Program, ProgramDetail, UpdateProgramInput};
pub use publication::{
    AuthorSummary, CreatePublicationInput, Publication, PublicationRecord, UpdatePublicationInput,
};
pub use session::Session;
pub use user::{normalize_email, Role, UpdateUserInput, User};
