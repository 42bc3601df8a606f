pub mod confirmation;
pub mod login;
pub mod options;
pub mod registration;

pub use confirmation::{ConfirmationView, Redirect};
pub use login::{LoginForm, LoginResult, Session, UserProfile};
pub use options::{IdType, IndianState, Profession};
pub use registration::{
    ErrorMap, Field, NextOutcome, PendingSubmission, RegistrationDraft, RegistrationSuccess,
    RegistrationWizard, SubmitOutcome, SubmitStart, UploadOutcome, WizardStep, validate_step,
};
