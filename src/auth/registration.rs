//! The four-step registration wizard: draft state, per-step validation and
//! submission.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::auth::options::{IdType, IndianState, Profession};
use crate::config::Configuration;
use crate::errors::{Error, Result};
use crate::notification::Notification;
use crate::store::{self, KeyValueStore, REGISTRATION_SUCCESS_KEY};
use crate::uploads::{PendingFile, UploadSession, UploadedFile};

pub const USER_ID_PREFIX: &str = "ACT";
pub const MAX_GOVT_ID_DOCUMENTS: usize = 2;
pub const MAX_CERTIFICATIONS: usize = 3;
pub const MIN_AGE: i64 = 18;
pub const MIN_USERNAME_LEN: usize = 5;
pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{10}$").unwrap());
static PINCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{6}$").unwrap());
static AADHAAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{12}$").unwrap());
static PAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").unwrap());

/// Every input the registration and login forms validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    FullName,
    Email,
    Phone,
    Age,
    Username,
    Password,
    ConfirmPassword,
    Profession,
    Experience,
    Certifications,
    Locality,
    Pincode,
    Block,
    District,
    State,
    IdType,
    IdNumber,
    GovtIdDocuments,
    AgreeTerms,
    UsernameOrEmail,
}

/// Field name to inline message. Empty means the step is valid.
pub type ErrorMap = BTreeMap<Field, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDraft {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub age: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,

    pub profession: Option<Profession>,
    pub experience: String,
    certifications: Vec<UploadedFile>,

    pub locality: String,
    pub pincode: String,
    pub block: String,
    pub district: String,
    pub state: Option<IndianState>,

    pub id_type: Option<IdType>,
    pub id_number: String,
    govt_id_documents: Vec<UploadedFile>,
    pub agree_terms: bool,
}

impl RegistrationDraft {
    pub fn certifications(&self) -> &[UploadedFile] {
        &self.certifications
    }

    pub fn govt_id_documents(&self) -> &[UploadedFile] {
        &self.govt_id_documents
    }

    /// Apply raw form input to `field`. Select fields take their option label
    /// (an empty value clears the selection); `agreeTerms` takes `true`/`false`.
    pub fn set_field(&mut self, field: Field, value: &str) -> Result<()> {
        let text = value.to_string();
        match field {
            Field::FullName => self.full_name = text,
            Field::Email => self.email = text,
            Field::Phone => self.phone = text,
            Field::Age => self.age = text,
            Field::Username => self.username = text,
            Field::Password => self.password = text,
            Field::ConfirmPassword => self.confirm_password = text,
            Field::Profession => self.profession = parse_selection(value)?,
            Field::Experience => self.experience = text,
            Field::Locality => self.locality = text,
            Field::Pincode => self.pincode = text,
            Field::Block => self.block = text,
            Field::District => self.district = text,
            Field::State => self.state = parse_selection(value)?,
            Field::IdType => self.id_type = parse_selection(value)?,
            Field::IdNumber => self.id_number = text,
            Field::AgreeTerms => {
                self.agree_terms = value.trim().parse().map_err(|_| Error::UnknownOption {
                    kind: "checkbox value",
                    value: text,
                })?
            }
            Field::Certifications | Field::GovtIdDocuments | Field::UsernameOrEmail => {
                return Err(format!("{field:?} cannot be set from text input").into());
            }
        }
        Ok(())
    }
}

fn parse_selection<T>(value: &str) -> Result<Option<T>>
where
    T: std::str::FromStr<Err = Error>,
{
    if value.trim().is_empty() {
        Ok(None)
    } else {
        value.parse().map(Some)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WizardStep {
    #[default]
    Personal,
    Professional,
    Location,
    Verification,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [
        WizardStep::Personal,
        WizardStep::Professional,
        WizardStep::Location,
        WizardStep::Verification,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    pub fn prev(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    pub fn is_final(self) -> bool {
        self == WizardStep::Verification
    }

    pub fn title(self) -> &'static str {
        match self {
            WizardStep::Personal => "Personal Information",
            WizardStep::Professional => "Professional Information",
            WizardStep::Location => "Location Details",
            WizardStep::Verification => "Verification",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            WizardStep::Personal => "Basic details and account setup",
            WizardStep::Professional => "Your occupation and expertise",
            WizardStep::Location => "Where you are located",
            WizardStep::Verification => "ID verification and final steps",
        }
    }

    fn completion_message(self) -> Option<&'static str> {
        match self {
            WizardStep::Personal => Some("Personal details completed! +10 XP"),
            WizardStep::Professional => Some("Professional info added! +15 XP"),
            WizardStep::Location => Some("Location details set! +20 XP"),
            WizardStep::Verification => None,
        }
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Whether `raw` reads as a number at all: decimal or exponent notation,
/// `0x`/`0o`/`0b` literals, or `Infinity`.
fn is_numeric(raw: &str) -> bool {
    let s = raw.trim();
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    if unsigned == "Infinity" {
        return true;
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = s.strip_prefix(prefix) {
            return !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix));
        }
    }
    // f64 parsing also takes "inf" and "nan", which are not numbers here.
    unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') && s.parse::<f64>().is_ok()
}

/// Leading integer of `raw`: optional sign, then decimal digits (or hex after
/// `0x`), stopping at the first other character. `None` when no digit leads.
fn leading_integer(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (radix, digits) = match rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        Some(hex) => (16, hex),
        None => (10, rest),
    };
    let run: String = digits.chars().take_while(|c| c.is_digit(radix)).collect();
    if run.is_empty() {
        return None;
    }
    let value = run.chars().fold(0i64, |acc, c| {
        acc.saturating_mul(i64::from(radix))
            .saturating_add(i64::from(c.to_digit(radix).unwrap_or(0)))
    });
    Some(if negative { -value } else { value })
}

/// Validate the fields that belong to `step`. Fields of other steps never
/// contribute to the result.
pub fn validate_step(step: WizardStep, draft: &RegistrationDraft) -> ErrorMap {
    let mut errors = ErrorMap::new();
    match step {
        WizardStep::Personal => validate_personal(draft, &mut errors),
        WizardStep::Professional => {
            if draft.profession.is_none() {
                errors.insert(Field::Profession, "Profession is required".into());
            }
        }
        WizardStep::Location => validate_location(draft, &mut errors),
        WizardStep::Verification => validate_verification(draft, &mut errors),
    }
    errors
}

fn validate_personal(draft: &RegistrationDraft, errors: &mut ErrorMap) {
    if is_blank(&draft.full_name) {
        errors.insert(Field::FullName, "Full name is required".into());
    }
    if is_blank(&draft.email) {
        errors.insert(Field::Email, "Email is required".into());
    } else if !EMAIL_RE.is_match(&draft.email) {
        errors.insert(Field::Email, "Email is invalid".into());
    }
    if is_blank(&draft.phone) {
        errors.insert(Field::Phone, "Phone number is required".into());
    } else if !PHONE_RE.is_match(&draft.phone) {
        errors.insert(Field::Phone, "Phone number must be 10 digits".into());
    }
    if is_blank(&draft.age) {
        errors.insert(Field::Age, "Age is required".into());
    } else if !is_numeric(&draft.age)
        || leading_integer(&draft.age).is_some_and(|age| age < MIN_AGE)
    {
        errors.insert(Field::Age, "Age must be at least 18".into());
    }
    if is_blank(&draft.username) {
        errors.insert(Field::Username, "Username is required".into());
    } else if draft.username.chars().count() < MIN_USERNAME_LEN {
        errors.insert(Field::Username, "Username must be at least 5 characters".into());
    }
    if draft.password.is_empty() {
        errors.insert(Field::Password, "Password is required".into());
    } else if draft.password.chars().count() < MIN_PASSWORD_LEN {
        errors.insert(Field::Password, "Password must be at least 8 characters".into());
    }
    if draft.password != draft.confirm_password {
        errors.insert(Field::ConfirmPassword, "Passwords do not match".into());
    }
}

fn validate_location(draft: &RegistrationDraft, errors: &mut ErrorMap) {
    if is_blank(&draft.locality) {
        errors.insert(Field::Locality, "Locality/Village is required".into());
    }
    if is_blank(&draft.pincode) {
        errors.insert(Field::Pincode, "PIN code is required".into());
    } else if !PINCODE_RE.is_match(&draft.pincode) {
        errors.insert(Field::Pincode, "PIN code must be 6 digits".into());
    }
    if is_blank(&draft.district) {
        errors.insert(Field::District, "District is required".into());
    }
    if draft.state.is_none() {
        errors.insert(Field::State, "State is required".into());
    }
}

fn validate_verification(draft: &RegistrationDraft, errors: &mut ErrorMap) {
    if draft.id_type.is_none() {
        errors.insert(Field::IdType, "ID type is required".into());
    }
    if is_blank(&draft.id_number) {
        errors.insert(Field::IdNumber, "ID number is required".into());
    } else {
        let well_formed = match draft.id_type {
            Some(IdType::Aadhaar) => AADHAAR_RE.is_match(&draft.id_number),
            Some(IdType::Pan) => PAN_RE.is_match(&draft.id_number),
            _ => true,
        };
        if !well_formed {
            errors.insert(Field::IdNumber, "Invalid ID number format".into());
        }
    }
    if draft.govt_id_documents.is_empty() {
        errors.insert(
            Field::GovtIdDocuments,
            "Government ID document is required".into(),
        );
    }
    if !draft.agree_terms {
        errors.insert(
            Field::AgreeTerms,
            "You must agree to the terms and conditions".into(),
        );
    }
}

/// Client-side user id: prefix, last six digits of the epoch millis, four
/// random digits. Two signups in the same millisecond collide with
/// probability 1/10000.
pub fn generate_user_id() -> String {
    let millis = Utc::now().timestamp_millis().to_string();
    let tail = &millis[millis.len().saturating_sub(6)..];
    let random: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("{USER_ID_PREFIX}{tail}{random:04}")
}

/// Summary handed to the confirmation view through the key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationSuccess {
    pub user_id: String,
    pub username: String,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub locality: String,
    pub pincode: String,
    pub block: String,
    pub district: String,
    pub state: Option<IndianState>,
}

/// What a backend would persist for a new user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: String,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub age: u32,
    pub profession: Option<Profession>,
    pub experience: String,
    pub location: Location,
    pub id_type: Option<IdType>,
    pub id_number: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    fn from_draft(user_id: String, draft: &RegistrationDraft) -> Self {
        Self {
            user_id,
            full_name: draft.full_name.clone(),
            username: draft.username.clone(),
            email: draft.email.clone(),
            phone: draft.phone.clone(),
            age: leading_integer(&draft.age)
                .map_or(0, |age| age.clamp(0, i64::from(u32::MAX)) as u32),
            profession: draft.profession,
            experience: draft.experience.clone(),
            location: Location {
                locality: draft.locality.clone(),
                pincode: draft.pincode.clone(),
                block: draft.block.clone(),
                district: draft.district.clone(),
                state: draft.state,
            },
            id_type: draft.id_type,
            id_number: draft.id_number.clone(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NextOutcome {
    Advanced {
        step: WizardStep,
        notification: Notification,
    },
    Invalid(ErrorMap),
    /// The verification step only moves forward through [`RegistrationWizard::submit`].
    AtFinalStep,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// No files were picked.
    Empty,
    Accepted(Notification),
    /// The batch would exceed the cap; nothing was attached.
    Rejected(Notification),
}

/// A validated registration waiting on the backend round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSubmission {
    record: UserRecord,
}

impl PendingSubmission {
    pub fn user_id(&self) -> &str {
        &self.record.user_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitStart {
    Ready(PendingSubmission),
    Invalid(ErrorMap),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Registered {
        record: RegistrationSuccess,
        notification: Notification,
    },
    Invalid(ErrorMap),
    Failed(Notification),
}

/// Wizard state for one registration session. Owns the draft and the bytes
/// of every attached file.
#[derive(Debug, Default)]
pub struct RegistrationWizard {
    draft: RegistrationDraft,
    active_step: WizardStep,
    errors: ErrorMap,
    uploads: UploadSession,
    submitting: bool,
    submitted: Option<RegistrationSuccess>,
}

impl RegistrationWizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &RegistrationDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut RegistrationDraft {
        &mut self.draft
    }

    pub fn active_step(&self) -> WizardStep {
        self.active_step
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    pub fn uploads(&self) -> &UploadSession {
        &self.uploads
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn submitted(&self) -> Option<&RegistrationSuccess> {
        self.submitted.as_ref()
    }

    pub fn set_field(&mut self, field: Field, value: &str) -> Result<()> {
        self.draft.set_field(field, value)
    }

    fn validate_active(&mut self) -> bool {
        self.errors = validate_step(self.active_step, &self.draft);
        self.errors.is_empty()
    }

    pub fn handle_next(&mut self) -> NextOutcome {
        if !self.validate_active() {
            return NextOutcome::Invalid(self.errors.clone());
        }
        let (Some(next), Some(message)) =
            (self.active_step.next(), self.active_step.completion_message())
        else {
            return NextOutcome::AtFinalStep;
        };
        self.active_step = next;
        NextOutcome::Advanced {
            step: next,
            notification: Notification::info("Achievement Unlocked!", message),
        }
    }

    pub fn handle_back(&mut self) -> WizardStep {
        if self.submitting {
            return self.active_step;
        }
        if let Some(prev) = self.active_step.prev() {
            self.active_step = prev;
            self.errors.clear();
        }
        self.active_step
    }

    pub fn handle_govt_id_upload(&mut self, files: Vec<PendingFile>) -> UploadOutcome {
        if files.is_empty() {
            return UploadOutcome::Empty;
        }
        if self.draft.govt_id_documents.len() + files.len() > MAX_GOVT_ID_DOCUMENTS {
            return UploadOutcome::Rejected(Notification::destructive(
                "Too many files",
                "You can upload a maximum of 2 government ID documents",
            ));
        }
        for file in files {
            let uploaded = self.uploads.attach(file);
            self.draft.govt_id_documents.push(uploaded);
        }
        UploadOutcome::Accepted(Notification::info(
            "Document Uploaded!",
            "ID document added successfully! +5 XP",
        ))
    }

    pub fn handle_certificate_upload(&mut self, files: Vec<PendingFile>) -> UploadOutcome {
        if files.is_empty() {
            return UploadOutcome::Empty;
        }
        if self.draft.certifications.len() + files.len() > MAX_CERTIFICATIONS {
            return UploadOutcome::Rejected(Notification::destructive(
                "Too many files",
                "You can upload a maximum of 3 certification documents",
            ));
        }
        for file in files {
            let uploaded = self.uploads.attach(file);
            self.draft.certifications.push(uploaded);
        }
        UploadOutcome::Accepted(Notification::info(
            "Certification Added!",
            "Professional certification uploaded! +15 XP",
        ))
    }

    pub fn remove_govt_id(&mut self, id: &str) -> bool {
        Self::remove_upload(&mut self.uploads, &mut self.draft.govt_id_documents, id)
    }

    pub fn remove_certificate(&mut self, id: &str) -> bool {
        Self::remove_upload(&mut self.uploads, &mut self.draft.certifications, id)
    }

    fn remove_upload(uploads: &mut UploadSession, files: &mut Vec<UploadedFile>, id: &str) -> bool {
        let Some(pos) = files.iter().position(|file| file.id == id) else {
            return false;
        };
        let removed = files.remove(pos);
        uploads.release(&removed.reference);
        true
    }

    /// Re-validate the verification step and snapshot the record to send.
    /// Until [`finish_submit`](Self::finish_submit) runs, further submissions
    /// and step changes are refused.
    pub fn begin_submit(&mut self) -> Result<SubmitStart> {
        if self.submitted.is_some() {
            return Err(Error::AlreadySubmitted);
        }
        if self.submitting {
            return Err(Error::SubmissionInProgress);
        }
        if !self.active_step.is_final() {
            return Err(Error::NotAtFinalStep);
        }
        if !self.validate_active() {
            return Ok(SubmitStart::Invalid(self.errors.clone()));
        }
        self.submitting = true;
        Ok(SubmitStart::Ready(PendingSubmission {
            record: UserRecord::from_draft(generate_user_id(), &self.draft),
        }))
    }

    /// Record a submission started by [`begin_submit`](Self::begin_submit):
    /// leave a [`RegistrationSuccess`] in `store` for the confirmation view.
    pub fn finish_submit(
        &mut self,
        pending: PendingSubmission,
        store: &dyn KeyValueStore,
    ) -> SubmitOutcome {
        self.submitting = false;
        let record = pending.record;
        log::debug!(
            "user record ready: {}",
            serde_json::to_string(&record).unwrap_or_default()
        );

        let success = RegistrationSuccess {
            user_id: record.user_id.clone(),
            username: record.username.clone(),
            full_name: record.full_name.clone(),
        };
        if let Err(e) = store::put_json(store, REGISTRATION_SUCCESS_KEY, &success) {
            log::error!("Registration error: {e}");
            return SubmitOutcome::Failed(Notification::destructive(
                "Registration failed",
                "There was an error during registration. Please try again.",
            ));
        }

        self.submitted = Some(success.clone());
        let notification = Notification::info(
            "Registration successful!",
            format!(
                "Your user ID is {}. Please use your username and password to login.",
                success.user_id
            ),
        );
        SubmitOutcome::Registered {
            record: success,
            notification,
        }
    }

    /// [`begin_submit`](Self::begin_submit), the simulated backend round
    /// trip, then [`finish_submit`](Self::finish_submit).
    pub async fn submit<C>(&mut self, store: &dyn KeyValueStore, config: &C) -> Result<SubmitOutcome>
    where
        C: Configuration + ?Sized,
    {
        let pending = match self.begin_submit()? {
            SubmitStart::Ready(pending) => pending,
            SubmitStart::Invalid(errors) => return Ok(SubmitOutcome::Invalid(errors)),
        };
        tokio::time::sleep(config.submit_delay()).await;
        Ok(self.finish_submit(pending, store))
    }
}
