use serde_derive::{Deserialize, Serialize};

use crate::auth::registration::RegistrationSuccess;
use crate::notification::Notification;
use crate::store::{self, KeyValueStore, REGISTRATION_SUCCESS_KEY};

/// Where a view sends the user when it cannot render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Redirect {
    Register,
    Login,
}

/// The page shown right after a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationView {
    pub registration: RegistrationSuccess,
    pub welcome: Notification,
}

impl ConfirmationView {
    /// Consume the success record left by the wizard. A missing or malformed
    /// record sends the user back to registration.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, Redirect> {
        match store::take_json::<RegistrationSuccess>(store, REGISTRATION_SUCCESS_KEY) {
            Ok(Some(registration)) => Ok(Self {
                registration,
                welcome: Notification::info("Achievement Unlocked!", "Welcome to ActiSathi! +50 XP"),
            }),
            Ok(None) => Err(Redirect::Register),
            Err(e) => {
                log::error!("Error parsing registration data: {e}");
                Err(Redirect::Register)
            }
        }
    }

    pub fn user_id(&self) -> &str {
        &self.registration.user_id
    }

    /// Text to put on the clipboard and the toast confirming it.
    pub fn copy_user_id(&self) -> (String, Notification) {
        (
            self.registration.user_id.clone(),
            Notification::info("User ID copied", "Your user ID has been copied to clipboard"),
        )
    }
}
