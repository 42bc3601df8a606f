use serde_derive::{Deserialize, Serialize};

use crate::auth::confirmation::Redirect;
use crate::auth::registration::{ErrorMap, Field};
use crate::config::Configuration;
use crate::errors::Result;
use crate::karma::LevelProgress;
use crate::notification::Notification;
use crate::store::{self, KeyValueStore, TOKEN_KEY, USER_KEY};
use crate::uploads::local_id;

pub const MOCK_TOKEN_PREFIX: &str = "mock-jwt-token-";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginForm {
    pub username_or_email: String,
    pub password: String,
    pub remember_me: bool,
}

impl LoginForm {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
            remember_me: false,
        }
    }

    pub fn validate(&self) -> ErrorMap {
        let mut errors = ErrorMap::new();
        if self.username_or_email.trim().is_empty() {
            errors.insert(Field::UsernameOrEmail, "Username or email is required".into());
        }
        if self.password.is_empty() {
            errors.insert(Field::Password, "Password is required".into());
        }
        errors
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileLocation {
    pub locality: String,
    pub pincode: String,
    pub district: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub age: u32,
    pub profession: String,
    pub location: ProfileLocation,
    pub karma: u64,
    pub level: u32,
    pub avatar: String,
}

impl UserProfile {
    fn demo(username: &str) -> Self {
        Self {
            user_id: "ACT123456789".into(),
            username: username.to_string(),
            full_name: "Demo User".into(),
            email: "demo@example.com".into(),
            phone: "9876543210".into(),
            age: 28,
            profession: "Software Developer".into(),
            location: ProfileLocation {
                locality: "Green Park".into(),
                pincode: "110016".into(),
                district: "South Delhi".into(),
                state: "Delhi".into(),
            },
            karma: 120,
            level: 2,
            avatar: "/placeholder.svg?height=200&width=200".into(),
        }
    }

    pub fn progress(&self) -> LevelProgress {
        LevelProgress::new(self.karma, self.level)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: UserProfile,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginResult {
    /// Login successful, session within.
    Success {
        session: Session,
        notification: Notification,
    },
    Invalid(ErrorMap),
    Failed(Notification),
}

fn mock_token() -> String {
    format!("{MOCK_TOKEN_PREFIX}{}", local_id())
}

/// Simulated sign-in: any well-formed form is accepted and a demo profile is
/// stored under `user`, the token under `token`.
pub async fn login<C>(form: &LoginForm, store: &dyn KeyValueStore, config: &C) -> LoginResult
where
    C: Configuration + ?Sized,
{
    let errors = form.validate();
    if !errors.is_empty() {
        return LoginResult::Invalid(errors);
    }

    tokio::time::sleep(config.login_delay()).await;

    let session = Session {
        user: UserProfile::demo(&form.username_or_email),
        token: mock_token(),
    };
    let stored = store::put_json(store, USER_KEY, &session.user)
        .and_then(|_| store.set(TOKEN_KEY, session.token.clone()));
    if let Err(e) = stored {
        log::error!("Login error: {e}");
        return LoginResult::Failed(Notification::destructive(
            "Login failed",
            "Invalid username or password. Please try again.",
        ));
    }

    let notification = Notification::info(
        "Login successful",
        format!("Welcome back, {}! +5 XP", session.user.full_name),
    );
    LoginResult::Success {
        session,
        notification,
    }
}

pub fn logout(store: &dyn KeyValueStore) -> Result<()> {
    store.remove(USER_KEY)?;
    store.remove(TOKEN_KEY)?;
    Ok(())
}

/// The signed-in user for pages that need one; anyone else goes to login.
pub fn current_user(store: &dyn KeyValueStore) -> std::result::Result<UserProfile, Redirect> {
    let token = store.get(TOKEN_KEY).ok().flatten();
    match (token, store::get_json::<UserProfile>(store, USER_KEY)) {
        (Some(_), Ok(Some(user))) => Ok(user),
        (_, Err(e)) => {
            log::warn!("stored user is unreadable: {e}");
            Err(Redirect::Login)
        }
        _ => Err(Redirect::Login),
    }
}
