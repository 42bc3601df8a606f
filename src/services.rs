use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::KarmaClient;
use crate::auth::login::{self, LoginForm, LoginResult, Session};
use crate::auth::registration::{
    ErrorMap, Field, NextOutcome, PendingSubmission, RegistrationSuccess, RegistrationWizard,
    SubmitOutcome, SubmitStart, UploadOutcome, WizardStep,
};
use crate::config::{ClientConfig, Configuration};
use crate::karma::{KarmaCashResponse, KarmaResponse, LeaderboardEntry, RewardItem};
use crate::notification::Notification;
use crate::store::KeyValueStore;
use crate::uploads::PendingFile;

/// Commands sent from the UI thread to the background service.
#[derive(Debug, Clone)]
pub enum AppCmd {
    SetField { field: Field, value: String },
    Next,
    Back,
    UploadGovtIds(Vec<PendingFile>),
    UploadCertificates(Vec<PendingFile>),
    RemoveGovtId(String),
    RemoveCertificate(String),
    Submit,
    /// Throw the current draft away and start over at the first step.
    Reset,
    Login(LoginForm),
    LoadKarma(String),
    LoadKarmaCash(String),
    LoadRewards,
    Redeem {
        user_id: String,
        reward_id: u64,
    },
    RecordAction {
        user_id: String,
        action_type: String,
        context: Map<String, Value>,
    },
    LoadLeaderboard {
        category: String,
        limit: u32,
    },
}

/// Events the service pushes back for the UI to render.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Notify(Notification),
    StepChanged(WizardStep),
    ValidationFailed(ErrorMap),
    UploadRemoved {
        field: Field,
        id: String,
        removed: bool,
    },
    /// The draft passed validation and is on its way to the backend.
    Submitting { user_id: String },
    Registered(RegistrationSuccess),
    LoggedIn(Session),
    Karma(KarmaResponse),
    KarmaCash(KarmaCashResponse),
    Rewards(Vec<RewardItem>),
    Redeemed { reward_id: u64, ok: bool },
    ActionRecorded { action_type: String, ok: bool },
    Leaderboard(Vec<LeaderboardEntry>),
    /// A command the service could not act on, e.g. an unknown select option.
    Error(String),
}

pub struct ActiSathiService {
    service_handle: tokio::task::JoinHandle<()>,
    cmd_tx: UnboundedSender<AppCmd>,
    ui_rx: UnboundedReceiver<UiEvent>,
}

impl ActiSathiService {
    pub fn new(
        handle: &tokio::runtime::Handle,
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let service_handle = handle.spawn(actisathi_service(cmd_rx, ui_tx, config, store));
        Self {
            service_handle,
            cmd_tx,
            ui_rx,
        }
    }

    pub fn tx(&self) -> &UnboundedSender<AppCmd> {
        &self.cmd_tx
    }

    pub fn send(&self, cmd: AppCmd) -> Result<(), mpsc::error::SendError<AppCmd>> {
        self.cmd_tx.send(cmd)
    }

    pub fn try_recv(&mut self) -> Option<UiEvent> {
        self.ui_rx.try_recv().ok()
    }

    pub async fn recv(&mut self) -> Option<UiEvent> {
        self.ui_rx.recv().await
    }

    pub fn is_running(&self) -> bool {
        !self.service_handle.is_finished()
    }
}

impl Drop for ActiSathiService {
    fn drop(&mut self) {
        self.service_handle.abort();
    }
}

fn emit(ui_tx: &UnboundedSender<UiEvent>, event: UiEvent) {
    if let Err(e) = ui_tx.send(event) {
        log::debug!("ui is gone, dropping event: {:?}", e.0);
    }
}

async fn actisathi_service(
    mut cmd_rx: UnboundedReceiver<AppCmd>,
    ui_tx: UnboundedSender<UiEvent>,
    config: ClientConfig,
    store: Arc<dyn KeyValueStore>,
) {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let mut state = ServiceState {
        client: KarmaClient::from_config(&config),
        wizard: RegistrationWizard::new(),
        config,
        store,
        ui_tx,
        done_tx,
    };

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(cmd) => state.handle(cmd),
                None => break,
            },
            Some(pending) = done_rx.recv() => state.finish_submission(pending),
        }
    }
    log::debug!("command channel closed, service exiting");
}

/// Everything the command loop owns. Handlers never await: slow work runs on
/// spawned tasks so one command cannot hold up the next.
struct ServiceState {
    client: KarmaClient,
    wizard: RegistrationWizard,
    config: ClientConfig,
    store: Arc<dyn KeyValueStore>,
    ui_tx: UnboundedSender<UiEvent>,
    done_tx: UnboundedSender<PendingSubmission>,
}

impl ServiceState {
    fn emit(&self, event: UiEvent) {
        emit(&self.ui_tx, event);
    }

    fn handle(&mut self, cmd: AppCmd) {
        match cmd {
            AppCmd::SetField { field, value } => {
                if let Err(e) = self.wizard.set_field(field, &value) {
                    self.emit(UiEvent::Error(e.to_string()));
                }
            }
            AppCmd::Next => match self.wizard.handle_next() {
                NextOutcome::Advanced { step, notification } => {
                    self.emit(UiEvent::StepChanged(step));
                    self.emit(UiEvent::Notify(notification));
                }
                NextOutcome::Invalid(errors) => self.emit(UiEvent::ValidationFailed(errors)),
                NextOutcome::AtFinalStep => {
                    self.emit(UiEvent::Error("submit to finish registration".into()))
                }
            },
            AppCmd::Back => {
                let step = self.wizard.handle_back();
                self.emit(UiEvent::StepChanged(step));
            }
            AppCmd::UploadGovtIds(files) => {
                upload_result(&self.ui_tx, self.wizard.handle_govt_id_upload(files));
            }
            AppCmd::UploadCertificates(files) => {
                upload_result(&self.ui_tx, self.wizard.handle_certificate_upload(files));
            }
            AppCmd::RemoveGovtId(id) => {
                let removed = self.wizard.remove_govt_id(&id);
                self.emit(UiEvent::UploadRemoved {
                    field: Field::GovtIdDocuments,
                    id,
                    removed,
                });
            }
            AppCmd::RemoveCertificate(id) => {
                let removed = self.wizard.remove_certificate(&id);
                self.emit(UiEvent::UploadRemoved {
                    field: Field::Certifications,
                    id,
                    removed,
                });
            }
            AppCmd::Submit => self.start_submission(),
            AppCmd::Reset => {
                self.wizard = RegistrationWizard::new();
                self.emit(UiEvent::StepChanged(self.wizard.active_step()));
            }
            AppCmd::Login(form) => {
                let (store, config, ui_tx) =
                    (self.store.clone(), self.config.clone(), self.ui_tx.clone());
                tokio::spawn(async move {
                    match login::login(&form, store.as_ref(), &config).await {
                        LoginResult::Success {
                            session,
                            notification,
                        } => {
                            emit(&ui_tx, UiEvent::LoggedIn(session));
                            emit(&ui_tx, UiEvent::Notify(notification));
                        }
                        LoginResult::Invalid(errors) => {
                            emit(&ui_tx, UiEvent::ValidationFailed(errors))
                        }
                        LoginResult::Failed(notification) => {
                            emit(&ui_tx, UiEvent::Notify(notification))
                        }
                    }
                });
            }
            // Karma calls run on their own tasks; overlapping requests are
            // neither serialized nor de-duplicated.
            AppCmd::LoadKarma(user_id) => {
                let (client, ui_tx) = (self.client.clone(), self.ui_tx.clone());
                tokio::spawn(async move {
                    emit(&ui_tx, UiEvent::Karma(client.get_user_karma(&user_id).await));
                });
            }
            AppCmd::LoadKarmaCash(user_id) => {
                let (client, ui_tx) = (self.client.clone(), self.ui_tx.clone());
                tokio::spawn(async move {
                    let cash = client.get_user_karma_cash(&user_id).await;
                    emit(&ui_tx, UiEvent::KarmaCash(cash));
                });
            }
            AppCmd::LoadRewards => {
                let (client, ui_tx) = (self.client.clone(), self.ui_tx.clone());
                tokio::spawn(async move {
                    emit(&ui_tx, UiEvent::Rewards(client.get_rewards().await));
                });
            }
            AppCmd::Redeem { user_id, reward_id } => {
                let (client, ui_tx) = (self.client.clone(), self.ui_tx.clone());
                tokio::spawn(async move {
                    let ok = client.redeem_reward(&user_id, reward_id).await;
                    emit(&ui_tx, UiEvent::Redeemed { reward_id, ok });
                });
            }
            AppCmd::RecordAction {
                user_id,
                action_type,
                context,
            } => {
                let (client, ui_tx) = (self.client.clone(), self.ui_tx.clone());
                tokio::spawn(async move {
                    let ok = client
                        .record_karma_action(&user_id, &action_type, &context)
                        .await;
                    emit(&ui_tx, UiEvent::ActionRecorded { action_type, ok });
                });
            }
            AppCmd::LoadLeaderboard { category, limit } => {
                let (client, ui_tx) = (self.client.clone(), self.ui_tx.clone());
                tokio::spawn(async move {
                    let rows = client.get_leaderboard(&category, limit).await;
                    emit(&ui_tx, UiEvent::Leaderboard(rows));
                });
            }
        }
    }

    /// Validate now, then let a timer task stand in for the backend and hand
    /// the submission back through `done_tx`.
    fn start_submission(&mut self) {
        match self.wizard.begin_submit() {
            Ok(SubmitStart::Ready(pending)) => {
                self.emit(UiEvent::Submitting {
                    user_id: pending.user_id().to_string(),
                });
                let (delay, done_tx) = (self.config.submit_delay(), self.done_tx.clone());
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = done_tx.send(pending);
                });
            }
            Ok(SubmitStart::Invalid(errors)) => self.emit(UiEvent::ValidationFailed(errors)),
            Err(e) => self.emit(UiEvent::Error(e.to_string())),
        }
    }

    fn finish_submission(&mut self, pending: PendingSubmission) {
        match self.wizard.finish_submit(pending, self.store.as_ref()) {
            SubmitOutcome::Registered {
                record,
                notification,
            } => {
                self.emit(UiEvent::Registered(record));
                self.emit(UiEvent::Notify(notification));
            }
            SubmitOutcome::Invalid(errors) => self.emit(UiEvent::ValidationFailed(errors)),
            SubmitOutcome::Failed(notification) => self.emit(UiEvent::Notify(notification)),
        }
    }
}

fn upload_result(ui_tx: &UnboundedSender<UiEvent>, outcome: UploadOutcome) {
    match outcome {
        UploadOutcome::Accepted(notification) | UploadOutcome::Rejected(notification) => {
            emit(ui_tx, UiEvent::Notify(notification))
        }
        UploadOutcome::Empty => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::confirmation::ConfirmationView;
    use crate::store::MemoryStore;
    use mockito::Server;
    use std::time::Duration;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn service(url: &str, store: Arc<MemoryStore>) -> ActiSathiService {
        let handle = tokio::runtime::Handle::current();
        ActiSathiService::new(&handle, ClientConfig::immediate(url), store)
    }

    fn set(service: &ActiSathiService, field: Field, value: &str) {
        service
            .send(AppCmd::SetField {
                field,
                value: value.to_string(),
            })
            .unwrap();
    }

    async fn next_event(service: &mut ActiSathiService) -> UiEvent {
        service.recv().await.expect("service still running")
    }

    #[tokio::test]
    async fn registration_end_to_end() {
        init_logger();
        let store = Arc::new(MemoryStore::new());
        let mut service = service("http://127.0.0.1:1", store.clone());

        for (field, value) in [
            (Field::FullName, "Ravi Kumar"),
            (Field::Email, "ravi@example.org"),
            (Field::Phone, "9123456780"),
            (Field::Age, "34"),
            (Field::Username, "ravik"),
            (Field::Password, "longenough"),
            (Field::ConfirmPassword, "longenough"),
        ] {
            set(&service, field, value);
        }
        service.send(AppCmd::Next).unwrap();
        assert_eq!(next_event(&mut service).await, UiEvent::StepChanged(WizardStep::Professional));
        assert!(matches!(next_event(&mut service).await, UiEvent::Notify(_)));

        set(&service, Field::Profession, "Farmer");
        service.send(AppCmd::Next).unwrap();
        assert_eq!(next_event(&mut service).await, UiEvent::StepChanged(WizardStep::Location));
        next_event(&mut service).await;

        service.send(AppCmd::Next).unwrap();
        match next_event(&mut service).await {
            UiEvent::ValidationFailed(errors) => {
                assert!(errors.contains_key(&Field::Pincode));
                assert!(errors.contains_key(&Field::State));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }

        set(&service, Field::Locality, "Anandpur");
        set(&service, Field::Pincode, "751001");
        set(&service, Field::District, "Khordha");
        set(&service, Field::State, "Odisha");
        service.send(AppCmd::Next).unwrap();
        assert_eq!(next_event(&mut service).await, UiEvent::StepChanged(WizardStep::Verification));
        next_event(&mut service).await;

        set(&service, Field::IdType, "PAN Card");
        set(&service, Field::IdNumber, "ABCPK1234Z");
        set(&service, Field::AgreeTerms, "true");
        service
            .send(AppCmd::UploadGovtIds(vec![PendingFile::new("pan.jpg", vec![0xff, 0xd8])]))
            .unwrap();
        assert!(matches!(next_event(&mut service).await, UiEvent::Notify(n) if !n.is_destructive()));

        service.send(AppCmd::Submit).unwrap();
        let pending_id = match next_event(&mut service).await {
            UiEvent::Submitting { user_id } => user_id,
            other => panic!("expected submission to start, got {other:?}"),
        };
        let record = match next_event(&mut service).await {
            UiEvent::Registered(record) => record,
            other => panic!("expected registration, got {other:?}"),
        };
        assert_eq!(record.user_id, pending_id);
        assert!(record.user_id.starts_with("ACT"));
        assert!(record.user_id[3..].bytes().all(|b| b.is_ascii_digit()));

        let view = ConfirmationView::load(store.as_ref()).expect("success record stored");
        assert_eq!(view.user_id(), record.user_id);
        assert_eq!(view.registration.full_name, "Ravi Kumar");
    }

    #[tokio::test]
    async fn karma_is_served_while_registration_is_pending() {
        init_logger();
        let config = ClientConfig {
            submit_delay_ms: 60_000,
            ..ClientConfig::immediate("http://127.0.0.1:1")
        };
        let mut service = ActiSathiService::new(
            &tokio::runtime::Handle::current(),
            config,
            Arc::new(MemoryStore::new()),
        );
        for (step, values) in [
            (
                WizardStep::Professional,
                vec![
                    (Field::FullName, "Meera Das"),
                    (Field::Email, "meera@example.org"),
                    (Field::Phone, "9876543210"),
                    (Field::Age, "29"),
                    (Field::Username, "meerad"),
                    (Field::Password, "longenough"),
                    (Field::ConfirmPassword, "longenough"),
                ],
            ),
            (WizardStep::Location, vec![(Field::Profession, "Teacher")]),
            (
                WizardStep::Verification,
                vec![
                    (Field::Locality, "Jayanagar"),
                    (Field::Pincode, "560001"),
                    (Field::District, "Bengaluru Urban"),
                    (Field::State, "Karnataka"),
                ],
            ),
        ] {
            for (field, value) in values {
                set(&service, field, value);
            }
            service.send(AppCmd::Next).unwrap();
            assert_eq!(next_event(&mut service).await, UiEvent::StepChanged(step));
            next_event(&mut service).await;
        }
        set(&service, Field::IdType, "Aadhaar Card");
        set(&service, Field::IdNumber, "123412341234");
        set(&service, Field::AgreeTerms, "true");
        service
            .send(AppCmd::UploadGovtIds(vec![PendingFile::new("aadhaar.png", vec![0x89, 0x50])]))
            .unwrap();
        assert!(matches!(next_event(&mut service).await, UiEvent::Notify(_)));

        service.send(AppCmd::Submit).unwrap();
        assert!(matches!(next_event(&mut service).await, UiEvent::Submitting { .. }));

        service.send(AppCmd::LoadKarma("u1".into())).unwrap();
        let event = tokio::time::timeout(Duration::from_secs(10), next_event(&mut service))
            .await
            .expect("karma answered before the submission finished");
        assert_eq!(event, UiEvent::Karma(KarmaResponse::default()));

        service.send(AppCmd::Submit).unwrap();
        assert!(matches!(next_event(&mut service).await, UiEvent::Error(_)));
    }

    #[tokio::test]
    async fn removals_are_reported() {
        init_logger();
        let mut service = service("http://127.0.0.1:1", Arc::new(MemoryStore::new()));
        service
            .send(AppCmd::UploadCertificates(vec![PendingFile::new("first-aid.pdf", vec![1, 2])]))
            .unwrap();
        assert!(matches!(next_event(&mut service).await, UiEvent::Notify(_)));

        service.send(AppCmd::RemoveCertificate("missing".into())).unwrap();
        assert_eq!(
            next_event(&mut service).await,
            UiEvent::UploadRemoved {
                field: Field::Certifications,
                id: "missing".into(),
                removed: false,
            }
        );

        service.send(AppCmd::RemoveGovtId("missing".into())).unwrap();
        assert!(matches!(
            next_event(&mut service).await,
            UiEvent::UploadRemoved { field: Field::GovtIdDocuments, removed: false, .. }
        ));
    }

    #[tokio::test]
    async fn unknown_option_is_reported() {
        init_logger();
        let mut service = service("http://127.0.0.1:1", Arc::new(MemoryStore::new()));
        set(&service, Field::State, "Atlantis");
        assert!(matches!(next_event(&mut service).await, UiEvent::Error(_)));
    }

    #[tokio::test]
    async fn karma_falls_back_when_service_is_down() {
        init_logger();
        let mut service = service("http://127.0.0.1:1", Arc::new(MemoryStore::new()));
        service.send(AppCmd::LoadKarma("u1".into())).unwrap();
        assert_eq!(next_event(&mut service).await, UiEvent::Karma(KarmaResponse::default()));
    }

    #[tokio::test]
    async fn redeem_reports_outcome() {
        init_logger();
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/karma-cash/redeem")
            .with_status(200)
            .create_async()
            .await;

        let mut service = service(&server.url(), Arc::new(MemoryStore::new()));
        service
            .send(AppCmd::Redeem {
                user_id: "u1".into(),
                reward_id: 3,
            })
            .unwrap();
        assert_eq!(
            next_event(&mut service).await,
            UiEvent::Redeemed { reward_id: 3, ok: true }
        );
    }

    #[tokio::test]
    async fn login_emits_session() {
        init_logger();
        let store = Arc::new(MemoryStore::new());
        let mut service = service("http://127.0.0.1:1", store.clone());
        service
            .send(AppCmd::Login(LoginForm::new("demo", "password1")))
            .unwrap();
        match next_event(&mut service).await {
            UiEvent::LoggedIn(session) => assert_eq!(session.user.username, "demo"),
            other => panic!("expected login, got {other:?}"),
        }
        assert!(login::current_user(store.as_ref()).is_ok());
    }
}
