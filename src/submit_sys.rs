use serde::Serialize;

use crate::error::SubmitError;
use crate::marker_sys::LatLon;
use crate::report::{FloodLevel, ReportRecord};
use crate::store::{self, ReportStore};


const CONFIRM_PROMPT: &'static str = "Confirm your location?\n\n\
    To protect your privacy, make sure you're not at home.\n\n\
    Para sa iyong privacy, siguraduhin na hindi ka nasa bahay.";
const SUCCESS_MESSAGE: &'static str = "Report successfully sent!";


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    AwaitingConfirmation,
    Submitting,
    Succeeded,
    Failed,
}


#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    /// Whether the page should offer confirm and cancel instead of OK.
    pub needs_answer: bool,
}

impl Notification {
    fn info(title: &str, message: &str) -> Self {
        Notification {
            title: title.into(),
            message: message.into(),
            needs_answer: false,
        }
    }

    fn question(title: &str, message: &str) -> Self {
        Notification {
            title: title.into(),
            message: message.into(),
            needs_answer: true,
        }
    }
}


#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportDraft {
    pub flood_level: FloodLevel,
    pub message: String,
}


/// Send-report flow of one session.
#[derive(Debug)]
pub struct SubmissionFlow {
    state: SubmissionState,
    draft: ReportDraft,
    notification: Option<Notification>,
}

impl Default for SubmissionFlow {
    fn default() -> Self {
        SubmissionFlow {
            state: SubmissionState::Idle,
            draft: ReportDraft::default(),
            notification: None,
        }
    }
}

impl SubmissionFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn draft(&self) -> &ReportDraft {
        &self.draft
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn dismiss(&mut self) {
        self.notification = None;
    }

    /// Takes the draft and asks the user to confirm it.
    pub fn request(&mut self, draft: ReportDraft, identity: Option<&str>, store_ready: bool)
        -> Result<(), SubmitError> {

        if identity.is_none() || !store_ready {
            let err = SubmitError::NotReady;
            self.notification = Some(Notification::info("Error", &err.to_string()));
            return Err(err);
        }

        if self.state == SubmissionState::Submitting {
            return Err(SubmitError::NotAwaitingConfirmation);
        }

        self.draft = draft;
        self.state = SubmissionState::AwaitingConfirmation;
        self.notification = Some(Notification::question("Confirm Report", CONFIRM_PROMPT));
        Ok(())
    }

    pub fn cancel(&mut self) {
        if self.state == SubmissionState::AwaitingConfirmation {
            self.state = SubmissionState::Idle;
            self.notification = None;
        }
    }

    /// Writes the confirmed draft as the caller's one current report.
    pub fn confirm(&mut self, store: &dyn ReportStore, collection: &str, identity: &str,
        position: LatLon, now: i64) -> Result<(), SubmitError> {

        if self.state != SubmissionState::AwaitingConfirmation {
            return Err(SubmitError::NotAwaitingConfirmation);
        }

        self.state = SubmissionState::Submitting;
        self.notification = None;

        let record = ReportRecord {
            latitude: position.lat,
            longitude: position.lon,
            flood_level: self.draft.flood_level.clone(),
            message: self.draft.message.clone(),
            timestamp: Some(now),
        };

        match store.set(&store::report_path(collection, identity), &record) {
            Ok(()) => {
                info!("Report stored for {}", identity);
                self.state = SubmissionState::Succeeded;
                self.draft.message.clear();
                self.notification = Some(Notification::info("Success", SUCCESS_MESSAGE));
                Ok(())
            },
            Err(err) => {
                warn!("Fail to store report for {}: {}", identity, err);
                let err = SubmitError::from(err);
                self.state = SubmissionState::Failed;
                self.notification = Some(Notification::info("Error", &err.to_string()));
                Err(err)
            },
        }
    }
}
