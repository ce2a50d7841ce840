use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};

use crate::recruit::domain::{
    Applicant, ChannelRef, ContentKind, Recruitment, RecruitmentId, RecruitmentStatus, Role,
    UserId,
};
use crate::recruit::ledger::InMemoryParticipationLedger;
use crate::recruit::registry::{
    AnnounceError, AnnouncementPublisher, AnnouncementRef, RecruitmentRegistry,
};
use crate::recruit::selection::SelectionConfig;
use crate::recruit::view::{AnnouncementView, ResultView};

/// Publisher double that records everything it is asked to deliver, and can be
/// switched to refuse publishes.
#[derive(Default)]
pub(super) struct RecordingPublisher {
    fail_publish: AtomicBool,
    sequence: AtomicU64,
    published: Mutex<Vec<AnnouncementView>>,
    refreshes: Mutex<Vec<(RecruitmentId, AnnouncementView)>>,
    results: Mutex<Vec<ResultView>>,
    notices: Mutex<Vec<String>>,
}

impl RecordingPublisher {
    pub(super) fn failing() -> Self {
        let publisher = Self::default();
        publisher.fail_publish.store(true, Ordering::Relaxed);
        publisher
    }

    pub(super) fn published(&self) -> Vec<AnnouncementView> {
        self.published.lock().expect("publisher mutex poisoned").clone()
    }

    pub(super) fn refreshes(&self) -> Vec<(RecruitmentId, AnnouncementView)> {
        self.refreshes.lock().expect("publisher mutex poisoned").clone()
    }

    pub(super) fn results(&self) -> Vec<ResultView> {
        self.results.lock().expect("publisher mutex poisoned").clone()
    }

    pub(super) fn notices(&self) -> Vec<String> {
        self.notices.lock().expect("publisher mutex poisoned").clone()
    }
}

impl AnnouncementPublisher for RecordingPublisher {
    fn publish(
        &self,
        _channel: &ChannelRef,
        view: &AnnouncementView,
    ) -> Result<AnnouncementRef, AnnounceError> {
        if self.fail_publish.load(Ordering::Relaxed) {
            return Err(AnnounceError::Transport("delivery refused".to_string()));
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.published
            .lock()
            .expect("publisher mutex poisoned")
            .push(view.clone());
        Ok(AnnouncementRef(format!("ann-{sequence:04}")))
    }

    fn refresh(
        &self,
        _channel: &ChannelRef,
        id: &RecruitmentId,
        view: &AnnouncementView,
    ) -> Result<(), AnnounceError> {
        self.refreshes
            .lock()
            .expect("publisher mutex poisoned")
            .push((id.clone(), view.clone()));
        Ok(())
    }

    fn announce_results(
        &self,
        _channel: &ChannelRef,
        view: &ResultView,
    ) -> Result<(), AnnounceError> {
        self.results
            .lock()
            .expect("publisher mutex poisoned")
            .push(view.clone());
        Ok(())
    }

    fn notice(&self, _channel: &ChannelRef, text: &str) -> Result<(), AnnounceError> {
        self.notices
            .lock()
            .expect("publisher mutex poisoned")
            .push(text.to_string());
        Ok(())
    }
}

pub(super) type TestRegistry =
    RecruitmentRegistry<RecordingPublisher, InMemoryParticipationLedger>;

pub(super) fn seeded_registry(
    capacity: usize,
    seed: u64,
) -> (
    Arc<RecordingPublisher>,
    Arc<InMemoryParticipationLedger>,
    TestRegistry,
) {
    let publisher = Arc::new(RecordingPublisher::default());
    let ledger = Arc::new(InMemoryParticipationLedger::new());
    let registry = RecruitmentRegistry::with_rng_seed(
        Arc::clone(&publisher),
        Arc::clone(&ledger),
        SelectionConfig {
            capacity,
            content_mismatch_weight: 0.5,
        },
        seed,
    );
    (publisher, ledger, registry)
}

pub(super) fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

pub(super) fn tomorrow() -> NaiveDate {
    Local::now().date_naive() + Duration::days(1)
}

pub(super) fn tomorrow_str() -> String {
    tomorrow().format("%Y-%m-%d").to_string()
}

pub(super) fn time(raw: &str) -> NaiveTime {
    NaiveTime::parse_from_str(raw, "%H:%M").expect("valid time literal")
}

/// Bare recruitment snapshot for driving the selection engine directly.
pub(super) fn recruitment_at(date: NaiveDate, start: &str, host: &str) -> Recruitment {
    Recruitment {
        id: RecruitmentId("ann-test".to_string()),
        content_kind: ContentKind::Zenith,
        confirmed_content: None,
        start_time: NaiveDateTime::new(date, time(start)),
        host_id: user(host),
        host_name: host.to_string(),
        channel: ChannelRef("channel-1".to_string()),
        note: None,
        status: RecruitmentStatus::Open,
        applicants: BTreeMap::new(),
        waiting_list: Vec::new(),
        selected_roster: Vec::new(),
        confirmed_start_time: None,
    }
}

pub(super) fn push_applicant(
    recruitment: &mut Recruitment,
    id: &str,
    roles: &[Role],
    available_from: Option<&str>,
) {
    let identity = user(id);
    let mut applicant = Applicant::new(identity.clone(), id.to_string(), recruitment.start_time);
    applicant.desired_roles = roles.iter().copied().collect();
    applicant.available_from = available_from.map(time);
    recruitment.applicants.insert(identity, applicant);
}
