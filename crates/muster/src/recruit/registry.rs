use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::domain::{
    Applicant, ChannelRef, ContentChoice, ContentKind, ContentPreference, Recruitment,
    RecruitmentId, RecruitmentStatus, Role, UserId,
};
use super::ledger::ParticipationLedger;
use super::selection::{self, SelectionConfig};
use super::view::{announcement_view, fairness_notice, result_view, AnnouncementView, ResultView};

/// Reference to a published announcement, minted by the publisher. A recruitment
/// adopts it as its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnouncementRef(pub String);

/// Outbound boundary through which recruitments become visible to users. The
/// registry hands over fully rendered views; implementations only deliver them.
pub trait AnnouncementPublisher: Send + Sync {
    /// Create the live announcement for a new recruitment.
    fn publish(
        &self,
        channel: &ChannelRef,
        view: &AnnouncementView,
    ) -> Result<AnnouncementRef, AnnounceError>;

    /// Re-render the live announcement after a state change.
    fn refresh(
        &self,
        channel: &ChannelRef,
        id: &RecruitmentId,
        view: &AnnouncementView,
    ) -> Result<(), AnnounceError>;

    /// Send the one-shot results announcement at close.
    fn announce_results(
        &self,
        channel: &ChannelRef,
        view: &ResultView,
    ) -> Result<(), AnnounceError>;

    /// Send a plain text notice (e.g. the fairness explanation).
    fn notice(&self, channel: &ChannelRef, text: &str) -> Result<(), AnnounceError>;
}

/// Delivery failure reported by a publisher.
#[derive(Debug, thiserror::Error)]
pub enum AnnounceError {
    #[error("announcement transport unavailable: {0}")]
    Transport(String),
}

/// Error taxonomy for registry operations. Every failure is one-shot and reported
/// synchronously; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum RecruitError {
    #[error("invalid date or time: {0}")]
    InvalidDateTime(String),
    #[error("the start time must be in the future")]
    PastDateTime,
    #[error("recruitment not found")]
    NotFound,
    #[error("this recruitment is already closed")]
    AlreadyClosed,
    #[error("only the host may do that")]
    NotHost,
    #[error("the host cannot withdraw")]
    HostCannotWithdraw,
    #[error("no sign-up found to withdraw")]
    NotAnApplicant,
    #[error("the announcement could not be published")]
    AnnouncementFailed(#[source] AnnounceError),
}

/// Result of a successful close.
#[derive(Debug, Clone)]
pub struct CloseOutcome {
    pub confirmed_content: Option<ContentChoice>,
    pub confirmed_start_time: NaiveTime,
    pub roster: Vec<UserId>,
    pub waiting_list: Vec<UserId>,
    pub assignments: BTreeMap<UserId, Role>,
    pub message: String,
}

/// Owner of all recruitment entities and the sole mutator of their state. Every
/// mutation happens under the registry lock, and `close` flips the status before
/// any publisher call, so a racing second close (or any racing mutation) observes
/// `AlreadyClosed`.
pub struct RecruitmentRegistry<P, L> {
    publisher: Arc<P>,
    ledger: Arc<L>,
    config: SelectionConfig,
    recruitments: Mutex<HashMap<RecruitmentId, Recruitment>>,
    rng: Mutex<StdRng>,
}

impl<P, L> RecruitmentRegistry<P, L>
where
    P: AnnouncementPublisher,
    L: ParticipationLedger,
{
    pub fn new(publisher: Arc<P>, ledger: Arc<L>, config: SelectionConfig) -> Self {
        Self::with_rng(publisher, ledger, config, StdRng::from_entropy())
    }

    /// Deterministic lottery draws for tests and demos.
    pub fn with_rng_seed(
        publisher: Arc<P>,
        ledger: Arc<L>,
        config: SelectionConfig,
        seed: u64,
    ) -> Self {
        Self::with_rng(publisher, ledger, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(publisher: Arc<P>, ledger: Arc<L>, config: SelectionConfig, rng: StdRng) -> Self {
        Self {
            publisher,
            ledger,
            config,
            recruitments: Mutex::new(HashMap::new()),
            rng: Mutex::new(rng),
        }
    }

    /// Open a recruitment: validate the schedule, publish the announcement, then
    /// store the entity. A publish failure stores nothing, so no recruitment ever
    /// exists without a live announcement.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        &self,
        content_kind: ContentKind,
        date: &str,
        time: &str,
        host_id: UserId,
        host_name: &str,
        channel: ChannelRef,
        note: Option<String>,
    ) -> Result<RecruitmentId, RecruitError> {
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|err| RecruitError::InvalidDateTime(format!("{date}: {err}")))?;
        let time = parse_time_of_day(time)?;
        let start_time = NaiveDateTime::new(date, time);
        if start_time <= Local::now().naive_local() {
            return Err(RecruitError::PastDateTime);
        }

        let mut recruitment = Recruitment {
            id: RecruitmentId(String::new()),
            content_kind,
            confirmed_content: None,
            start_time,
            host_id,
            host_name: host_name.to_string(),
            channel,
            note,
            status: RecruitmentStatus::Open,
            applicants: BTreeMap::new(),
            waiting_list: Vec::new(),
            selected_roster: Vec::new(),
            confirmed_start_time: None,
        };

        let view = announcement_view(&recruitment, self.config.capacity);
        let reference = self
            .publisher
            .publish(&recruitment.channel, &view)
            .map_err(RecruitError::AnnouncementFailed)?;

        let id = RecruitmentId(reference.0);
        recruitment.id = id.clone();

        let mut guard = self.recruitments.lock().expect("registry mutex poisoned");
        guard.insert(id.clone(), recruitment);
        info!(
            recruitment = %id.0,
            content = content_kind.label(),
            host = host_name,
            "recruitment opened"
        );
        Ok(id)
    }

    /// Sign an identity up, optionally adding a desired role. Adding a role the
    /// applicant already desires is a no-op, not an error.
    pub fn add_applicant(
        &self,
        id: &RecruitmentId,
        identity: UserId,
        display_name: &str,
        desired_role: Option<Role>,
    ) -> Result<String, RecruitError> {
        self.mutate_open(id, |recruitment| {
            let applicant = upsert_applicant(recruitment, identity.clone(), display_name);
            if let Some(role) = desired_role {
                applicant.desired_roles.insert(role);
            }
            Ok(match desired_role {
                Some(role) => format!("{display_name} signed up for the {} role", role.label()),
                None => format!("{display_name} signed up"),
            })
        })
    }

    /// Record or replace an applicant's content vote.
    pub fn set_content_preference(
        &self,
        id: &RecruitmentId,
        identity: UserId,
        display_name: &str,
        preference: ContentPreference,
    ) -> Result<String, RecruitError> {
        self.mutate_open(id, |recruitment| {
            let applicant = upsert_applicant(recruitment, identity.clone(), display_name);
            applicant.content_preference = Some(preference);
            Ok(format!(
                "{display_name} voted for {}",
                preference.label()
            ))
        })
    }

    /// Record or replace the time of day an applicant becomes free.
    pub fn set_availability(
        &self,
        id: &RecruitmentId,
        identity: UserId,
        display_name: &str,
        time_of_day: &str,
    ) -> Result<String, RecruitError> {
        let available_from = parse_time_of_day(time_of_day)?;
        self.mutate_open(id, |recruitment| {
            let applicant = upsert_applicant(recruitment, identity.clone(), display_name);
            applicant.available_from = Some(available_from);
            Ok(format!(
                "{display_name} is available from {}",
                available_from.format("%H:%M")
            ))
        })
    }

    /// Remove an applicant. The host may not withdraw from their own recruitment.
    pub fn withdraw(&self, id: &RecruitmentId, identity: &UserId) -> Result<String, RecruitError> {
        self.mutate_open(id, |recruitment| {
            if *identity == recruitment.host_id {
                return Err(RecruitError::HostCannotWithdraw);
            }
            let applicant = recruitment
                .applicants
                .remove(identity)
                .ok_or(RecruitError::NotAnApplicant)?;
            Ok(format!("{} withdrew", applicant.display_name))
        })
    }

    /// Host-only: fix the content of a by-vote recruitment ahead of the close.
    pub fn confirm_content(
        &self,
        id: &RecruitmentId,
        host: &UserId,
        choice: ContentChoice,
    ) -> Result<String, RecruitError> {
        self.mutate_open(id, |recruitment| {
            if *host != recruitment.host_id {
                return Err(RecruitError::NotHost);
            }
            recruitment.confirmed_content = Some(choice);
            Ok(format!("content confirmed as {}", choice.label()))
        })
    }

    /// Host-only: close the recruitment, resolve the start time, draw the roster,
    /// and assign roles. The status flip is the first write, performed under the
    /// registry lock before any publisher call, which makes the close single-flight.
    pub fn close(&self, id: &RecruitmentId, host: &UserId) -> Result<CloseOutcome, RecruitError> {
        let (outcome, channel, live_view, results, fairness) = {
            let mut guard = self.recruitments.lock().expect("registry mutex poisoned");
            let recruitment = guard.get_mut(id).ok_or(RecruitError::NotFound)?;
            if recruitment.is_closed() {
                return Err(RecruitError::AlreadyClosed);
            }
            if *host != recruitment.host_id {
                return Err(RecruitError::NotHost);
            }

            recruitment.status = RecruitmentStatus::Closed;

            if recruitment.content_kind == ContentKind::ByVote
                && recruitment.confirmed_content.is_none()
            {
                recruitment.confirmed_content = Some(resolve_content_vote(recruitment));
            }

            let selection = {
                let mut rng = self.rng.lock().expect("rng mutex poisoned");
                selection::run(recruitment, self.ledger.as_ref(), &self.config, &mut *rng)
            };

            recruitment.confirmed_start_time = Some(selection.confirmed_start_time);
            recruitment.selected_roster = selection.roster.clone();
            recruitment.waiting_list = selection.waiting_list.clone();
            for (identity, role) in &selection.assignments {
                if let Some(applicant) = recruitment.applicants.get_mut(identity) {
                    applicant.assigned_role = Some(*role);
                }
            }

            let over_capacity = recruitment.applicants.len() > self.config.capacity;
            let outcome = CloseOutcome {
                confirmed_content: recruitment.confirmed_content,
                confirmed_start_time: selection.confirmed_start_time,
                roster: selection.roster,
                waiting_list: selection.waiting_list,
                assignments: selection.assignments,
                message: "recruitment closed and the roster confirmed".to_string(),
            };
            (
                outcome,
                recruitment.channel.clone(),
                announcement_view(recruitment, self.config.capacity),
                result_view(recruitment),
                over_capacity.then(|| fairness_notice(self.config.capacity)),
            )
        };

        // Delivery failures after the state is committed are logged, not surfaced;
        // the close itself already happened.
        self.refresh_announcement(id, &channel, &live_view);
        if let Err(err) = self.publisher.announce_results(&channel, &results) {
            error!(recruitment = %id.0, error = %err, "results announcement failed");
        }
        if let Some(text) = fairness {
            if let Err(err) = self.publisher.notice(&channel, &text) {
                error!(recruitment = %id.0, error = %err, "fairness notice failed");
            }
        }

        info!(
            recruitment = %id.0,
            roster = outcome.roster.len(),
            waiting = outcome.waiting_list.len(),
            start = %outcome.confirmed_start_time.format("%H:%M"),
            "recruitment closed"
        );
        Ok(outcome)
    }

    /// Deterministic render input for the live announcement.
    pub fn announcement(&self, id: &RecruitmentId) -> Result<AnnouncementView, RecruitError> {
        let guard = self.recruitments.lock().expect("registry mutex poisoned");
        let recruitment = guard.get(id).ok_or(RecruitError::NotFound)?;
        Ok(announcement_view(recruitment, self.config.capacity))
    }

    /// Copy of the current entity state, mainly for tests and diagnostics.
    pub fn snapshot(&self, id: &RecruitmentId) -> Option<Recruitment> {
        let guard = self.recruitments.lock().expect("registry mutex poisoned");
        guard.get(id).cloned()
    }

    /// Run a guarded mutation on an open recruitment, then refresh the live
    /// announcement. Refresh failures are logged and swallowed; the mutation has
    /// already been applied.
    fn mutate_open<T>(
        &self,
        id: &RecruitmentId,
        mutate: impl FnOnce(&mut Recruitment) -> Result<T, RecruitError>,
    ) -> Result<T, RecruitError> {
        let (value, channel, view) = {
            let mut guard = self.recruitments.lock().expect("registry mutex poisoned");
            let recruitment = guard.get_mut(id).ok_or(RecruitError::NotFound)?;
            if recruitment.is_closed() {
                return Err(RecruitError::AlreadyClosed);
            }
            let value = mutate(recruitment)?;
            (
                value,
                recruitment.channel.clone(),
                announcement_view(recruitment, self.config.capacity),
            )
        };
        self.refresh_announcement(id, &channel, &view);
        Ok(value)
    }

    fn refresh_announcement(&self, id: &RecruitmentId, channel: &ChannelRef, view: &AnnouncementView) {
        if let Err(err) = self.publisher.refresh(channel, id, view) {
            warn!(recruitment = %id.0, error = %err, "announcement refresh failed");
        }
    }
}

fn upsert_applicant<'a>(
    recruitment: &'a mut Recruitment,
    identity: UserId,
    display_name: &str,
) -> &'a mut Applicant {
    let joined_at = Local::now().naive_local();
    let applicant = recruitment
        .applicants
        .entry(identity.clone())
        .or_insert_with(|| Applicant::new(identity, display_name.to_string(), joined_at));
    applicant.display_name = display_name.to_string();
    applicant
}

/// Majority vote over stated preferences; `Any` votes are ignored and a tie goes
/// to Zenith.
fn resolve_content_vote(recruitment: &Recruitment) -> ContentChoice {
    let mut zenith = 0usize;
    let mut abyss = 0usize;
    for applicant in recruitment.applicants.values() {
        match applicant.content_preference {
            Some(ContentPreference::Zenith) => zenith += 1,
            Some(ContentPreference::Abyss) => abyss += 1,
            _ => {}
        }
    }
    if zenith >= abyss {
        ContentChoice::Zenith
    } else {
        ContentChoice::Abyss
    }
}

fn parse_time_of_day(raw: &str) -> Result<NaiveTime, RecruitError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|err| RecruitError::InvalidDateTime(format!("{raw}: {err}")))
}
