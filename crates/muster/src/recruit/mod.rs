//! Recruitment lifecycle: wizard sessions, open sign-up, the close-time fair
//! lottery, and preference-based role assignment.
//!
//! All state lives in memory and is lost on restart. External delivery goes
//! through the [`registry::AnnouncementPublisher`] boundary; the registry hands it
//! fully rendered views and never exposes internal state.

pub mod domain;
pub mod ledger;
pub mod registry;
pub mod router;
pub mod selection;
pub mod session;
pub mod view;

#[cfg(test)]
mod tests;

pub use domain::{
    Applicant, ChannelRef, ContentChoice, ContentKind, ContentPreference, Recruitment,
    RecruitmentId, RecruitmentStatus, Role, UserId,
};
pub use ledger::{InMemoryParticipationLedger, ParticipationLedger};
pub use registry::{
    AnnounceError, AnnouncementPublisher, AnnouncementRef, CloseOutcome, RecruitError,
    RecruitmentRegistry,
};
pub use router::recruit_router;
pub use selection::{SelectionConfig, SelectionOutcome};
pub use session::{CalendarCursor, Session, SessionId, SessionStore, SessionUpdate, WizardStep};
pub use view::{announcement_view, fairness_notice, result_view, AnnouncementView, ResultView};
