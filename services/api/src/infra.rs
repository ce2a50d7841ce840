use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use muster::recruit::{
    AnnounceError, AnnouncementPublisher, AnnouncementRef, AnnouncementView, ChannelRef,
    RecruitmentId, ResultView,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Publisher that delivers announcements to the service log. Stands in for a
/// chat integration; each publish mints a monotonic reference the registry
/// adopts as the recruitment id.
#[derive(Debug, Default)]
pub(crate) struct LogAnnouncementPublisher {
    sequence: AtomicU64,
}

impl AnnouncementPublisher for LogAnnouncementPublisher {
    fn publish(
        &self,
        channel: &ChannelRef,
        view: &AnnouncementView,
    ) -> Result<AnnouncementRef, AnnounceError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let reference = AnnouncementRef(format!("ann-{sequence:04}"));
        info!(
            channel = %channel.0,
            reference = %reference.0,
            title = %view.title,
            "announcement published"
        );
        Ok(reference)
    }

    fn refresh(
        &self,
        channel: &ChannelRef,
        id: &RecruitmentId,
        view: &AnnouncementView,
    ) -> Result<(), AnnounceError> {
        info!(
            channel = %channel.0,
            recruitment = %id.0,
            applicants = view.applicant_count,
            status = view.status.label(),
            "announcement refreshed"
        );
        Ok(())
    }

    fn announce_results(
        &self,
        channel: &ChannelRef,
        view: &ResultView,
    ) -> Result<(), AnnounceError> {
        info!(
            channel = %channel.0,
            title = %view.title,
            start = %view.start_time,
            "results announced"
        );
        Ok(())
    }

    fn notice(&self, channel: &ChannelRef, text: &str) -> Result<(), AnnounceError> {
        info!(channel = %channel.0, notice = text, "notice sent");
        Ok(())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
