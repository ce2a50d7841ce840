use std::collections::BTreeMap;

use chrono::NaiveTime;
use serde::Serialize;

use super::domain::{
    ContentKind, ContentPreference, Recruitment, RecruitmentStatus, Role,
};

/// Render input for the live announcement. A pure function of recruitment state,
/// so a renderer editing the message in place always produces the same output for
/// the same state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnouncementView {
    pub title: String,
    pub status: RecruitmentStatus,
    pub content_label: String,
    pub scheduled_date: String,
    pub scheduled_time: String,
    pub host_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub applicant_count: usize,
    pub capacity: usize,
    /// Per role: desirers while open, the single assignee once closed.
    pub role_table: Vec<RoleTableEntry>,
    /// Stated availabilities grouped by time, ascending.
    pub availability: Vec<AvailabilityEntry>,
    /// Content votes; present only while a by-vote recruitment is undecided.
    pub content_votes: Vec<ContentVoteEntry>,
    pub waiting_list: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_start_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleTableEntry {
    pub role: Role,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityEntry {
    pub from: String,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentVoteEntry {
    pub preference: ContentPreference,
    pub names: Vec<String>,
}

/// Render input for the one-shot results announcement sent at close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub title: String,
    pub content_label: String,
    pub scheduled_date: String,
    pub start_time: String,
    pub host_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub role_table: Vec<RoleTableEntry>,
    pub waiting_list: Vec<String>,
}

pub fn announcement_view(recruitment: &Recruitment, capacity: usize) -> AnnouncementView {
    let role_table = Role::ALL
        .iter()
        .map(|role| RoleTableEntry {
            role: *role,
            names: match recruitment.status {
                RecruitmentStatus::Open => recruitment
                    .applicants
                    .values()
                    .filter(|applicant| applicant.desired_roles.contains(role))
                    .map(|applicant| applicant.display_name.clone())
                    .collect(),
                RecruitmentStatus::Closed => recruitment
                    .applicants
                    .values()
                    .filter(|applicant| applicant.assigned_role == Some(*role))
                    .map(|applicant| applicant.display_name.clone())
                    .collect(),
            },
        })
        .collect();

    let mut by_time: BTreeMap<NaiveTime, Vec<String>> = BTreeMap::new();
    for applicant in recruitment.applicants.values() {
        if let Some(from) = applicant.available_from {
            by_time
                .entry(from)
                .or_default()
                .push(applicant.display_name.clone());
        }
    }
    let availability = by_time
        .into_iter()
        .map(|(from, names)| AvailabilityEntry {
            from: from.format("%H:%M").to_string(),
            names,
        })
        .collect();

    let content_votes = if recruitment.content_kind == ContentKind::ByVote
        && recruitment.confirmed_content.is_none()
    {
        [
            ContentPreference::Zenith,
            ContentPreference::Abyss,
            ContentPreference::Any,
        ]
        .iter()
        .map(|preference| ContentVoteEntry {
            preference: *preference,
            names: recruitment
                .applicants
                .values()
                .filter(|applicant| applicant.content_preference == Some(*preference))
                .map(|applicant| applicant.display_name.clone())
                .collect(),
        })
        .filter(|entry| !entry.names.is_empty())
        .collect()
    } else {
        Vec::new()
    };

    AnnouncementView {
        title: format!("[{}] recruitment", recruitment.content_label()),
        status: recruitment.status,
        content_label: recruitment.content_label().to_string(),
        scheduled_date: recruitment.start_time.format("%Y-%m-%d").to_string(),
        scheduled_time: recruitment.start_time.format("%H:%M").to_string(),
        host_name: recruitment.host_name.clone(),
        note: recruitment.note.clone(),
        applicant_count: recruitment.applicants.len(),
        capacity,
        role_table,
        availability,
        content_votes,
        waiting_list: waiting_names(recruitment),
        confirmed_start_time: recruitment
            .confirmed_start_time
            .map(|time| time.format("%H:%M").to_string()),
    }
}

pub fn result_view(recruitment: &Recruitment) -> ResultView {
    let start_time = recruitment
        .confirmed_start_time
        .unwrap_or_else(|| recruitment.start_time.time());

    ResultView {
        title: format!("[{}] recruitment results", recruitment.content_label()),
        content_label: recruitment.content_label().to_string(),
        scheduled_date: recruitment.start_time.format("%Y-%m-%d").to_string(),
        start_time: start_time.format("%H:%M").to_string(),
        host_name: recruitment.host_name.clone(),
        note: recruitment.note.clone(),
        role_table: Role::ALL
            .iter()
            .map(|role| RoleTableEntry {
                role: *role,
                names: recruitment
                    .applicants
                    .values()
                    .filter(|applicant| applicant.assigned_role == Some(*role))
                    .map(|applicant| applicant.display_name.clone())
                    .collect(),
            })
            .collect(),
        waiting_list: waiting_names(recruitment),
    }
}

/// Notice sent when more sign-ups arrived than the roster could take.
pub fn fairness_notice(capacity: usize) -> String {
    format!(
        "More than {capacity} players signed up, so {capacity} members including the host \
         were drawn fairly, favoring players selected less often that day."
    )
}

fn waiting_names(recruitment: &Recruitment) -> Vec<String> {
    recruitment
        .waiting_list
        .iter()
        .map(|identity| {
            recruitment
                .applicants
                .get(identity)
                .map(|applicant| applicant.display_name.clone())
                .unwrap_or_else(|| identity.0.clone())
        })
        .collect()
}
