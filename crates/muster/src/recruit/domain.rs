use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Opaque identity supplied by the caller, e.g. a chat platform user id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier of a published recruitment. It is the announcement reference handed
/// back by the publisher, so a recruitment only gains an id once its announcement
/// exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecruitmentId(pub String);

/// Opaque reference to the channel the announcement lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef(pub String);

/// The six mutually exclusive raid roles. Every roster member ends up holding at
/// most one of them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Fire,
    Water,
    Earth,
    Wind,
    Light,
    Dark,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Fire,
        Role::Water,
        Role::Earth,
        Role::Wind,
        Role::Light,
        Role::Dark,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Role::Fire => "fire",
            Role::Water => "water",
            Role::Earth => "earth",
            Role::Wind => "wind",
            Role::Light => "light",
            Role::Dark => "dark",
        }
    }
}

/// What a recruitment runs. `ByVote` defers the decision to the applicants and is
/// resolved by majority when the recruitment closes (or earlier by the host).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Zenith,
    Abyss,
    ByVote,
}

impl ContentKind {
    pub const fn label(self) -> &'static str {
        match self {
            ContentKind::Zenith => "zenith",
            ContentKind::Abyss => "abyss",
            ContentKind::ByVote => "by_vote",
        }
    }
}

/// A concrete, runnable content. The host confirms one of these for `ByVote`
/// recruitments; fixed-kind recruitments imply theirs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentChoice {
    Zenith,
    Abyss,
}

impl ContentChoice {
    pub const fn label(self) -> &'static str {
        match self {
            ContentChoice::Zenith => "zenith",
            ContentChoice::Abyss => "abyss",
        }
    }
}

/// An applicant's stated content vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPreference {
    Zenith,
    Abyss,
    Any,
}

impl ContentPreference {
    /// Whether the vote is satisfied by the decided content. `Any` matches both.
    pub fn matches(self, choice: ContentChoice) -> bool {
        match (self, choice) {
            (ContentPreference::Any, _) => true,
            (ContentPreference::Zenith, ContentChoice::Zenith) => true,
            (ContentPreference::Abyss, ContentChoice::Abyss) => true,
            _ => false,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ContentPreference::Zenith => "zenith",
            ContentPreference::Abyss => "abyss",
            ContentPreference::Any => "any",
        }
    }
}

/// Lifecycle of a recruitment. The only transition is `Open` to `Closed`, exactly
/// once; applicants are immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecruitmentStatus {
    Open,
    Closed,
}

impl RecruitmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RecruitmentStatus::Open => "open",
            RecruitmentStatus::Closed => "closed",
        }
    }
}

/// One identity's sign-up state within a recruitment. Created on first contact and
/// updated in place by later interactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applicant {
    pub identity: UserId,
    pub display_name: String,
    pub desired_roles: BTreeSet<Role>,
    pub content_preference: Option<ContentPreference>,
    pub available_from: Option<NaiveTime>,
    pub assigned_role: Option<Role>,
    pub joined_at: NaiveDateTime,
}

impl Applicant {
    pub fn new(identity: UserId, display_name: String, joined_at: NaiveDateTime) -> Self {
        Self {
            identity,
            display_name,
            desired_roles: BTreeSet::new(),
            content_preference: None,
            available_from: None,
            assigned_role: None,
            joined_at,
        }
    }

    /// An applicant is compatible with a start time when they stated no
    /// availability, or become free at or before it.
    pub fn is_available_at(&self, start: NaiveTime) -> bool {
        self.available_from.map_or(true, |from| from <= start)
    }
}

/// A scheduled activity with open sign-up, closing into a fixed roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recruitment {
    pub id: RecruitmentId,
    pub content_kind: ContentKind,
    pub confirmed_content: Option<ContentChoice>,
    pub start_time: NaiveDateTime,
    pub host_id: UserId,
    pub host_name: String,
    pub channel: ChannelRef,
    pub note: Option<String>,
    pub status: RecruitmentStatus,
    pub applicants: BTreeMap<UserId, Applicant>,
    pub waiting_list: Vec<UserId>,
    pub selected_roster: Vec<UserId>,
    pub confirmed_start_time: Option<NaiveTime>,
}

impl Recruitment {
    /// The content the recruitment will actually run, if decided: the host- or
    /// vote-confirmed choice, or the fixed kind for non-vote recruitments.
    pub fn decided_content(&self) -> Option<ContentChoice> {
        self.confirmed_content.or(match self.content_kind {
            ContentKind::Zenith => Some(ContentChoice::Zenith),
            ContentKind::Abyss => Some(ContentChoice::Abyss),
            ContentKind::ByVote => None,
        })
    }

    /// Label shown in announcements: the decided content once known, otherwise the
    /// declared kind.
    pub fn content_label(&self) -> &'static str {
        self.decided_content()
            .map(ContentChoice::label)
            .unwrap_or(self.content_kind.label())
    }

    pub fn is_closed(&self) -> bool {
        self.status == RecruitmentStatus::Closed
    }
}
