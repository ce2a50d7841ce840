use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveTime;
use rand::Rng;
use tracing::{debug, warn};

use super::domain::{Applicant, Recruitment, Role, UserId};
use super::ledger::ParticipationLedger;

/// Tunables for the capacity-bounded fair lottery.
#[derive(Debug, Clone, Copy)]
pub struct SelectionConfig {
    /// Roster size, host slot included.
    pub capacity: usize,
    /// Weight multiplier for applicants whose content vote disagrees with the
    /// decided content.
    pub content_mismatch_weight: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            capacity: 6,
            content_mismatch_weight: 0.5,
        }
    }
}

/// Everything the close operation writes back: the resolved start time, the
/// roster, the applicants left waiting, and the role each roster member holds.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionOutcome {
    pub confirmed_start_time: NaiveTime,
    pub roster: Vec<UserId>,
    pub waiting_list: Vec<UserId>,
    pub assignments: BTreeMap<UserId, Role>,
}

/// Run the full selection over a closed recruitment snapshot: resolve the start
/// time, draw the roster, record participation, and assign roles.
///
/// The random source is injected so callers can seed it for reproducible draws.
pub fn run<L, R>(
    recruitment: &Recruitment,
    ledger: &L,
    config: &SelectionConfig,
    rng: &mut R,
) -> SelectionOutcome
where
    L: ParticipationLedger,
    R: Rng,
{
    let confirmed_start_time = resolve_start_time(recruitment.start_time.time(), recruitment);
    run_with_start(recruitment, confirmed_start_time, ledger, config, rng)
}

/// Phases B and C against an externally supplied start time. Eligibility, the
/// host's guaranteed slot, the lottery, and role assignment all follow from it.
pub fn run_with_start<L, R>(
    recruitment: &Recruitment,
    confirmed_start_time: NaiveTime,
    ledger: &L,
    config: &SelectionConfig,
    rng: &mut R,
) -> SelectionOutcome
where
    L: ParticipationLedger,
    R: Rng,
{
    let event_date = recruitment.start_time.date();

    // Eligibility is judged against the resolved time, host included: a host whose
    // own stated availability misses it drops out of the roster entirely. That is
    // longstanding behavior and kept as-is.
    let eligible: Vec<&Applicant> = recruitment
        .applicants
        .values()
        .filter(|applicant| applicant.is_available_at(confirmed_start_time))
        .collect();

    let mut roster: Vec<UserId> = Vec::new();
    if eligible
        .iter()
        .any(|applicant| applicant.identity == recruitment.host_id)
    {
        roster.push(recruitment.host_id.clone());
    }

    let candidates: Vec<&Applicant> = eligible
        .iter()
        .copied()
        .filter(|applicant| applicant.identity != recruitment.host_id)
        .collect();
    let remaining_slots = config.capacity.saturating_sub(roster.len());

    let mut waiting_list = Vec::new();
    if candidates.len() <= remaining_slots {
        roster.extend(candidates.iter().map(|applicant| applicant.identity.clone()));
    } else {
        let decided = recruitment.decided_content();
        let pool: Vec<(UserId, f64)> = candidates
            .iter()
            .map(|applicant| {
                let daily = ledger.daily_count(event_date, &applicant.identity);
                (
                    applicant.identity.clone(),
                    lottery_weight(applicant, decided, daily, config),
                )
            })
            .collect();

        let selected = draw_without_replacement(pool, remaining_slots, rng);
        waiting_list = candidates
            .iter()
            .map(|applicant| applicant.identity.clone())
            .filter(|identity| !selected.contains(identity))
            .collect();
        roster.extend(selected);
    }

    for identity in &roster {
        ledger.record(event_date, identity);
    }
    debug!(
        roster = roster.len(),
        waiting = waiting_list.len(),
        start = %confirmed_start_time.format("%H:%M"),
        "roster drawn"
    );

    let assignments = assign_roles(&roster, &recruitment.applicants);
    let unassigned: Vec<&UserId> = roster
        .iter()
        .filter(|identity| !assignments.contains_key(*identity))
        .collect();
    if !unassigned.is_empty() {
        warn!(?unassigned, "roster members left without a role");
    }

    SelectionOutcome {
        confirmed_start_time,
        roster,
        waiting_list,
        assignments,
    }
}

/// Earliest start time at which every applicant can attend.
///
/// Candidates are the nominal start time plus every stated availability, walked in
/// ascending order; the first one compatible with the whole applicant pool wins.
/// Falls back to the nominal time when no candidate qualifies, which only happens
/// on malformed data.
///
/// Applicants with no stated availability are compatible with every candidate,
/// including ones earlier than the nominal start, so a single stated
/// availability before the announced time pulls the whole event forward.
pub fn resolve_start_time(nominal: NaiveTime, recruitment: &Recruitment) -> NaiveTime {
    let mut candidates: BTreeSet<NaiveTime> = BTreeSet::new();
    candidates.insert(nominal);
    candidates.extend(
        recruitment
            .applicants
            .values()
            .filter_map(|applicant| applicant.available_from),
    );

    let total = recruitment.applicants.len();
    for candidate in candidates {
        let compatible = recruitment
            .applicants
            .values()
            .filter(|applicant| applicant.is_available_at(candidate))
            .count();
        if compatible >= total {
            return candidate;
        }
    }
    nominal
}

/// Lottery weight for one candidate. One prior selection that day halves the
/// weight, two thirds it; a content vote that disagrees with the decided content
/// applies the configured penalty on top.
///
/// The decided content includes the one a fixed content kind implies, so a
/// contrary vote is penalized in fixed recruitments, not just settled by-vote
/// ones.
pub(crate) fn lottery_weight(
    applicant: &Applicant,
    decided: Option<super::domain::ContentChoice>,
    daily_count: u32,
    config: &SelectionConfig,
) -> f64 {
    let mut weight = 1.0 / f64::from(daily_count + 1);
    if let (Some(choice), Some(preference)) = (decided, applicant.content_preference) {
        if !preference.matches(choice) {
            weight *= config.content_mismatch_weight;
        }
    }
    weight
}

/// Weighted sampling without replacement: each round draws uniformly in
/// `[0, total_weight)` and picks the entry whose cumulative weight first reaches
/// the draw, then removes it from the pool.
fn draw_without_replacement<R: Rng>(
    mut pool: Vec<(UserId, f64)>,
    count: usize,
    rng: &mut R,
) -> Vec<UserId> {
    let mut selected = Vec::with_capacity(count);
    while selected.len() < count && !pool.is_empty() {
        let total: f64 = pool.iter().map(|(_, weight)| weight).sum();
        if total <= 0.0 {
            // Every remaining weight is zero (a zero mismatch penalty can do
            // that); take entries in pool order.
            let (identity, _) = pool.remove(0);
            selected.push(identity);
            continue;
        }
        let draw = rng.gen_range(0.0..total);

        let mut cumulative = 0.0;
        // Numeric edge: if rounding keeps the cumulative sum below the draw, the
        // last entry wins.
        let mut index = pool.len() - 1;
        for (i, (_, weight)) in pool.iter().enumerate() {
            cumulative += weight;
            if draw <= cumulative {
                index = i;
                break;
            }
        }

        let (identity, _) = pool.remove(index);
        selected.push(identity);
    }
    selected
}

/// Preference-based role assignment over the final roster, in three passes.
///
/// 1. Singleton: a role wanted by exactly one member goes to that member, locking
///    them out of every other desire list.
/// 2. Contested: each still-open role prefers an unassigned desirer; when all of
///    its desirers already hold a role, the first one is reassigned and the role
///    they vacate stays open. Vacated roles are not revisited within the pass, so
///    one can stay empty even though a willing member exists. Known limitation,
///    kept deliberately.
/// 3. Fallback: leftover roles are paired with leftover members in fixed order.
///
/// Best-effort by design, not a matching-theory optimum.
pub fn assign_roles(
    roster: &[UserId],
    applicants: &BTreeMap<UserId, Applicant>,
) -> BTreeMap<UserId, Role> {
    // Desire lists keep roster order, so "first in the list" is deterministic.
    let mut desires: BTreeMap<Role, Vec<UserId>> =
        Role::ALL.iter().map(|role| (*role, Vec::new())).collect();
    for identity in roster {
        if let Some(applicant) = applicants.get(identity) {
            for role in &applicant.desired_roles {
                desires
                    .get_mut(role)
                    .expect("all roles initialized")
                    .push(identity.clone());
            }
        }
    }

    let mut assigned: BTreeMap<UserId, Role> = BTreeMap::new();
    let mut holders: BTreeMap<Role, UserId> = BTreeMap::new();

    // Singleton pass.
    for role in Role::ALL {
        let member = match desires[&role].as_slice() {
            [single] => single.clone(),
            _ => continue,
        };
        if assigned.contains_key(&member) {
            continue;
        }
        assigned.insert(member.clone(), role);
        holders.insert(role, member.clone());
        for (other, list) in desires.iter_mut() {
            if *other != role {
                list.retain(|identity| identity != &member);
            }
        }
    }

    // Contested pass.
    for role in Role::ALL {
        if holders.contains_key(&role) {
            continue;
        }
        let list = desires[&role].clone();
        if list.is_empty() {
            continue;
        }
        let member = list
            .iter()
            .find(|identity| !assigned.contains_key(*identity))
            .cloned()
            .unwrap_or_else(|| list[0].clone());
        if let Some(vacated) = assigned.insert(member.clone(), role) {
            holders.remove(&vacated);
        }
        holders.insert(role, member);
    }

    // Fallback pass.
    let free: Vec<UserId> = roster
        .iter()
        .filter(|identity| !assigned.contains_key(*identity))
        .cloned()
        .collect();
    let mut free_members = free.into_iter();
    for role in Role::ALL {
        if holders.contains_key(&role) {
            continue;
        }
        let Some(member) = free_members.next() else {
            break;
        };
        assigned.insert(member.clone(), role);
        holders.insert(role, member);
    }

    assigned
}
