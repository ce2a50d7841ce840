use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::recruit::domain::{Applicant, ContentChoice, ContentPreference, Role, UserId};
use crate::recruit::ledger::{InMemoryParticipationLedger, ParticipationLedger};
use crate::recruit::selection::{
    assign_roles, lottery_weight, resolve_start_time, run, run_with_start, SelectionConfig,
};

use super::common::{push_applicant, recruitment_at, time, tomorrow, user};

fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

#[test]
fn start_time_moves_to_the_latest_stated_availability() {
    let mut recruitment = recruitment_at(tomorrow(), "18:00", "host");
    push_applicant(&mut recruitment, "host", &[Role::Fire], None);
    push_applicant(&mut recruitment, "alice", &[Role::Water], Some("19:00"));
    push_applicant(&mut recruitment, "bob", &[Role::Earth], Some("20:00"));

    let resolved = resolve_start_time(time("18:00"), &recruitment);
    assert_eq!(resolved, time("20:00"));
}

#[test]
fn start_time_stays_nominal_when_everyone_can_attend() {
    let mut recruitment = recruitment_at(tomorrow(), "21:00", "host");
    push_applicant(&mut recruitment, "host", &[Role::Fire], None);
    push_applicant(&mut recruitment, "alice", &[Role::Water], Some("19:00"));
    push_applicant(&mut recruitment, "bob", &[Role::Earth], Some("20:30"));

    let resolved = resolve_start_time(time("21:00"), &recruitment);
    assert_eq!(resolved, time("21:00"));
}

#[test]
fn start_time_picks_the_earliest_candidate_everyone_can_make() {
    // Candidates are 19:00, 20:00 and 20:30 in ascending order; only 20:30
    // satisfies alice, so the walk settles there.
    let mut recruitment = recruitment_at(tomorrow(), "19:00", "host");
    push_applicant(&mut recruitment, "host", &[Role::Fire], Some("20:00"));
    push_applicant(&mut recruitment, "alice", &[Role::Water], Some("20:30"));

    let resolved = resolve_start_time(time("19:00"), &recruitment);
    assert_eq!(resolved, time("20:30"));
}

#[test]
fn an_early_availability_pulls_the_start_before_the_announced_time() {
    // Applicants without a stated availability count as compatible with any
    // candidate, so alice's 18:00 beats the announced 20:00.
    let mut recruitment = recruitment_at(tomorrow(), "20:00", "host");
    push_applicant(&mut recruitment, "host", &[Role::Fire], None);
    push_applicant(&mut recruitment, "alice", &[Role::Water], Some("18:00"));

    let resolved = resolve_start_time(time("20:00"), &recruitment);
    assert_eq!(resolved, time("18:00"));
}

#[test]
fn everyone_fits_when_applicants_do_not_exceed_capacity() {
    let mut recruitment = recruitment_at(tomorrow(), "20:00", "host");
    push_applicant(&mut recruitment, "host", &[Role::Fire], None);
    push_applicant(&mut recruitment, "alice", &[Role::Water], None);
    push_applicant(&mut recruitment, "bob", &[Role::Earth], None);

    let ledger = InMemoryParticipationLedger::new();
    let outcome = run(&recruitment, &ledger, &SelectionConfig::default(), &mut rng(7));

    assert_eq!(outcome.roster.len(), 3);
    assert!(outcome.waiting_list.is_empty());
    assert!(outcome.roster.contains(&user("host")));
    assert!(outcome.roster.contains(&user("alice")));
    assert!(outcome.roster.contains(&user("bob")));
}

#[test]
fn over_capacity_partitions_into_roster_and_waiting_list() {
    let mut recruitment = recruitment_at(tomorrow(), "20:00", "host");
    push_applicant(&mut recruitment, "host", &[Role::Fire], None);
    for name in ["a", "b", "c", "d", "e", "f", "g"] {
        push_applicant(&mut recruitment, name, &[], None);
    }

    let ledger = InMemoryParticipationLedger::new();
    let config = SelectionConfig::default();
    let outcome = run(&recruitment, &ledger, &config, &mut rng(11));

    assert_eq!(outcome.roster.len(), config.capacity);
    assert_eq!(outcome.waiting_list.len(), 8 - config.capacity);
    // The host never enters the lottery.
    assert_eq!(outcome.roster[0], user("host"));
    assert!(!outcome.waiting_list.contains(&user("host")));
    // Roster and waiting list are disjoint and cover every applicant.
    for identity in &outcome.waiting_list {
        assert!(!outcome.roster.contains(identity));
    }
}

#[test]
fn same_seed_draws_the_same_roster() {
    let mut recruitment = recruitment_at(tomorrow(), "20:00", "host");
    push_applicant(&mut recruitment, "host", &[], None);
    for name in ["a", "b", "c", "d", "e", "f", "g", "h"] {
        push_applicant(&mut recruitment, name, &[], None);
    }

    let config = SelectionConfig::default();
    let first = run(
        &recruitment,
        &InMemoryParticipationLedger::new(),
        &config,
        &mut rng(42),
    );
    let second = run(
        &recruitment,
        &InMemoryParticipationLedger::new(),
        &config,
        &mut rng(42),
    );
    assert_eq!(first, second);
}

#[test]
fn applicant_available_after_the_forced_start_is_dropped_entirely() {
    let mut recruitment = recruitment_at(tomorrow(), "19:00", "host");
    push_applicant(&mut recruitment, "host", &[Role::Fire], None);
    push_applicant(&mut recruitment, "alice", &[Role::Water], None);
    push_applicant(&mut recruitment, "late", &[Role::Earth], Some("19:30"));

    let ledger = InMemoryParticipationLedger::new();
    let outcome = run_with_start(
        &recruitment,
        time("19:00"),
        &ledger,
        &SelectionConfig::default(),
        &mut rng(3),
    );

    assert!(!outcome.roster.contains(&user("late")));
    assert!(!outcome.waiting_list.contains(&user("late")));
    assert_eq!(ledger.daily_count(tomorrow(), &user("late")), 0);
}

#[test]
fn host_incompatible_with_the_forced_start_is_excluded() {
    let mut recruitment = recruitment_at(tomorrow(), "19:00", "host");
    push_applicant(&mut recruitment, "host", &[Role::Fire], Some("21:00"));
    push_applicant(&mut recruitment, "alice", &[Role::Water], None);

    let ledger = InMemoryParticipationLedger::new();
    let outcome = run_with_start(
        &recruitment,
        time("19:00"),
        &ledger,
        &SelectionConfig::default(),
        &mut rng(3),
    );

    assert!(!outcome.roster.contains(&user("host")));
    assert!(!outcome.waiting_list.contains(&user("host")));
    assert_eq!(outcome.roster, vec![user("alice")]);
}

#[test]
fn roster_members_are_recorded_exactly_once() {
    let mut recruitment = recruitment_at(tomorrow(), "20:00", "host");
    push_applicant(&mut recruitment, "host", &[], None);
    push_applicant(&mut recruitment, "alice", &[], None);

    let ledger = InMemoryParticipationLedger::new();
    let outcome = run(&recruitment, &ledger, &SelectionConfig::default(), &mut rng(5));

    for identity in &outcome.roster {
        assert_eq!(ledger.daily_count(tomorrow(), identity), 1);
    }
    assert_eq!(ledger.counts_for(tomorrow()).len(), outcome.roster.len());
}

#[test]
fn weight_decays_with_prior_selections() {
    let config = SelectionConfig::default();
    let start = recruitment_at(tomorrow(), "20:00", "host").start_time;
    let applicant = Applicant::new(user("alice"), "alice".to_string(), start);

    assert_eq!(lottery_weight(&applicant, None, 0, &config), 1.0);
    assert_eq!(lottery_weight(&applicant, None, 1, &config), 0.5);
    assert_eq!(lottery_weight(&applicant, None, 2, &config), 1.0 / 3.0);
}

#[test]
fn weight_penalizes_a_mismatched_content_vote() {
    let config = SelectionConfig::default();
    let start = recruitment_at(tomorrow(), "20:00", "host").start_time;
    let mut applicant = Applicant::new(user("alice"), "alice".to_string(), start);
    applicant.content_preference = Some(ContentPreference::Abyss);

    let penalized = lottery_weight(&applicant, Some(ContentChoice::Zenith), 0, &config);
    assert_eq!(penalized, config.content_mismatch_weight);

    // Matching and wildcard votes keep the full weight, as does no vote at all.
    let matched = lottery_weight(&applicant, Some(ContentChoice::Abyss), 0, &config);
    assert_eq!(matched, 1.0);
    applicant.content_preference = Some(ContentPreference::Any);
    assert_eq!(lottery_weight(&applicant, Some(ContentChoice::Zenith), 0, &config), 1.0);
    applicant.content_preference = None;
    assert_eq!(lottery_weight(&applicant, Some(ContentChoice::Zenith), 0, &config), 1.0);

    // Both effects compound.
    applicant.content_preference = Some(ContentPreference::Abyss);
    let compounded = lottery_weight(&applicant, Some(ContentChoice::Zenith), 1, &config);
    assert_eq!(compounded, 0.5 * config.content_mismatch_weight);
}

#[test]
fn a_fixed_kind_recruitment_penalizes_contrary_votes() {
    // The implied content of a fixed-kind recruitment drives the penalty the
    // same way a settled vote does.
    let config = SelectionConfig::default();
    let recruitment = recruitment_at(tomorrow(), "20:00", "host");
    let decided = recruitment.decided_content();
    assert_eq!(decided, Some(ContentChoice::Zenith));

    let mut applicant = Applicant::new(user("alice"), "alice".to_string(), recruitment.start_time);
    applicant.content_preference = Some(ContentPreference::Abyss);
    assert_eq!(
        lottery_weight(&applicant, decided, 0, &config),
        config.content_mismatch_weight
    );
}

#[test]
fn an_all_zero_weight_pool_fills_in_applicant_order() {
    // A zero mismatch penalty zeroes out every candidate when they all voted
    // against the decided content; the draw then degenerates to pool order.
    let mut recruitment = recruitment_at(tomorrow(), "20:00", "host");
    push_applicant(&mut recruitment, "host", &[], None);
    for name in ["a", "b", "c"] {
        push_applicant(&mut recruitment, name, &[], None);
        recruitment
            .applicants
            .get_mut(&user(name))
            .expect("applicant")
            .content_preference = Some(ContentPreference::Abyss);
    }

    let config = SelectionConfig {
        capacity: 3,
        content_mismatch_weight: 0.0,
    };
    let outcome = run(
        &recruitment,
        &InMemoryParticipationLedger::new(),
        &config,
        &mut rng(1),
    );

    assert_eq!(outcome.roster, vec![user("host"), user("a"), user("b")]);
    assert_eq!(outcome.waiting_list, vec![user("c")]);
}

fn applicants_with_desires(desires: &[(&str, &[Role])]) -> BTreeMap<UserId, Applicant> {
    let start = recruitment_at(tomorrow(), "20:00", "host").start_time;
    desires
        .iter()
        .map(|(name, roles)| {
            let identity = user(name);
            let mut applicant = Applicant::new(identity.clone(), name.to_string(), start);
            applicant.desired_roles = roles.iter().copied().collect();
            (identity, applicant)
        })
        .collect()
}

#[test]
fn each_member_holds_at_most_one_role_and_each_role_one_member() {
    let applicants = applicants_with_desires(&[
        ("a", &[Role::Fire, Role::Water]),
        ("b", &[Role::Fire, Role::Earth]),
        ("c", &[Role::Water, Role::Wind]),
        ("d", &[Role::Light]),
        ("e", &[]),
        ("f", &[Role::Dark, Role::Fire]),
    ]);
    let roster: Vec<UserId> = ["a", "b", "c", "d", "e", "f"].iter().map(|n| user(n)).collect();

    let assignments = assign_roles(&roster, &applicants);

    let mut seen_roles = Vec::new();
    for role in assignments.values() {
        assert!(!seen_roles.contains(role), "role {role:?} assigned twice");
        seen_roles.push(*role);
    }
    assert_eq!(assignments.len(), roster.len());
}

#[test]
fn a_singleton_winner_leaves_the_other_desire_lists() {
    // b is the sole desirer of fire, so fire is settled first and b drops out
    // of the water contest, leaving water to a uncontested.
    let applicants = applicants_with_desires(&[
        ("a", &[Role::Water]),
        ("b", &[Role::Fire, Role::Water]),
    ]);
    let roster: Vec<UserId> = [user("a"), user("b")].to_vec();

    let assignments = assign_roles(&roster, &applicants);

    assert_eq!(assignments.get(&user("b")), Some(&Role::Fire));
    assert_eq!(assignments.get(&user("a")), Some(&Role::Water));
}

#[test]
fn contested_pass_prefers_an_unassigned_desirer() {
    // Both want both roles. Fire goes to a; water then skips a, who already
    // holds a role, in favor of b.
    let applicants = applicants_with_desires(&[
        ("a", &[Role::Fire, Role::Water]),
        ("b", &[Role::Fire, Role::Water]),
    ]);
    let roster: Vec<UserId> = [user("a"), user("b")].to_vec();

    let assignments = assign_roles(&roster, &applicants);

    assert_eq!(assignments.get(&user("a")), Some(&Role::Fire));
    assert_eq!(assignments.get(&user("b")), Some(&Role::Water));
}

#[test]
fn reassignment_vacates_a_role_without_backfilling_it() {
    // Earth is a's alone, so a takes it and leaves the fire and water lists.
    // Fire then goes to b; water has only b left, so b is reassigned to water
    // and the fire slot b vacates is never revisited. Both members hold roles,
    // so the fallback pass has nobody to hand fire to.
    let applicants = applicants_with_desires(&[
        ("a", &[Role::Fire, Role::Water, Role::Earth]),
        ("b", &[Role::Fire, Role::Water]),
    ]);
    let roster: Vec<UserId> = [user("a"), user("b")].to_vec();

    let assignments = assign_roles(&roster, &applicants);

    assert_eq!(assignments.get(&user("a")), Some(&Role::Earth));
    assert_eq!(assignments.get(&user("b")), Some(&Role::Water));
    assert!(!assignments.values().any(|role| *role == Role::Fire));
}

#[test]
fn members_without_desires_fall_back_to_open_roles_in_order() {
    let applicants = applicants_with_desires(&[
        ("a", &[Role::Wind]),
        ("b", &[]),
        ("c", &[]),
    ]);
    let roster: Vec<UserId> = ["a", "b", "c"].iter().map(|n| user(n)).collect();

    let assignments = assign_roles(&roster, &applicants);

    assert_eq!(assignments.get(&user("a")), Some(&Role::Wind));
    // Open roles are walked fire-first; roster order decides who gets which.
    assert_eq!(assignments.get(&user("b")), Some(&Role::Fire));
    assert_eq!(assignments.get(&user("c")), Some(&Role::Water));
}
