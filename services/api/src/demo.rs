use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate};
use clap::Args;

use muster::error::AppError;
use muster::recruit::{
    ChannelRef, ContentKind, ContentPreference, InMemoryParticipationLedger, RecruitmentRegistry,
    Role, SelectionConfig, UserId,
};

use crate::infra::LogAnnouncementPublisher;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Event date (YYYY-MM-DD). Defaults to tomorrow.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// Nominal start time (HH:MM)
    #[arg(long, default_value = "21:00")]
    pub(crate) time: String,
    /// Number of synthetic sign-ups besides the host
    #[arg(long, default_value_t = 8)]
    pub(crate) applicants: usize,
    /// Roster capacity, host included
    #[arg(long, default_value_t = 6)]
    pub(crate) capacity: usize,
    /// Seed for the lottery draw; omit for a random draw
    #[arg(long)]
    pub(crate) seed: Option<u64>,
}

/// Walk one recruitment from announcement to close against an in-process
/// registry and print what a chat audience would see.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        date,
        time,
        applicants,
        capacity,
        seed,
    } = args;

    let date = date.unwrap_or_else(|| Local::now().date_naive() + Duration::days(1));
    let publisher = Arc::new(LogAnnouncementPublisher::default());
    let ledger = Arc::new(InMemoryParticipationLedger::new());
    let config = SelectionConfig {
        capacity,
        content_mismatch_weight: 0.5,
    };
    let registry = match seed {
        Some(seed) => RecruitmentRegistry::with_rng_seed(publisher, ledger, config, seed),
        None => RecruitmentRegistry::new(publisher, ledger, config),
    };

    println!("Raid muster demo");
    let host = UserId("host".to_string());
    let id = registry.open(
        ContentKind::ByVote,
        &date.format("%Y-%m-%d").to_string(),
        &time,
        host.clone(),
        "Hosta",
        ChannelRef("raids".to_string()),
        Some("demo recruitment".to_string()),
    )?;
    println!("- Opened recruitment {} for {date} at {time}", id.0);

    registry.add_applicant(&id, host.clone(), "Hosta", Some(Role::Fire))?;
    for index in 0..applicants {
        let identity = UserId(format!("player-{index}"));
        let display = format!("Player {index}");
        let role = Role::ALL[index % Role::ALL.len()];
        registry.add_applicant(&id, identity.clone(), &display, Some(role))?;
        if index % 3 == 0 {
            registry.set_availability(&id, identity.clone(), &display, "21:30")?;
        }
        let preference = match index % 3 {
            0 => ContentPreference::Zenith,
            1 => ContentPreference::Abyss,
            _ => ContentPreference::Any,
        };
        registry.set_content_preference(&id, identity, &display, preference)?;
    }
    println!("- {} sign-ups besides the host", applicants);

    let outcome = registry.close(&id, &host)?;
    let snapshot = registry
        .snapshot(&id)
        .ok_or(muster::recruit::RecruitError::NotFound)?;

    println!("\nResults");
    if let Some(content) = outcome.confirmed_content {
        println!("- Content settled by vote: {}", content.label());
    }
    println!(
        "- Confirmed start: {}",
        outcome.confirmed_start_time.format("%H:%M")
    );
    println!("- Roster ({} of {capacity} slots):", outcome.roster.len());
    for identity in &outcome.roster {
        let name = snapshot
            .applicants
            .get(identity)
            .map(|applicant| applicant.display_name.as_str())
            .unwrap_or(identity.0.as_str());
        match outcome.assignments.get(identity) {
            Some(role) => println!("  - {name}: {}", role.label()),
            None => println!("  - {name}: (no role)"),
        }
    }
    if outcome.waiting_list.is_empty() {
        println!("- Waiting list: empty");
    } else {
        println!("- Waiting list:");
        for identity in &outcome.waiting_list {
            let name = snapshot
                .applicants
                .get(identity)
                .map(|applicant| applicant.display_name.as_str())
                .unwrap_or(identity.0.as_str());
            println!("  - {name}");
        }
    }

    Ok(())
}
