use anyhow::{bail, Context};
use chrono::{Duration, Utc};
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use vc_service::{CreatePollRequest, Poll, PollId, TallyCorrection, Votechain, VotechainConfig};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = VotechainConfig::load_or_default(cli.config.as_deref())?;
    if let Some(state) = cli.state {
        config.storage.state_path = state;
    }
    let app = Votechain::open(config).context("cannot open state file")?;
    let format = cli.format;

    match cli.command {
        Command::User(args) => match args.action {
            UserAction::Add { name } => cmd_user_add(&app, &name, format),
            UserAction::List => cmd_user_list(&app, format),
        },
        Command::Poll(args) => match args.action {
            PollAction::Create(args) => cmd_poll_create(&app, args, format).await,
            PollAction::List { active } => cmd_poll_list(&app, active, format),
            PollAction::Show(args) => cmd_poll_show(&app, args.poll, format),
            PollAction::Close(args) => cmd_poll_close(&app, args.poll, format),
        },
        Command::Cast(args) => cmd_cast(&app, args, format),
        Command::History(args) => cmd_history(&app, args.poll, format),
        Command::Verify => cmd_verify(&app, format),
        Command::Reconcile(args) => cmd_reconcile(&app, args.poll, format),
        Command::Insights(args) => cmd_insights(&app, args.poll, format).await,
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_user_add(app: &Votechain, name: &str, format: OutputFormat) -> anyhow::Result<()> {
    let user = app.register_user(name)?;
    app.persist()?;
    match format {
        OutputFormat::Json => print_json(&user),
        OutputFormat::Text => {
            println!(
                "{} Registered {} as {}",
                "✓".green().bold(),
                user.display_name.bold(),
                user.id.to_string().yellow()
            );
            Ok(())
        }
    }
}

fn cmd_user_list(app: &Votechain, format: OutputFormat) -> anyhow::Result<()> {
    let users = app.users()?;
    match format {
        OutputFormat::Json => print_json(&users),
        OutputFormat::Text => {
            if users.is_empty() {
                println!("No users registered.");
            }
            for user in &users {
                let status = if user.active { "active".green() } else { "inactive".dimmed() };
                println!(
                    "{:>6}  {}  ({})",
                    user.id.to_string().yellow(),
                    user.display_name,
                    status
                );
            }
            Ok(())
        }
    }
}

async fn cmd_poll_create(
    app: &Votechain,
    args: CreateArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let start_time = args.starts.unwrap_or_else(Utc::now);
    let end_time = match args.ends {
        Some(end) => end,
        None => start_time + Duration::hours(args.hours),
    };
    let poll = app
        .lifecycle()
        .create_poll(CreatePollRequest {
            creator_id: args.creator,
            title: args.title,
            description: args.description,
            options: args.options,
            start_time,
            end_time,
            enhance_description: args.enhance,
        })
        .await?;
    app.persist()?;

    match format {
        OutputFormat::Json => print_json(&poll),
        OutputFormat::Text => {
            println!(
                "{} Created poll {}",
                "✓".green().bold(),
                poll.id.to_string().yellow().bold()
            );
            print_poll(&poll);
            Ok(())
        }
    }
}

fn cmd_poll_list(app: &Votechain, active: bool, format: OutputFormat) -> anyhow::Result<()> {
    let polls = if active {
        app.lifecycle().active_polls()?
    } else {
        app.lifecycle().list_polls()?
    };
    match format {
        OutputFormat::Json => print_json(&polls),
        OutputFormat::Text => {
            if polls.is_empty() {
                println!("No polls.");
            }
            let now = Utc::now();
            for poll in &polls {
                let state = if poll.is_open_at(now) { "open".green() } else { "closed".red() };
                println!(
                    "{:>6}  {}  [{}]  {} vote(s)",
                    poll.id.to_string().yellow(),
                    poll.title.bold(),
                    state,
                    poll.total_votes()
                );
            }
            Ok(())
        }
    }
}

fn cmd_poll_show(app: &Votechain, poll: PollId, format: OutputFormat) -> anyhow::Result<()> {
    let snapshot = app.coordinator().snapshot(poll)?;
    match format {
        OutputFormat::Json => print_json(&snapshot),
        OutputFormat::Text => {
            print_poll(&snapshot.poll);
            println!("  Blocks: {}", snapshot.blocks.len());
            if !snapshot.tallies_match() {
                println!(
                    "  {} cached tallies differ from the ledger; run `votechain reconcile {}`",
                    "!".red().bold(),
                    poll
                );
            }
            Ok(())
        }
    }
}

fn cmd_poll_close(app: &Votechain, poll: PollId, format: OutputFormat) -> anyhow::Result<()> {
    let poll = app.coordinator().close_poll(poll)?;
    app.persist()?;
    match format {
        OutputFormat::Json => print_json(&poll),
        OutputFormat::Text => {
            println!("{} Closed poll {}", "✓".green().bold(), poll.id.to_string().yellow());
            Ok(())
        }
    }
}

fn print_poll(poll: &Poll) {
    println!("  Title: {}", poll.title.bold());
    if !poll.description.is_empty() {
        println!("  Description: {}", poll.description);
    }
    if let Some(enhanced) = &poll.enhanced_description {
        println!("  Enhanced: {}", enhanced.cyan());
    }
    println!("  Creator: {}", poll.creator_id);
    println!("  Window: {} .. {}", poll.start_time.to_rfc3339(), poll.end_time.to_rfc3339());
    println!("  Active: {}", poll.active);
    for option in &poll.options {
        println!(
            "    {:>6}  {:<24} {}",
            option.id.to_string().yellow(),
            option.text,
            option.vote_count
        );
    }
}

fn cmd_cast(app: &Votechain, args: CastArgs, format: OutputFormat) -> anyhow::Result<()> {
    let block = app.coordinator().cast(args.user, args.poll, args.option)?;
    app.persist()?;
    match format {
        OutputFormat::Json => print_json(&block),
        OutputFormat::Text => {
            println!("{} Vote recorded", "✓".green().bold());
            println!("  Block: #{} {}", block.sequence, block.hash.to_string().dimmed());
            println!("  Previous: {}", block.previous_hash.short_hex().dimmed());
            println!("  Time: {}", block.timestamp.to_rfc3339());
            Ok(())
        }
    }
}

fn cmd_history(app: &Votechain, poll: PollId, format: OutputFormat) -> anyhow::Result<()> {
    // History itself tolerates unknown ids; the CLI reports them.
    app.lifecycle().get_poll(poll)?;
    let history = app.history().history_for(poll)?;
    match format {
        OutputFormat::Json => print_json(&history),
        OutputFormat::Text => {
            if history.is_empty() {
                println!("No votes in {}.", poll);
            }
            for entry in &history {
                println!(
                    "#{:<5} {}  {} → {}",
                    entry.sequence,
                    entry.timestamp.to_rfc3339().dimmed(),
                    entry.user_display_name.bold(),
                    entry.option_text.cyan()
                );
            }
            Ok(())
        }
    }
}

fn cmd_verify(app: &Votechain, format: OutputFormat) -> anyhow::Result<()> {
    let report = app.ledger().verify_report()?;
    match format {
        OutputFormat::Json => print_json(&json!({
            "valid": report.valid,
            "blocks_scanned": report.blocks_scanned,
            "first_broken": report.first_broken,
            "violation": report.violation.map(|v| v.to_string()),
            "head": report.head.map(|h| h.to_hex()),
        }))?,
        OutputFormat::Text => {
            if report.valid {
                println!("{} Ledger integrity verified", "✓".green().bold());
                println!("  Blocks: {}", report.blocks_scanned);
                if let Some(head) = report.head {
                    println!("  Head: {}", head.to_string().dimmed());
                }
            } else {
                println!("{} Ledger integrity check failed", "✗".red().bold());
                if let Some(violation) = &report.violation {
                    println!("  {}", violation.to_string().red());
                }
            }
        }
    }
    if let Some(index) = report.first_broken {
        bail!("ledger corrupted at block {index}");
    }
    Ok(())
}

fn cmd_reconcile(
    app: &Votechain,
    poll: Option<PollId>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let targets = match poll {
        Some(poll) => vec![poll],
        None => app.lifecycle().list_polls()?.into_iter().map(|p| p.id).collect(),
    };

    let mut changed: Vec<(PollId, Vec<TallyCorrection>)> = Vec::new();
    for poll in targets {
        let corrections = app.coordinator().reconcile(poll)?;
        if !corrections.is_empty() {
            changed.push((poll, corrections));
        }
    }
    if !changed.is_empty() {
        app.persist()?;
    }

    match format {
        OutputFormat::Json => print_json(
            &changed
                .iter()
                .map(|(poll, corrections)| json!({ "poll": poll, "corrections": corrections }))
                .collect::<Vec<_>>(),
        ),
        OutputFormat::Text => {
            if changed.is_empty() {
                println!("{} Tallies match the ledger", "✓".green().bold());
            }
            for (poll, corrections) in &changed {
                println!("{} {}", "Reconciled".yellow().bold(), poll);
                for c in corrections {
                    println!(
                        "    {:>6}  {} → {}",
                        c.option_id,
                        c.cached,
                        c.actual.to_string().green()
                    );
                }
            }
            Ok(())
        }
    }
}

async fn cmd_insights(app: &Votechain, poll: PollId, format: OutputFormat) -> anyhow::Result<()> {
    let text = app.insights().insights_for(poll).await?;
    match format {
        OutputFormat::Json => print_json(&json!({ "poll": poll, "insights": text })),
        OutputFormat::Text => {
            println!("{}", text);
            Ok(())
        }
    }
}
