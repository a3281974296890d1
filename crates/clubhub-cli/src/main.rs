//! ClubHub CLI - a command-line front end for the student club service.
//!
//! Every command builds one sync context, performs its reads or writes, then
//! prints whatever notifications the session raised before exiting.

use std::io;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clubhub_core::models::{AttendanceRecord, Club, ClubCategory, ClubEvent, Membership, MembershipStatus, Task};
use clubhub_core::notify::NotificationKind;
use clubhub_core::{CollectionView, Config, Mutation, SyncContext};

/// Set to a file name to also log into the cache directory (rotated daily)
const LOG_FILE_ENV: &str = "CLUBHUB_LOG_FILE";

const USAGE: &str = "\
Usage: clubhub <command> [args]

Account:
  login [email]            Sign in (password is prompted)
  logout                   Sign out and forget the stored credential
  whoami                   Show the signed-in user
  resend <email>           Resend the verification email
  forgot <email>           Send a password reset link

Clubs:
  clubs                    Browse clubs you are not part of, by category
  mine                     Clubs you belong to
  pending                  Clubs you asked to join
  join <club>              Ask to join a club
  cancel <club>            Withdraw a join request
  leave <club>             Leave a club

Officers:
  requests <club>          Pending join requests
  approve <club> <user>    Approve a join request
  reject <club> <user>     Reject a join request
  events <club>            Club events
  tasks <club>             Club tasks
  attendance <event>       Attendance for an event

Admin:
  metrics                  Dashboard counters
";

/// Initialize the tracing subscriber for logging
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=clubhub_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let mut guard = None;
    let file_layer = std::env::var(LOG_FILE_ENV)
        .ok()
        .filter(|name| !name.trim().is_empty())
        .and_then(|name| {
            let dir = config.cache_dir().ok()?;
            let (writer, worker) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
            guard = Some(worker);
            Some(fmt::layer().with_ansi(false).with_writer(writer))
        });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load()?;
    let _log_guard = init_tracing(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprint!("{}", USAGE);
        return Ok(());
    };
    if matches!(command, "help" | "-h" | "--help") {
        print!("{}", USAGE);
        return Ok(());
    }

    let ctx = SyncContext::from_config(&config)?;
    info!(command, api = %config.api_base_url, "ClubHub CLI starting");

    let result = run(&ctx, &mut config, command, &args[1..]).await;
    let reported = print_notifications(&ctx);
    match result {
        // Already shown as an error notification.
        Err(_) if reported => std::process::exit(1),
        other => other,
    }
}

async fn run(ctx: &SyncContext, config: &mut Config, command: &str, args: &[String]) -> Result<()> {
    match command {
        "login" => login(ctx, config, args.first()).await,
        "logout" => {
            ctx.auth().logout().await;
            println!("Signed out.");
            Ok(())
        }
        "whoami" => {
            let user = ctx.auth().current_user().await?;
            let verified = if user.is_verified() { "" } else { " (unverified)" };
            println!("{} <{}>, {}{}", user.name, user.email, user.role, verified);
            Ok(())
        }
        "resend" => {
            ctx.auth().resend_verification(arg(args, 0, "email")?).await?;
            println!("Verification email sent.");
            Ok(())
        }
        "forgot" => {
            ctx.auth().forgot_password(arg(args, 0, "email")?).await?;
            println!("Password reset link sent.");
            Ok(())
        }
        "clubs" => {
            print_directory(&ctx.directory().await?);
            Ok(())
        }
        "mine" => list_clubs(ctx, CollectionView::your_clubs()).await,
        "pending" => list_clubs(ctx, CollectionView::pending_clubs()).await,
        "join" => mutate(ctx, Mutation::Join { club: id_arg(args, 0, "club")? }).await,
        "cancel" => mutate(ctx, Mutation::Cancel { club: id_arg(args, 0, "club")? }).await,
        "leave" => mutate(ctx, Mutation::Leave { club: id_arg(args, 0, "club")? }).await,
        "approve" | "reject" => {
            let status = if command == "approve" {
                MembershipStatus::Approved
            } else {
                MembershipStatus::Rejected
            };
            let mutation = Mutation::UpdateStatus {
                club: id_arg(args, 0, "club")?,
                user: id_arg(args, 1, "user")?,
                status,
            };
            mutate(ctx, mutation).await
        }
        "requests" => {
            let view = ctx.mount(CollectionView::<Membership>::club_requests(id_arg(args, 0, "club")?));
            let rows = loaded(ctx.load(&*view).await?.committed())?;
            if rows.is_empty() {
                println!("No pending requests.");
            }
            for m in rows {
                let name = m.user_name.as_deref().unwrap_or("(unknown)");
                let since = m.requested_at.as_deref().unwrap_or("");
                println!("{:>6}  {:<30} {}", m.user_id, name, since);
            }
            Ok(())
        }
        "events" => {
            let view = ctx.mount(CollectionView::<ClubEvent>::club_events(id_arg(args, 0, "club")?));
            for e in loaded(ctx.load(&*view).await?.committed())? {
                let when = e.starts_at.as_deref().unwrap_or("TBD");
                let place = e.location.as_deref().unwrap_or("");
                println!("{:>6}  {:<20} {:<30} {}", e.id, when, e.title, place);
            }
            Ok(())
        }
        "tasks" => {
            let view = ctx.mount(CollectionView::<Task>::club_tasks(id_arg(args, 0, "club")?));
            for t in loaded(ctx.load(&*view).await?.committed())? {
                let due = t.due_date.as_deref().unwrap_or("");
                println!("{:>6}  {:<12} {:<30} {}", t.id, t.status.to_string(), t.title, due);
            }
            Ok(())
        }
        "attendance" => {
            let view = ctx.mount(CollectionView::<AttendanceRecord>::event_attendance(id_arg(args, 0, "event")?));
            let records = loaded(ctx.load(&*view).await?.committed())?;
            for r in &records {
                let name = r.user_name.as_deref().unwrap_or("(unknown)");
                println!("{:>6}  {:<30} {}", r.user_id, name, r.status);
            }
            let (present, absent, excused) = AttendanceRecord::tally(&records);
            println!("\n{} present, {} absent, {} excused", present, absent, excused);
            Ok(())
        }
        "metrics" => {
            let metrics = ctx.admin_metrics().await?;
            println!("Users:            {}", metrics.total_users);
            println!("Clubs:            {}", metrics.total_clubs);
            println!("Pending requests: {}", metrics.pending_requests);
            println!("Upcoming events:  {}", metrics.upcoming_events);
            for (category, count) in &metrics.clubs_by_category {
                println!("  {:<16}{}", category, count);
            }
            Ok(())
        }
        other => bail!("Unknown command '{}'. Run 'clubhub help' for usage.", other),
    }
}

async fn login(ctx: &SyncContext, config: &mut Config, email: Option<&String>) -> Result<()> {
    let email = match email.cloned().or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => bail!("Usage: clubhub login <email>"),
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", email))
        .context("Failed to read password")?;

    let user = ctx.auth().login(&email, &password).await.map_err(|e| {
        if let Some(errors) = e.field_errors() {
            for (field, messages) in errors {
                eprintln!("  {}: {}", field, messages.join(" "));
            }
        }
        anyhow::anyhow!(e.user_message())
    })?;

    config.last_email = Some(email.clone());
    if let Err(e) = config.save() {
        tracing::warn!(error = %e, "Failed to remember email");
    }

    match user {
        Some(user) => println!("Signed in as {}.", user.name),
        None => println!("Signed in as {}.", email),
    }
    Ok(())
}

async fn mutate(ctx: &SyncContext, mutation: Mutation) -> Result<()> {
    ctx.mutate(&mutation).await?;
    Ok(())
}

async fn list_clubs(ctx: &SyncContext, view: CollectionView<Club>) -> Result<()> {
    let view = ctx.mount(view);
    let clubs = loaded(ctx.load(&*view).await?.committed())?;
    if clubs.is_empty() {
        println!("Nothing here yet.");
    }
    for club in clubs {
        println!("{:>6}  {:<30} {}", club.id, club.name, club.display_member_count());
    }
    Ok(())
}

fn print_directory(categories: &[ClubCategory]) {
    for category in categories.iter().filter(|c| !c.clubs.is_empty()) {
        println!("{}", category.display_name());
        for club in &category.clubs {
            println!("  {:>6}  {}", club.id, club.name);
        }
    }
}

/// Print pending notifications. Returns true if any of them was an error.
fn print_notifications(ctx: &SyncContext) -> bool {
    let mut any_error = false;
    for n in ctx.notifications().visible() {
        match n.kind {
            NotificationKind::Success => println!("[ok] {}: {}", n.title, n.body),
            NotificationKind::Error => {
                any_error = true;
                eprintln!("[error] {}: {}", n.title, n.body);
            }
        }
    }
    any_error
}

fn loaded<T>(items: Option<Vec<T>>) -> Result<Vec<T>> {
    items.ok_or_else(|| anyhow::anyhow!("Load was superseded"))
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .with_context(|| format!("Missing <{}> argument", name))
}

fn id_arg(args: &[String], index: usize, name: &str) -> Result<i64> {
    let raw = arg(args, index, name)?;
    raw.parse()
        .with_context(|| format!("<{}> must be a numeric id, got '{}'", name, raw))
}
