use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use futures_util::{future, StreamExt};
use gatepass_checkout::{Countdown, PaymentConfirmation, StopReason, TransactionForm};
use gatepass_shared::{EventQuery, NewReview, PaymentMethod, ProofUpload, TransactionStatus};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::auth;
use crate::error::AppError;
use crate::render;
use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "gatepass", version, about = "Browse events and buy tickets from the terminal")]
pub struct Cli {
    /// Directory holding default.toml, {RUN_MODE}.toml and local.toml
    #[arg(long, global = true, default_value = "config")]
    pub config_dir: PathBuf,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "GATEPASS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "GATEPASS_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        referral_code: Option<String>,
    },
    Logout,
    Whoami,
    Events {
        #[command(subcommand)]
        command: EventsCommand,
    },
    Locations,
    Sections,
    Organizer {
        id: i64,
    },
    /// Create a transaction for an event
    Buy(BuyArgs),
    /// Upload a payment proof for a transaction
    Pay {
        transaction_id: i64,
        #[arg(long)]
        proof: PathBuf,
        /// Keep watching the transaction after uploading
        #[arg(long, default_value_t = false)]
        watch: bool,
    },
    /// Follow a transaction until it is confirmed
    Watch {
        transaction_id: i64,
        /// Poll even while the transaction is waiting for payment
        #[arg(long, default_value_t = false)]
        manual: bool,
    },
    Tickets,
    Review {
        event_id: i64,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,
        #[arg(long)]
        comment: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum EventsCommand {
    Search {
        keyword: String,
    },
    Filter(QueryArgs),
    Past(QueryArgs),
    Show {
        id: i64,
    },
}

#[derive(Debug, Args, Default)]
pub struct QueryArgs {
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub location: Option<i64>,
    #[arg(long)]
    pub organizer: Option<i64>,
    #[arg(long)]
    pub from: Option<NaiveDate>,
    #[arg(long)]
    pub to: Option<NaiveDate>,
    #[arg(long)]
    pub page: Option<u32>,
    #[arg(long)]
    pub limit: Option<u32>,
}

impl From<QueryArgs> for EventQuery {
    fn from(args: QueryArgs) -> Self {
        EventQuery {
            keyword: None,
            category: args.category,
            location_id: args.location,
            organizer_id: args.organizer,
            start_date: args.from,
            end_date: args.to,
            page: args.page,
            limit: args.limit,
        }
    }
}

#[derive(Debug, Args)]
pub struct BuyArgs {
    pub event_id: i64,
    #[arg(long, default_value_t = 1)]
    pub quantity: u32,
    /// Attendance date, required for multi-day events
    #[arg(long)]
    pub date: Option<NaiveDate>,
    #[arg(long, conflicts_with = "coupon")]
    pub voucher: Option<String>,
    #[arg(long)]
    pub coupon: Option<String>,
    #[arg(long, default_value_t = 0)]
    pub points: i64,
    /// bank_transfer, e_wallet or credit_card
    #[arg(long)]
    pub method: Option<PaymentMethod>,
}

fn output<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> Result<String, AppError> {
    if json {
        Ok(serde_json::to_string_pretty(value).context("Failed to encode output")?)
    } else {
        Ok(text(value))
    }
}

pub async fn execute(command: Command, state: &AppState, json: bool) -> Result<String, AppError> {
    match command {
        Command::Login { email, password } => {
            let session = auth::login(state, &email, &password).await?;
            output(json, &session.user, |user| format!("Logged in as {}", render::profile(user)))
        }
        Command::Register {
            name,
            email,
            password,
            referral_code,
        } => {
            let profile = auth::register(state, &name, &email, &password, referral_code).await?;
            output(json, &profile, |p| format!("Account created for {}. Run `gatepass login` next.", p.email))
        }
        Command::Logout => {
            let had_session = auth::logout(state)?;
            let message = if had_session { "Logged out" } else { "No session was stored" };
            Ok(message.to_string())
        }
        Command::Whoami => match auth::current_session(state)? {
            Some(session) => output(json, &session.user, |_| render::session(&session)),
            None => Ok("Not logged in".to_string()),
        },
        Command::Events { command } => events(command, state, json).await,
        Command::Locations => {
            let locations = state.catalog().locations().await?;
            output(json, &locations, |l| render::locations(l))
        }
        Command::Sections => {
            let sections = state.catalog().sections().await?;
            output(json, &sections, |s| render::sections(s))
        }
        Command::Organizer { id } => {
            let organizer = state.catalog().organizer(id).await?;
            output(json, &organizer, render::organizer)
        }
        Command::Buy(args) => buy(args, state, json).await,
        Command::Pay {
            transaction_id,
            proof,
            watch,
        } => pay(transaction_id, &proof, watch, state, json).await,
        Command::Watch { transaction_id, manual } => {
            let mut controller = state.confirmation(transaction_id);
            controller.load().await?;
            controller.set_manual_polling(manual);
            follow(controller, json).await
        }
        Command::Tickets => {
            auth::require_session(state)?;
            let tickets = state.backend.list_tickets().await?;
            output(json, &tickets, |t| render::tickets(t))
        }
        Command::Review {
            event_id,
            rating,
            comment,
        } => {
            let review = NewReview {
                event_id,
                rating,
                comment,
            };
            review.validate().map_err(AppError::Usage)?;
            let created = state.backend.create_review(&review).await?;
            output(json, &created, |r| format!("Thanks! Review #{} posted ({} / 5)", r.id, r.rating))
        }
    }
}

async fn events(command: EventsCommand, state: &AppState, json: bool) -> Result<String, AppError> {
    let catalog = state.catalog();
    match command {
        EventsCommand::Search { keyword } => {
            let events = catalog.search(&keyword).await?;
            output(json, &events, |e| render::event_list(e))
        }
        EventsCommand::Filter(args) => {
            let events = catalog.filter(&args.into()).await?;
            output(json, &events, |e| render::event_list(e))
        }
        EventsCommand::Past(args) => {
            let events = catalog.past(&args.into()).await?;
            output(json, &events, |e| render::event_list(e))
        }
        EventsCommand::Show { id } => {
            let detail = catalog.detail(id).await?;
            let now = state.clock.now();
            output(json, &detail, |d| render::event_detail(d, now))
        }
    }
}

async fn buy(args: BuyArgs, state: &AppState, json: bool) -> Result<String, AppError> {
    let session = auth::require_session(state)?;
    let event = state.catalog().event(args.event_id).await?;

    let mut form = TransactionForm::new(event, state.rules.clone(), session.user.points, state.clock.clone());
    form.set_quantity(args.quantity);
    if let Some(date) = args.date {
        form.set_attend_date(date);
    }
    if let Some(code) = &args.voucher {
        form.enter_voucher(code);
        form.apply_discount(state.backend.as_ref()).await?;
    } else if let Some(code) = &args.coupon {
        form.enter_coupon(code);
        form.apply_discount(state.backend.as_ref()).await?;
    }
    form.set_points(args.points);
    form.set_payment_method(args.method);

    let tx = form.submit(state.backend.as_ref(), &state.store).await?;
    let breakdown = state.store.snapshot().await.breakdown;

    if tx.status == TransactionStatus::Confirmed {
        // Free purchases are confirmed at once; issue their tickets now
        let mut controller = state.confirmation(tx.id);
        controller.load().await?;
        let issued = controller.transaction().map(|t| t.tickets.len()).unwrap_or(0);
        let tx = controller.transaction().cloned().unwrap_or(tx);
        return output(json, &tx, |tx| {
            format!("{}\n{} tickets issued. See `gatepass tickets`.", render::transaction(tx, breakdown.as_ref(), None), issued)
        });
    }

    let countdown = Countdown::for_transaction(&tx, &state.rules).map(|c| c.render(state.clock.now()));
    output(json, &tx, |tx| {
        format!(
            "{}\nUpload your payment proof with `gatepass pay {} --proof <file>`",
            render::transaction(tx, breakdown.as_ref(), countdown.as_deref()),
            tx.id
        )
    })
}

async fn pay(transaction_id: i64, proof: &Path, watch: bool, state: &AppState, json: bool) -> Result<String, AppError> {
    let bytes = tokio::fs::read(proof)
        .await
        .with_context(|| format!("Failed to read {}", proof.display()))?;
    let file_name = proof
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::Usage(format!("{} is not a file", proof.display())))?;

    let mut controller = state.confirmation(transaction_id);
    controller.load().await?;
    let tx = controller.upload_proof(&ProofUpload::from_file_name(file_name, bytes)).await?;
    info!("Payment proof accepted for transaction {}", tx.id);

    if watch {
        return follow(controller, json).await;
    }
    output(json, &tx, |tx| {
        format!(
            "{}\nPayment proof uploaded. Run `gatepass watch {}` to follow the confirmation.",
            render::transaction(tx, None, controller.countdown_text().as_deref()),
            tx.id
        )
    })
}

/// Print status changes until the transaction settles or Ctrl-C
async fn follow(mut controller: PaymentConfirmation, json: bool) -> Result<String, AppError> {
    if let Some(tx) = controller.transaction() {
        println!("{}", render::transaction(tx, None, controller.countdown_text().as_deref()));
    }

    let events = BroadcastStream::new(controller.subscribe());
    let printer = tokio::spawn(async move {
        // Lagged receivers just skip the missed events
        let mut lines = events.filter_map(move |event| {
            future::ready(event.ok().and_then(|e| render::watch_line(&e, json)))
        });
        while let Some(line) = lines.next().await {
            println!("{}", line);
        }
    });

    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop.send(true);
        }
    });

    let reason = controller.run(shutdown).await;
    drop(controller);
    let _ = printer.await;

    match reason {
        StopReason::Failed(message) => Err(AppError::Anyhow(anyhow::anyhow!(message))),
        other => Ok(render::stop_reason(&other)),
    }
}
