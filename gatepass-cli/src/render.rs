use chrono::{DateTime, Utc};
use gatepass_catalog::EventDetail;
use gatepass_checkout::{ConfirmationEvent, StopReason};
use gatepass_shared::{
    Event, Location, Organizer, PriceBreakdown, Section, Session, Ticket, Transaction,
    TransactionStatus, UserProfile,
};
use std::fmt::Write;

/// `Rp 1.250.000`, or `Free` for zero
pub fn money(amount: i64) -> String {
    if amount == 0 {
        return "Free".to_string();
    }
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    if amount < 0 {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

pub fn status_label(status: TransactionStatus) -> &'static str {
    match status {
        TransactionStatus::WaitingForPayment => "Waiting for payment",
        TransactionStatus::WaitingForAdminConfirmation => "Waiting for confirmation",
        TransactionStatus::Confirmed => "Confirmed",
        TransactionStatus::Rejected => "Rejected",
        TransactionStatus::Expired => "Expired",
        TransactionStatus::Canceled => "Canceled",
    }
}

pub fn event_line(event: &Event) -> String {
    let seats = if event.is_sold_out() {
        "sold out".to_string()
    } else {
        format!("{} seats left", event.remaining_seats)
    };
    format!(
        "#{:<5} {}  {}  {} | {}",
        event.id,
        event.name,
        event.start_date.format("%Y-%m-%d"),
        money(event.price),
        seats
    )
}

pub fn event_list(events: &[Event]) -> String {
    if events.is_empty() {
        return "No events found".to_string();
    }
    events.iter().map(event_line).collect::<Vec<_>>().join("\n")
}

pub fn event_detail(detail: &EventDetail, now: DateTime<Utc>) -> String {
    let event = &detail.event;
    let mut out = String::new();
    let _ = writeln!(out, "{}", event.name);
    if let Some(category) = &event.category {
        let _ = writeln!(out, "Category:  {}", category);
    }
    let (first, last) = event.attend_window();
    if first == last {
        let _ = writeln!(out, "Date:      {}", first);
    } else {
        let _ = writeln!(out, "Dates:     {} to {}", first, last);
    }
    let _ = writeln!(out, "Venue:     {}", detail.venue_label());
    if let Some(organizer) = &detail.organizer {
        let _ = writeln!(out, "Organizer: {}", organizer.name);
    }
    let _ = writeln!(out, "Price:     {}", money(event.price));
    let _ = write!(out, "Seats:     {}", detail.seats_label());
    if event.has_ended(now) {
        out.push_str("\nThis event has ended");
    }
    if let Some(description) = event.description.as_deref().filter(|d| !d.trim().is_empty()) {
        let _ = write!(out, "\n\n{}", description.trim());
    }
    out
}

pub fn breakdown(b: &PriceBreakdown) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  {} x {} = {}", b.quantity, money(b.unit_price), money(b.subtotal));
    if b.voucher_discount > 0 {
        let _ = writeln!(out, "  Voucher   -{}", money(b.voucher_discount));
    }
    if b.coupon_discount > 0 {
        let _ = writeln!(out, "  Coupon    -{}", money(b.coupon_discount));
    }
    if b.points_used > 0 {
        let _ = writeln!(out, "  Points    -{}", money(b.points_used));
    }
    let _ = write!(out, "  Total     {}", money(b.total));
    out
}

pub fn transaction(tx: &Transaction, price: Option<&PriceBreakdown>, countdown: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Transaction #{} for event #{}", tx.id, tx.event_id);
    let _ = writeln!(out, "Status:    {}", status_label(tx.status));
    let _ = writeln!(out, "Attending: {}", tx.attend_date);
    if let Some(method) = tx.payment_method {
        let _ = writeln!(out, "Payment:   {}", method);
    }
    match price {
        Some(b) => {
            let _ = writeln!(out, "{}", breakdown(b));
        }
        None => {
            let _ = writeln!(out, "Total:     {}", money(tx.total_pay_amount));
        }
    }
    if let Some(countdown) = countdown {
        let label = match tx.status {
            TransactionStatus::WaitingForPayment => "Pay within",
            _ => "Confirmation due in",
        };
        let _ = writeln!(out, "{}: {}", label, countdown);
    }
    if !tx.tickets.is_empty() {
        let _ = writeln!(out, "Tickets:   {}", tx.tickets.len());
    }
    out.trim_end().to_string()
}

pub fn tickets(tickets: &[Ticket]) -> String {
    if tickets.is_empty() {
        return "You have no tickets yet".to_string();
    }
    tickets
        .iter()
        .map(|t| {
            let event = t.event_name.clone().unwrap_or_else(|| format!("event #{}", t.event_id));
            match t.attend_date {
                Some(date) => format!("{}  {}  {}", t.code, event, date),
                None => format!("{}  {}", t.code, event),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn profile(user: &UserProfile) -> String {
    let mut out = format!("{} <{}>", user.name, user.email);
    let _ = write!(out, "\nPoints: {}", user.points);
    if let Some(code) = &user.referral_code {
        let _ = write!(out, "\nReferral code: {}", code);
    }
    out
}

pub fn session(session: &Session) -> String {
    format!("Logged in as {}", profile(&session.user))
}

pub fn locations(locations: &[Location]) -> String {
    locations
        .iter()
        .map(|l| match &l.city {
            Some(city) => format!("#{:<4} {}, {}", l.id, l.name, city),
            None => format!("#{:<4} {}", l.id, l.name),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn sections(sections: &[Section]) -> String {
    sections
        .iter()
        .map(|s| format!("#{:<4} {}", s.id, s.name))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn organizer(organizer: &Organizer) -> String {
    match &organizer.description {
        Some(description) => format!("{}\n{}", organizer.name, description),
        None => organizer.name.clone(),
    }
}

/// One line per event worth showing while watching. Countdown ticks are
/// skipped.
pub fn confirmation_event(event: &ConfirmationEvent) -> Option<String> {
    match event {
        ConfirmationEvent::Tick { .. } | ConfirmationEvent::Loaded(_) => None,
        ConfirmationEvent::StatusChanged(change) => Some(format!(
            "[{}] {} -> {}",
            change.observed_at.format("%H:%M:%S"),
            status_label(change.from),
            status_label(change.to)
        )),
        ConfirmationEvent::TicketsIssued(tickets) => Some(format!("{} tickets issued", tickets.len())),
        ConfirmationEvent::UploadFailed(message) => Some(format!("Upload failed: {}", message)),
        ConfirmationEvent::Navigate(route) => Some(format!("Payment confirmed, see {}", route.path())),
        ConfirmationEvent::PollingStopped(_) => None,
    }
}

/// Line printed by `watch`: JSON per event, or the text rendering
pub fn watch_line(event: &ConfirmationEvent, json: bool) -> Option<String> {
    if matches!(event, ConfirmationEvent::Tick { .. }) {
        return None;
    }
    if json {
        serde_json::to_string(event).ok()
    } else {
        confirmation_event(event)
    }
}

pub fn stop_reason(reason: &StopReason) -> String {
    match reason {
        StopReason::Navigated => "Payment confirmed. Your tickets are ready.".to_string(),
        StopReason::Terminal(status) => format!("Transaction is {}", status_label(*status).to_lowercase()),
        StopReason::AttemptsExhausted => "Stopped checking; run `gatepass watch` again later".to_string(),
        StopReason::Failed(message) => format!("Stopped checking: {}", message),
        StopReason::Shutdown => "Stopped watching".to_string(),
    }
}
