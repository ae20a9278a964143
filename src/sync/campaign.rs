//! Campaign and donation document transforms.
//!
//! Pure functions over `serde_json::Value` so they can run against
//! whatever the local documents contain. Records that don't have the
//! expected shape are left alone.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Recompute `progress_percentage` for one campaign record.
///
/// Returns `false` (record untouched) when `goal` is missing or `<= 0`.
pub fn recompute_progress(campaign: &mut Value, now: DateTime<Utc>) -> bool {
    let Some(record) = campaign.as_object_mut() else {
        return false;
    };
    let Some(goal) = number(record.get("goal")).filter(|g| *g > 0.0) else {
        return false;
    };
    let raised = number(record.get("raised")).unwrap_or(0.0);

    let percentage = raised / goal * 100.0;
    record.insert(
        "progress_percentage".into(),
        Value::String(format!("{:.1}", percentage)),
    );
    record.insert(
        "synced_at".into(),
        Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeSummary {
    pub updated: usize,
    pub skipped: usize,
}

/// Recompute every record in a campaign list.
pub fn recompute_all(campaigns: &mut [Value], now: DateTime<Utc>) -> RecomputeSummary {
    let mut summary = RecomputeSummary::default();
    for campaign in campaigns {
        if recompute_progress(campaign, now) {
            summary.updated += 1;
        } else {
            summary.skipped += 1;
        }
    }
    summary
}

/// Per-campaign donation totals, written as the `donation_summary` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DonationSummary {
    pub refreshed_at: String,
    pub donation_count: usize,
    pub total_amount: f64,
    pub by_campaign: BTreeMap<String, f64>,
}

/// Total the donation ledger.
///
/// Entries with a `status` other than `succeeded` are ignored; entries
/// without a status are counted.
pub fn summarize_donations(donations: &[Value], now: DateTime<Utc>) -> DonationSummary {
    let mut summary = DonationSummary {
        refreshed_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        ..Default::default()
    };

    for donation in donations.iter().filter_map(Value::as_object) {
        if !is_settled(donation) {
            continue;
        }
        let Some(amount) = number(donation.get("amount")) else {
            continue;
        };
        let campaign = match donation.get("campaign_id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => "unassigned".to_string(),
        };

        summary.donation_count += 1;
        summary.total_amount += amount;
        *summary.by_campaign.entry(campaign).or_default() += amount;
    }

    summary
}

fn is_settled(donation: &Map<String, Value>) -> bool {
    match donation.get("status") {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s == "succeeded",
        Some(_) => false,
    }
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Extract the record list from a document that is either a bare array
/// or an object wrapping one under `key`.
pub fn records_mut<'a>(document: &'a mut Value, key: &str) -> Option<&'a mut Vec<Value>> {
    match document {
        Value::Array(records) => Some(records),
        Value::Object(map) => map.get_mut(key).and_then(Value::as_array_mut),
        _ => None,
    }
}
