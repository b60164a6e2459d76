//! Order-timing analyzer — weekday and hour-of-day buckets.
//!
//! Every dated order lands in one weekday bucket (0=Sunday..6=Saturday),
//! one of four named time-of-day bands, and one of 24 hourly buckets.
//! Undated orders are excluded from every bucket AND from the percentage
//! denominator, so bucket counts always sum to the dated-order total.

use crate::model::Order;
use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

const WEEKDAY_LABELS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// (label, first hour, last hour) — inclusive bands covering 0..=23.
const TIME_BANDS: [(&str, u32, u32); 4] = [
    ("Night", 0, 5),
    ("Morning", 6, 11),
    ("Afternoon", 12, 17),
    ("Evening", 18, 23),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingBucket {
    pub label:           String,
    pub order_count:     i64,
    pub revenue:         f64,
    pub avg_order_value: f64,
    /// Share of all dated orders, 0–100.
    pub percentage:      f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekdayBucket {
    /// 0 = Sunday .. 6 = Saturday.
    pub weekday: u32,
    #[serde(flatten)]
    pub stats:   TimingBucket,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourBucket {
    pub hour:  u32,
    #[serde(flatten)]
    pub stats: TimingBucket,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderTimingData {
    pub weekdays:    Vec<WeekdayBucket>,
    pub time_bands:  Vec<TimingBucket>,
    pub hours:       Vec<HourBucket>,
    pub best_days:   Vec<WeekdayBucket>,
    pub worst_days:  Vec<WeekdayBucket>,
    pub best_hours:  Vec<HourBucket>,
    pub worst_hours: Vec<HourBucket>,
}

pub fn analyze(orders: &[Order]) -> OrderTimingData {
    let mut weekday_counts = [(0i64, 0.0f64); 7];
    let mut hour_counts = [(0i64, 0.0f64); 24];
    let mut total = 0i64;

    for order in orders {
        let Some(date) = order.date_created else {
            continue;
        };
        let weekday = date.weekday().num_days_from_sunday() as usize;
        let hour = date.hour() as usize;

        weekday_counts[weekday].0 += 1;
        weekday_counts[weekday].1 += order.total;
        hour_counts[hour].0 += 1;
        hour_counts[hour].1 += order.total;
        total += 1;
    }

    if total == 0 {
        return OrderTimingData::default();
    }

    let weekdays: Vec<WeekdayBucket> = weekday_counts
        .iter()
        .enumerate()
        .map(|(weekday, &(count, revenue))| WeekdayBucket {
            weekday: weekday as u32,
            stats:   bucket(WEEKDAY_LABELS[weekday], count, revenue, total),
        })
        .collect();

    let hours: Vec<HourBucket> = hour_counts
        .iter()
        .enumerate()
        .map(|(hour, &(count, revenue))| HourBucket {
            hour:  hour as u32,
            stats: bucket(&format!("{hour:02}:00"), count, revenue, total),
        })
        .collect();

    let time_bands: Vec<TimingBucket> = TIME_BANDS
        .iter()
        .map(|&(label, first, last)| {
            let (count, revenue) = hour_counts[first as usize..=last as usize]
                .iter()
                .fold((0i64, 0.0f64), |acc, &(c, r)| (acc.0 + c, acc.1 + r));
            bucket(label, count, revenue, total)
        })
        .collect();

    let mut days_by_count = weekdays.clone();
    days_by_count.sort_by(|a, b| {
        b.stats
            .order_count
            .cmp(&a.stats.order_count)
            .then_with(|| a.weekday.cmp(&b.weekday))
    });
    let best_days = days_by_count.iter().take(3).cloned().collect();
    // Reversed iteration walks the ranking bottom-up: worst first.
    let worst_days = days_by_count.iter().rev().take(3).cloned().collect();

    let mut hours_by_count = hours.clone();
    hours_by_count.sort_by(|a, b| {
        b.stats
            .order_count
            .cmp(&a.stats.order_count)
            .then_with(|| a.hour.cmp(&b.hour))
    });
    let best_hours = hours_by_count.iter().take(5).cloned().collect();
    let worst_hours = hours_by_count.iter().rev().take(5).cloned().collect();

    OrderTimingData {
        weekdays,
        time_bands,
        hours,
        best_days,
        worst_days,
        best_hours,
        worst_hours,
    }
}

fn bucket(label: &str, count: i64, revenue: f64, total: i64) -> TimingBucket {
    TimingBucket {
        label:           label.to_string(),
        order_count:     count,
        revenue,
        avg_order_value: if count > 0 { revenue / count as f64 } else { 0.0 },
        percentage:      count as f64 / total as f64 * 100.0,
    }
}
