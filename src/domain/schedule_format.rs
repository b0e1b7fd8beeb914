use chrono::{DateTime, Datelike};
use chrono_tz::Tz;

use crate::domain::schedule::{DaySchedule, DayStatus, OutageInterval, SlotKind};

const WEEKDAY_NAMES: [&str; 7] = [
    "Понеділок",
    "Вівторок",
    "Середа",
    "Четвер",
    "П'ятниця",
    "Субота",
    "Неділя",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Today,
    Tomorrow,
    Changed,
}

impl Framing {
    fn emoji(self) -> &'static str {
        match self {
            Self::Today => "☀️",
            Self::Tomorrow => "🌙",
            Self::Changed => "🔔",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Today => "СЬОГОДНІ",
            Self::Tomorrow => "ЗАВТРА",
            Self::Changed => "ЗМІНИВСЯ",
        }
    }
}

pub fn minutes_to_time(minutes: u16) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

pub fn definite_ranges(slots: &[OutageInterval]) -> Vec<(u16, u16)> {
    let mut definite: Vec<(u16, u16)> = slots
        .iter()
        .filter(|slot| slot.kind == SlotKind::Definite)
        .map(|slot| (slot.start, slot.end))
        .collect();
    definite.sort_unstable();

    let mut merged: Vec<(u16, u16)> = Vec::with_capacity(definite.len());
    for (start, end) in definite {
        match merged.last_mut() {
            Some(last) if last.1 == start => last.1 = end,
            _ => merged.push((start, end)),
        }
    }
    merged
}

pub fn format_outage_ranges(slots: &[OutageInterval]) -> String {
    let ranges = definite_ranges(slots);
    if ranges.is_empty() {
        return "✅ Відключень немає".to_string();
    }

    ranges
        .iter()
        .map(|(start, end)| {
            format!("⚡️ {} - {}", minutes_to_time(*start), minutes_to_time(*end))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_schedule_message(
    group: &str,
    day: &DaySchedule,
    framing: Framing,
    rendered_at: &DateTime<Tz>,
) -> String {
    let date = day.date.format("%d.%m.%Y");
    let weekday = WEEKDAY_NAMES[day.date.weekday().num_days_from_monday() as usize];
    let updated = rendered_at.format("%H:%M:%S");

    if day.status == DayStatus::Emergency {
        return format!(
            "🚨 <b>ЕКСТРЕНІ ВІДКЛЮЧЕННЯ</b> 🚨\n\n\
             🏠 Група: <b>{group}</b>\n\
             📅 {weekday}, {date}\n\n\
             ⚠️ <b>Графіки не застосовуються</b>\n\
             Екстрені відключення через аварійні ситуації\n\n\
             🕐 Оновлено: {updated}"
        );
    }

    let waiting_note = if day.status == DayStatus::WaitingForConfirmation {
        "⏳ Очікування підтвердження графіку\n\n"
    } else {
        ""
    };

    format!(
        "{emoji} <b>Графік відключень {label}</b>\n\n\
         🏠 Група: <b>{group}</b>\n\
         📅 {weekday}, {date}\n\n\
         {waiting_note}\
         <b>Планові відключення:</b>\n\
         {outages}\n\n\
         🕐 Оновлено: {updated}",
        emoji = framing.emoji(),
        label = framing.label(),
        outages = format_outage_ranges(&day.slots),
    )
}
