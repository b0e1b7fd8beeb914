const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3_600;
const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluralClass {
    One,
    Few,
    Many,
}

impl PluralClass {
    pub fn for_count(count: u64) -> Self {
        let last_digit = count % 10;
        let last_two = count % 100;

        if last_digit == 1 && last_two != 11 {
            Self::One
        } else if (2..=4).contains(&last_digit) && !(12..=14).contains(&last_two) {
            Self::Few
        } else {
            Self::Many
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    fn word(self, class: PluralClass) -> &'static str {
        match (self, class) {
            (Self::Second, PluralClass::One) => "секунда",
            (Self::Second, PluralClass::Few) => "секунди",
            (Self::Second, PluralClass::Many) => "секунд",
            (Self::Minute, PluralClass::One) => "хвилина",
            (Self::Minute, PluralClass::Few) => "хвилини",
            (Self::Minute, PluralClass::Many) => "хвилин",
            (Self::Hour, PluralClass::One) => "година",
            (Self::Hour, PluralClass::Few) => "години",
            (Self::Hour, PluralClass::Many) => "годин",
            (Self::Day, PluralClass::One) => "день",
            (Self::Day, PluralClass::Few) => "дні",
            (Self::Day, PluralClass::Many) => "днів",
        }
    }

    pub fn pluralize(self, count: u64) -> String {
        format!("{count} {}", self.word(PluralClass::for_count(count)))
    }
}

pub fn format_duration(total_seconds: u64) -> String {
    if total_seconds < SECONDS_PER_MINUTE {
        return TimeUnit::Second.pluralize(total_seconds);
    }

    let days = total_seconds / SECONDS_PER_DAY;
    let hours = (total_seconds % SECONDS_PER_DAY) / SECONDS_PER_HOUR;
    let minutes = (total_seconds % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;

    let mut parts = Vec::with_capacity(3);
    if days > 0 {
        parts.push(TimeUnit::Day.pluralize(days));
    }
    if hours > 0 {
        parts.push(TimeUnit::Hour.pluralize(hours));
    }
    if days == 0 && minutes > 0 {
        parts.push(TimeUnit::Minute.pluralize(minutes));
    }

    parts.join(" ")
}
