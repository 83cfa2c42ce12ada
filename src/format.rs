const TB: u64 = 1_000_000_000_000;
const GB: u64 = 1_000_000_000;
const MB: u64 = 1_000_000;

/// How a millisecond duration is rendered for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationStyle {
    /// "2 hrs 5 mins", "42 mins", "3 mins 12 secs", "45 secs".
    Bucketed,
    /// Whole minutes, halves rounded to even: "1 min", "93 mins".
    RoundedMinutes,
}

pub fn format_size(bytes: u64) -> String {
    let b = bytes as f64;
    if bytes >= TB {
        format!("{:.2} TB", b / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", b / GB as f64)
    } else {
        format!("{:.2} MB", b / MB as f64)
    }
}

pub fn format_duration(millis: u64, style: DurationStyle) -> String {
    match style {
        DurationStyle::Bucketed => bucketed(millis),
        DurationStyle::RoundedMinutes => rounded_minutes(millis),
    }
}

fn bucketed(millis: u64) -> String {
    let total_secs = millis / 1000;
    let (minutes, seconds) = (total_secs / 60, total_secs % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);

    if hours > 0 {
        format!("{hours} hrs {minutes} mins")
    } else if minutes >= 10 {
        format!("{minutes} mins")
    } else if minutes > 0 {
        format!("{minutes} mins {seconds} secs")
    } else {
        format!("{seconds} secs")
    }
}

fn rounded_minutes(millis: u64) -> String {
    let total_secs = millis / 1000;
    let mut minutes = total_secs / 60;
    let rem = total_secs % 60;
    if rem > 30 || (rem == 30 && minutes % 2 == 1) {
        minutes += 1;
    }
    if minutes == 0 && millis > 0 {
        minutes = 1;
    }
    if minutes == 1 {
        "1 min".to_string()
    } else {
        format!("{minutes} mins")
    }
}

pub fn format_resolution(resolution: Option<&str>) -> Option<String> {
    let res = resolution?;
    if res.eq_ignore_ascii_case("4k") {
        return Some("2160p".to_string());
    }
    if !res.is_empty() && res.bytes().all(|b| b.is_ascii_digit()) {
        return Some(format!("{res}p"));
    }
    Some(res.to_string())
}

pub fn format_codec(codec: Option<&str>) -> Option<String> {
    codec.map(|c| c.to_uppercase())
}
