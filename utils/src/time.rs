use std::time::{SystemTime, UNIX_EPOCH};

pub fn millis_since_epoch() -> i64 {
    duration_since_epoch().as_millis() as i64
}

pub fn seconds_since_epoch() -> u64 {
    duration_since_epoch().as_secs()
}

fn duration_since_epoch() -> std::time::Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("incorrect system time")
}
