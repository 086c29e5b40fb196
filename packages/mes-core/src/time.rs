// Message timestamps on the wire are Unix milliseconds, matching what the
// browser client writes with `Date.now()`.

/// Returns the current Unix timestamp in milliseconds.
pub fn now_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_timestamp_millis_is_reasonable() {
        let ts = now_timestamp_millis();
        // Should be after 2024-01-01 (1704067200000)
        assert!(ts > 1_704_067_200_000, "Timestamp {} is too old", ts);
        // Should be before 2100-01-01 (4102444800000)
        assert!(ts < 4_102_444_800_000, "Timestamp {} is too far in future", ts);
    }
}
