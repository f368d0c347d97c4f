// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn creation_timestamp_is_integer_seconds() {
    let stamp = creation_timestamp();
    let secs: u64 = stamp.parse().unwrap();
    // Any plausible wall clock is after 2020.
    assert!(secs > 1_577_836_800);
}

#[test]
fn session_record_serializes_with_stable_keys() {
    let record = SessionRecord {
        session_id: SessionId::new("s1"),
        username: "qwerty".to_string(),
        creation_time: "1700000000".to_string(),
    };
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["session_id"], "s1");
    assert_eq!(value["username"], "qwerty");
    assert_eq!(value["creation_time"], "1700000000");
}
