use crate::timestamp::{PtpTimestamp, TimeInternal};

// ===== PtpTimestamp wire format =====

#[test]
fn test_timestamp_encode_decode_roundtrip() {
    let ts = PtpTimestamp::new(0x0000_1234_5678, 999_999_999);
    let encoded = ts.encode();
    let decoded = PtpTimestamp::decode(&encoded).unwrap();
    assert_eq!(ts, decoded);
}

#[test]
fn test_timestamp_encode_known_bytes() {
    let ts = PtpTimestamp::new(0x0102_0304_0506, 0x0708_090A);
    assert_eq!(
        ts.encode(),
        [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A]
    );
}

#[test]
fn test_timestamp_decode_too_short() {
    assert!(PtpTimestamp::decode(&[0u8; 9]).is_none());
}

#[test]
fn test_timestamp_new_clamps_nanoseconds() {
    let ts = PtpTimestamp::new(1, 2_000_000_000);
    assert_eq!(ts.nanoseconds, 999_999_999);
}

#[test]
fn test_timestamp_display() {
    let ts = PtpTimestamp::new(10, 500);
    assert_eq!(format!("{ts}"), "10.000000500");
}

// ===== TimeInternal normalization =====

#[test]
fn test_time_internal_normalizes_nanosecond_overflow() {
    let t = TimeInternal::new(1, 1_500_000_000);
    assert_eq!(t.seconds, 2);
    assert_eq!(t.nanoseconds, 500_000_000);
}

#[test]
fn test_time_internal_normalizes_mixed_signs() {
    let t = TimeInternal::new(1, -250_000_000);
    assert_eq!(t.seconds, 0);
    assert_eq!(t.nanoseconds, 750_000_000);

    let t = TimeInternal::new(-1, 250_000_000);
    assert_eq!(t.seconds, 0);
    assert_eq!(t.nanoseconds, -750_000_000);
}

#[test]
fn test_time_internal_add_carries() {
    let a = TimeInternal::new(1, 600_000_000);
    let b = TimeInternal::new(2, 700_000_000);
    let sum = a + b;
    assert_eq!(sum.seconds, 4);
    assert_eq!(sum.nanoseconds, 300_000_000);
}

#[test]
fn test_time_internal_sub_can_go_negative() {
    let a = TimeInternal::new(1, 0);
    let b = TimeInternal::new(2, 500_000_000);
    let diff = a - b;
    assert_eq!(diff.total_nanos(), -1_500_000_000);
}

#[test]
fn test_time_internal_neg() {
    let t = TimeInternal::new(3, 200);
    let n = -t;
    assert_eq!(n.total_nanos(), -t.total_nanos());
}

#[test]
fn test_time_internal_halved_preserves_subsecond() {
    let t = TimeInternal::new(3, 0);
    let h = t.halved();
    assert_eq!(h.seconds, 1);
    assert_eq!(h.nanoseconds, 500_000_000);

    let negative = TimeInternal::new(-1, 0).halved();
    assert_eq!(negative.total_nanos(), -500_000_000);
}

#[test]
fn test_time_internal_nanos_roundtrip() {
    for nanos in [0i128, 1, -1, 1_000_000_001, -2_999_999_999] {
        assert_eq!(TimeInternal::from_nanos(nanos).total_nanos(), nanos);
    }
}

#[test]
fn test_time_internal_is_within_nanos() {
    assert!(TimeInternal::new(0, 999).is_within_nanos(1_000));
    assert!(!TimeInternal::new(0, 1_000).is_within_nanos(1_000));
    assert!(TimeInternal::new(0, -999).is_within_nanos(1_000));
    assert!(!TimeInternal::new(1, 0).is_within_nanos(1_000));
}

// ===== Wire / internal conversions =====

#[test]
fn test_wire_to_internal_and_back() {
    let ts = PtpTimestamp::new(100, 42);
    let internal: TimeInternal = ts.into();
    assert_eq!(internal.seconds, 100);
    assert_eq!(internal.nanoseconds, 42);
    let back: PtpTimestamp = internal.into();
    assert_eq!(back, ts);
}

#[test]
fn test_negative_internal_clamps_to_zero_on_wire() {
    let internal = TimeInternal::new(-5, 0);
    let wire: PtpTimestamp = internal.into();
    assert_eq!(wire, PtpTimestamp::ZERO);
}
