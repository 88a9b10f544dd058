use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verifies a gateway webhook signature header of the form
/// `t=<unix-ts>,v1=<hex hmac>` against the raw request body.
///
/// The signed payload is `"{t}.{body}"`; the timestamp must be within
/// `tolerance_secs` of the current time. Any malformed header, stale
/// timestamp, or digest mismatch yields `false` - callers reject the
/// delivery with a 400 and rely on the gateway's retry schedule.
pub fn verify_signature(
    signature_header: &str,
    payload: &[u8],
    secret: &str,
    tolerance_secs: u64,
) -> bool {
    let mut ts = "";
    let mut v1 = "";
    for part in signature_header.split(',') {
        let mut it = part.trim().splitn(2, '=');
        match (it.next(), it.next()) {
            (Some("t"), Some(val)) => ts = val,
            (Some("v1"), Some(val)) => v1 = val,
            _ => {}
        }
    }

    if ts.is_empty() || v1.is_empty() {
        return false;
    }

    let Ok(ts_i) = ts.parse::<i64>() else {
        return false;
    };
    let now = chrono::Utc::now().timestamp();
    if (now - ts_i).unsigned_abs() > tolerance_secs {
        return false;
    }

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(ts.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(&expected, v1)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    fn sign(payload: &[u8], secret: &str, timestamp: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    fn current_timestamp() -> String {
        chrono::Utc::now().timestamp().to_string()
    }

    #[test]
    fn accepts_a_valid_signature() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let ts = current_timestamp();
        let header = format!("t={},v1={}", ts, sign(payload, SECRET, &ts));

        assert!(verify_signature(&header, payload, SECRET, 300));
    }

    #[test]
    fn rejects_a_signature_from_the_wrong_secret() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let ts = current_timestamp();
        let header = format!("t={},v1={}", ts, sign(payload, "wrong_secret", &ts));

        assert!(!verify_signature(&header, payload, SECRET, 300));
    }

    #[test]
    fn rejects_a_modified_payload() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let modified = br#"{"type":"checkout.session.completed","extra":true}"#;
        let ts = current_timestamp();
        let header = format!("t={},v1={}", ts, sign(payload, SECRET, &ts));

        assert!(!verify_signature(&header, modified, SECRET, 300));
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let ts = (chrono::Utc::now().timestamp() - 600).to_string();
        let header = format!("t={},v1={}", ts, sign(payload, SECRET, &ts));

        assert!(!verify_signature(&header, payload, SECRET, 300));
    }

    #[test]
    fn rejects_missing_parts() {
        let payload = b"{}";
        assert!(!verify_signature("t=1234567890", payload, SECRET, 300));
        assert!(!verify_signature("v1=deadbeef", payload, SECRET, 300));
        assert!(!verify_signature("garbage", payload, SECRET, 300));
        assert!(!verify_signature("", payload, SECRET, 300));
    }

    #[test]
    fn rejects_a_non_numeric_timestamp() {
        let payload = b"{}";
        let header = format!("t=soon,v1={}", sign(payload, SECRET, "soon"));
        assert!(!verify_signature(&header, payload, SECRET, 300));
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
