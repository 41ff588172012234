//! Envelope vector tests (wire compatibility with host pages).

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use canvas_xd_core::protocol::envelope::{is_session_expired, RequestEnvelope, ResponseEnvelope};

use vector_loader::{load, Direction};

#[test]
fn request_vectors() {
    let files = [
        "request_ctx.json",
        "request_ajax.json",
        "request_unknown_type.json",
        "request_missing_seq.json",
    ];

    for f in files {
        let v = load(f);
        assert_eq!(v.direction, Direction::Request, "vector={}", v.description);
        let res = RequestEnvelope::from_value(&v.frame);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let env = res.expect("expected ok envelope");
        let ex = v.expect.expect("missing expect block");
        assert_eq!(env.seq as u64, ex["seq"].as_u64().unwrap(), "vector={}", v.description);
        assert_eq!(env.body.kind(), ex["kind"].as_str().unwrap(), "vector={}", v.description);
        assert_eq!(env.body.access_token(), ex["accessToken"].as_str(), "vector={}", v.description);

        // Re-encoding must reproduce the exact wire shape.
        assert_eq!(env.to_value().unwrap(), v.frame, "vector={}", v.description);
    }
}

#[test]
fn response_vectors() {
    let files = [
        "response_ok.json",
        "response_invalid_session.json",
        "response_401_other_code.json",
        "response_no_seq.json",
        "response_string_seq.json",
    ];

    for f in files {
        let v = load(f);
        assert_eq!(v.direction, Direction::Response, "vector={}", v.description);
        let res = ResponseEnvelope::from_value(&v.frame);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let env = res.expect("expected ok envelope");
        let ex = v.expect.expect("missing expect block");
        assert_eq!(env.seq.map(u64::from), ex["seq"].as_u64(), "vector={}", v.description);
        assert_eq!(env.status.map(u64::from), ex["status"].as_u64(), "vector={}", v.description);
        assert_eq!(
            is_session_expired(&v.frame),
            ex["session_expired"].as_bool().unwrap(),
            "vector={}",
            v.description
        );
    }
}
