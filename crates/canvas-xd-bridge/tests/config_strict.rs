#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use canvas_xd_bridge::config::{self, CollisionPolicy};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
client:
  sequence:
    ceilng: 10   # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "BAD_REQUEST");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.client.sequence.ceiling, 100);
    assert_eq!(cfg.client.sequence.on_collision, CollisionPolicy::Overwrite);
    assert_eq!(cfg.client.proxy.authorization_scheme, "OAuth");
    assert!(cfg.host.is_none());
}

#[test]
fn full_config() {
    let ok = r#"
version: 1
client:
  parent_url: "https://host.example.com/canvas/page"
  allowed_origins: ["https://*.example.com", "https://partner.example.org:8443"]
  sequence: { ceiling: 500, on_collision: skip_in_use }
  initial_token: "t"
host:
  canvas_origin: "https://canvas.example.net"
  valid_tokens: ["t"]
  context: { user: { userName: "u" } }
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.client.sequence.on_collision, CollisionPolicy::SkipInUse);
    assert_eq!(cfg.host.unwrap().context["user"]["userName"], "u");
}

#[test]
fn rejects_unsupported_version() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn rejects_bare_wildcard_origin() {
    let bad = r#"
version: 1
client:
  allowed_origins: ["*"]
"#;
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn rejects_invalid_parent_url() {
    let bad = r#"
version: 1
client:
  parent_url: "not a url"
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "BAD_REQUEST");
}

#[test]
fn rejects_out_of_range_ceiling() {
    for ceiling in ["0", "70000"] {
        let bad = format!("version: 1\nclient:\n  sequence:\n    ceiling: {ceiling}\n");
        assert!(config::load_from_str(&bad).is_err(), "ceiling {ceiling}");
    }
}

#[test]
fn host_canvas_origin_must_be_bare() {
    let bad = r#"
version: 1
host:
  canvas_origin: "https://canvas.example.net/app"
"#;
    assert!(config::load_from_str(bad).is_err());
}
