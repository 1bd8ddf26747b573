use super::*;

fn params(session: Option<&str>, machine_id: Option<&str>) -> RoutingParams {
    RoutingParams {
        session: session.map(str::to_string),
        machine_id: machine_id.map(str::to_string),
        goods_id: Some("4159".into()),
    }
}

#[test]
fn session_and_machine_is_valid() {
    let ctx = resolve(&params(Some("abc-123"), Some("11025496")));
    assert_eq!(ctx.session_id, "abc-123");
    assert!(ctx.has_valid_context);
    assert!(!ctx.minted);
    assert_eq!(ctx.machine_id.as_deref(), Some("11025496"));
    assert_eq!(ctx.goods_id.as_deref(), Some("4159"));
}

#[test]
fn machine_only_mints_a_session() {
    let ctx = resolve(&params(None, Some("11025496")));
    assert!(ctx.has_valid_context);
    assert!(ctx.minted);
    assert!(Uuid::parse_str(&ctx.session_id).is_ok());
}

#[test]
fn minted_sessions_differ() {
    let a = resolve(&params(None, Some("m")));
    let b = resolve(&params(None, Some("m")));
    assert_ne!(a.session_id, b.session_id);
}

#[test]
fn session_without_machine_is_corrupted() {
    let ctx = resolve(&params(Some("abc-123"), None));
    assert_eq!(ctx.session_id, "abc-123");
    assert!(!ctx.has_valid_context);
    assert!(!ctx.minted);
}

#[test]
fn empty_link_is_corrupted() {
    let ctx = resolve(&RoutingParams::default());
    assert!(!ctx.has_valid_context);
    assert!(ctx.minted);
}

#[test]
fn blank_values_count_as_missing() {
    let ctx = resolve(&params(Some("  "), Some(" 11025496 ")));
    assert!(ctx.has_valid_context);
    assert!(ctx.minted);
    assert_eq!(ctx.machine_id.as_deref(), Some("11025496"));

    let ctx = resolve(&params(Some("abc"), Some("   ")));
    assert!(!ctx.has_valid_context);
}

#[test]
fn malformed_session_is_corrupted_and_not_reused() {
    let ctx = resolve(&params(Some("../etc/passwd"), Some("11025496")));
    assert!(!ctx.has_valid_context);
    assert_ne!(ctx.session_id, "../etc/passwd");
}

#[test]
fn session_id_charset_and_length() {
    assert!(is_valid_session_id("Abc_09-x"));
    assert!(!is_valid_session_id(""));
    assert!(!is_valid_session_id("a b"));
    assert!(!is_valid_session_id("é"));
    assert!(is_valid_session_id(&"a".repeat(MAX_SESSION_ID_LEN)));
    assert!(!is_valid_session_id(&"a".repeat(MAX_SESSION_ID_LEN + 1)));
}

#[test]
fn valid_constructor() {
    let ctx = SessionContext::valid("s", "m", None);
    assert!(ctx.has_valid_context);
    assert!(!ctx.minted);
    assert_eq!(ctx.machine_id.as_deref(), Some("m"));
}
