use shadowview::context::{AccessContext, Visibility, resolve_token};

#[test]
fn membership_is_exact_and_case_sensitive() {
    let ctx = AccessContext::new(
        "user_1",
        "sales",
        Visibility::Groups(vec!["Brand_A".to_string(), "Brand_B".to_string()]),
    );
    assert!(ctx.can_view("Brand_A"));
    assert!(ctx.can_view("Brand_B"));
    assert!(!ctx.can_view("Brand_C"));
    assert!(!ctx.can_view("brand_a"));
    assert!(!ctx.can_view("Brand_A "));
}

#[test]
fn all_sentinel_grants_everything() {
    let ctx = AccessContext::new("admin", "admin", Visibility::All);
    assert!(ctx.can_view("Brand_A"));
    assert!(ctx.can_view("anything at all"));
    assert!(ctx.has_any_visibility());
}

#[test]
fn empty_groups_grant_nothing() {
    let ctx = AccessContext::new("user_1", "sales", Visibility::Groups(vec![]));
    assert!(!ctx.can_view("Brand_A"));
    assert!(!ctx.has_any_visibility());
}

#[test]
fn sentinel_entry_in_wire_list_is_recognized() {
    let vis = Visibility::from_groups(vec!["Brand_A".to_string(), "ALL".to_string()]);
    assert_eq!(vis, Visibility::All);
    let vis = Visibility::from_groups(vec!["all".to_string()]);
    // The sentinel is a reserved literal, not a case-insensitive keyword.
    assert_eq!(vis, Visibility::Groups(vec!["all".to_string()]));
}

#[test]
fn wire_shape_round_trips() {
    let json = r#"{"subject_id": "u1", "role": "sales", "allowed_groups": ["Brand_A"]}"#;
    let ctx: AccessContext = serde_json::from_str(json).expect("deserialize");
    assert_eq!(ctx.subject_id(), "u1");
    assert!(ctx.can_view("Brand_A"));
    assert!(!ctx.can_view("Brand_B"));

    let admin_json = r#"{"subject_id": "root", "role": "admin", "allowed_groups": ["ALL"]}"#;
    let admin: AccessContext = serde_json::from_str(admin_json).expect("deserialize");
    assert_eq!(admin.visibility(), &Visibility::All);

    let back = serde_json::to_string(&admin).expect("serialize");
    assert!(back.contains("\"ALL\""));
}

#[test]
fn blank_subject_fails_validation() {
    let ctx = AccessContext::new("", "admin", Visibility::All);
    assert!(ctx.ensure_valid().is_err());
    let ctx = AccessContext::new("u1", "", Visibility::Groups(vec![]));
    assert!(ctx.ensure_valid().is_ok(), "role is informational only");
}

#[test]
fn token_stub_maps_fixed_tokens() {
    let admin = resolve_token(Some("admin_secret"));
    assert_eq!(admin.visibility(), &Visibility::All);

    let sales = resolve_token(Some("sales_sj"));
    assert!(sales.can_view("Sandjest"));
    assert!(!sales.can_view("Coquella"));

    let guest = resolve_token(Some("made_up"));
    assert!(!guest.has_any_visibility());
    let missing = resolve_token(None);
    assert!(!missing.has_any_visibility());
}
