use super::*;

// =============================================================================
// AuthError::user_message
// =============================================================================

#[test]
fn rejected_with_message_is_verbatim() {
    let err = AuthError::Rejected { status: 401, message: Some("Invalid credentials".to_owned()) };
    assert_eq!(err.user_message("An error occurred."), "Invalid credentials");
}

#[test]
fn rejected_without_message_uses_fallback() {
    let err = AuthError::Rejected { status: 500, message: None };
    assert_eq!(err.user_message("An error occurred."), "An error occurred.");
}

#[test]
fn rejected_with_blank_message_uses_fallback() {
    let err = AuthError::Rejected { status: 400, message: Some("   ".to_owned()) };
    assert_eq!(err.user_message("fallback"), "fallback");
}

#[test]
fn transport_uses_fallback() {
    let err = AuthError::Transport("connection refused".to_owned());
    assert_eq!(err.user_message("An error occurred during logout."), "An error occurred during logout.");
    assert!(err.is_transport());
}

#[test]
fn missing_token_has_fixed_message() {
    assert_eq!(AuthError::MissingCsrfToken.user_message("ignored"), CSRF_UNAVAILABLE_MESSAGE);
    assert!(!AuthError::MissingCsrfToken.is_transport());
}

#[test]
fn missing_credentials_has_fixed_message() {
    assert_eq!(AuthError::MissingCredentials.user_message("ignored"), MISSING_CREDENTIALS_MESSAGE);
}

// =============================================================================
// CsrfToken
// =============================================================================

#[test]
fn csrf_token_rejects_empty() {
    assert!(CsrfToken::new("").is_none());
    assert!(CsrfToken::new("  ").is_none());
}

#[test]
fn csrf_token_keeps_value() {
    let token = CsrfToken::new("abc").unwrap();
    assert_eq!(token.as_str(), "abc");
}

#[test]
fn csrf_token_debug_is_redacted() {
    let token = CsrfToken::new("secret-value").unwrap();
    let printed = format!("{token:?}");
    assert!(!printed.contains("secret-value"));
}

// =============================================================================
// wire parsing
// =============================================================================

#[test]
fn parse_error_message_reads_msg() {
    assert_eq!(parse_error_message(r#"{"msg":"Too many attempts"}"#), Some("Too many attempts".to_owned()));
}

#[test]
fn parse_error_message_handles_garbage() {
    assert_eq!(parse_error_message("<html>502</html>"), None);
    assert_eq!(parse_error_message("{}"), None);
    assert_eq!(parse_error_message(r#"{"msg":""}"#), None);
}

#[test]
fn session_check_deserializes() {
    let check: SessionCheck = serde_json::from_str(r#"{"logged_in":true}"#).unwrap();
    assert!(check.logged_in);
}

#[test]
fn login_request_serializes_expected_shape() {
    let body = serde_json::to_value(LoginRequest { username: "alice", password: "pw" }).unwrap();
    assert_eq!(body, serde_json::json!({ "username": "alice", "password": "pw" }));
}
