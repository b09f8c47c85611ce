use std::sync::{Arc, Mutex};

use mockall::{predicate::eq, Sequence};
use serde_json::{json, Value};
use url::Url;

use super::*;

type Bodies = Arc<Mutex<Vec<Value>>>;

fn origin() -> Url {
    Url::parse("https://example.com/account/login").unwrap()
}

fn alice() -> SubmitEvent {
    SubmitEvent::new(FormData::from_iter([("username", "alice")]))
}

/// A transport expecting the options request and then the verification request, in that order,
/// recording every body it is given.
fn relying_party(
    options_url: &'static str,
    options: Value,
    result_url: &'static str,
    verification: Value,
) -> (MockTransport, Bodies) {
    let bodies = Bodies::default();
    let mut sequence = Sequence::new();
    let mut transport = MockTransport::new();

    let sent = bodies.clone();
    transport
        .expect_post_json()
        .withf(move |url, headers, _| {
            url.as_str() == options_url && headers.get("content-type") == Some("application/json")
        })
        .times(1)
        .in_sequence(&mut sequence)
        .returning(move |_, _, body| {
            sent.lock().unwrap().push(Value::clone(body));
            Ok(options.clone())
        });

    let sent = bodies.clone();
    transport
        .expect_post_json()
        .withf(move |url, headers, _| {
            url.as_str() == result_url && headers.get("Content-Type") == Some("application/json")
        })
        .times(1)
        .in_sequence(&mut sequence)
        .returning(move |_, _, body| {
            sent.lock().unwrap().push(Value::clone(body));
            Ok(verification.clone())
        });

    (transport, bodies)
}

fn authenticating(options: Value, response: Value) -> MockNativeAuthenticator {
    let mut authenticator = MockNativeAuthenticator::new();
    authenticator
        .expect_start_authentication()
        .with(eq(options))
        .times(1)
        .returning(move |_| Ok(response.clone()));
    authenticator.expect_start_registration().never();
    authenticator
}

fn registering(options: Value, response: Value) -> MockNativeAuthenticator {
    let mut authenticator = MockNativeAuthenticator::new();
    authenticator
        .expect_start_registration()
        .with(eq(options))
        .times(1)
        .returning(move |_| Ok(response.clone()));
    authenticator.expect_start_authentication().never();
    authenticator
}

fn navigating_to(expected: &'static str) -> MockNavigator {
    let mut navigator = MockNavigator::new();
    navigator
        .expect_replace()
        .withf(move |uri| uri.to_string() == expected)
        .times(1)
        .return_const(());
    navigator
}

fn not_navigating() -> MockNavigator {
    let mut navigator = MockNavigator::new();
    navigator.expect_replace().never();
    navigator
}

#[test]
fn connect_announces_effective_endpoints() {
    let log = Arc::new(EventLog::new());
    let controller = CeremonyController::new(
        origin(),
        ControllerValues {
            request_success_redirect_uri: Some("/home".into()),
            creation_options_url: Some("/register/options".into()),
            ..Default::default()
        },
        MockTransport::new(),
        MockNativeAuthenticator::new(),
        not_navigating(),
    )
    .with_listener(log.clone());

    let options = controller.connect();

    assert_eq!(options.request_options_url, "/request/options");
    assert_eq!(options.creation_options_url, "/register/options");
    assert_eq!(options.request_success_redirect_uri.as_deref(), Some("/home"));
    assert_eq!(log.events(), [LifecycleEvent::Connect { options }]);
}

#[tokio::test]
async fn signin_success_redirects_to_configured_uri() {
    // Arrange
    let (transport, _) = relying_party(
        "https://example.com/request/options",
        json!({ "challenge": "abc" }),
        "https://example.com/request",
        json!({ "errorMessage": "" }),
    );
    let log = Arc::new(EventLog::new());
    let controller = CeremonyController::new(
        origin(),
        ControllerValues {
            request_success_redirect_uri: Some("/home".into()),
            ..Default::default()
        },
        transport,
        authenticating(json!({ "challenge": "abc" }), json!({ "id": "cred1" })),
        navigating_to("/home"),
    )
    .with_listener(log.clone());
    let mut event = alice();

    // Act
    let outcome = controller
        .signin(&mut event)
        .await
        .expect("ceremony should reach a verdict");

    // Assert
    assert!(event.default_prevented());
    assert_eq!(
        outcome,
        CeremonyOutcome::Success(json!({ "errorMessage": "" }))
    );
    assert_eq!(
        log.names(),
        [
            "webauthn:request:options",
            "webauthn:request:response",
            "webauthn:request:success"
        ]
    );
    assert_eq!(
        log.events()[2],
        LifecycleEvent::Success {
            ceremony: Ceremony::Request,
            result: json!({ "errorMessage": "" }),
        }
    );
}

#[tokio::test]
async fn request_bodies_match_preceding_event_payloads() {
    let (transport, bodies) = relying_party(
        "https://example.com/request/options",
        json!({ "challenge": "abc" }),
        "https://example.com/request",
        json!({ "errorMessage": "" }),
    );
    let log = Arc::new(EventLog::new());
    let controller = CeremonyController::new(
        origin(),
        ControllerValues::default(),
        transport,
        authenticating(json!({ "challenge": "abc" }), json!({ "id": "cred1" })),
        not_navigating(),
    )
    .with_listener(log.clone());

    controller.signin(&mut alice()).await.unwrap();

    let events = log.events();
    let LifecycleEvent::OptionsRequested { data, headers, .. } = &events[0] else {
        panic!("expected options event first, got {:?}", events[0]);
    };
    let LifecycleEvent::ResponseReady { response, .. } = &events[1] else {
        panic!("expected response event second, got {:?}", events[1]);
    };
    let bodies = bodies.lock().unwrap();

    assert_eq!(data, &json!({ "username": "alice" }));
    assert_eq!(headers, &RequestHeaders::json());
    assert_eq!(bodies[0], *data);
    assert_eq!(bodies[1], *response);
    assert_eq!(bodies[1], json!({ "id": "cred1" }));
}

#[tokio::test]
async fn signin_failure_reports_message_without_navigating() {
    let (transport, _) = relying_party(
        "https://example.com/request/options",
        json!({ "challenge": "abc" }),
        "https://example.com/request",
        json!({ "errorMessage": "invalid signature" }),
    );
    let log = Arc::new(EventLog::new());
    let controller = CeremonyController::new(
        origin(),
        ControllerValues {
            request_success_redirect_uri: Some("/home".into()),
            ..Default::default()
        },
        transport,
        authenticating(json!({ "challenge": "abc" }), json!({ "id": "cred1" })),
        not_navigating(),
    )
    .with_listener(log.clone());

    let outcome = controller.signin(&mut alice()).await.unwrap();

    assert_eq!(
        outcome,
        CeremonyOutcome::Failure(json!("invalid signature"))
    );
    let events = log.events();
    assert_eq!(
        events.last(),
        Some(&LifecycleEvent::Failure {
            ceremony: Ceremony::Request,
            message: json!("invalid signature"),
        })
    );
    assert_eq!(events.last().unwrap().detail(), json!("invalid signature"));
    assert!(!log.names().contains(&"webauthn:request:success"));
}

#[tokio::test]
async fn signup_uses_creation_endpoints_and_events() {
    let (transport, bodies) = relying_party(
        "https://example.com/creation/options",
        json!({ "challenge": "xyz", "rp": { "name": "Example" } }),
        "https://example.com/creation",
        json!({ "errorMessage": "", "credentialId": "cred2" }),
    );
    let log = Arc::new(EventLog::new());
    let controller = CeremonyController::new(
        origin(),
        ControllerValues {
            request_success_redirect_uri: Some("/home".into()),
            creation_success_redirect_uri: Some("/welcome".into()),
            ..Default::default()
        },
        transport,
        registering(
            json!({ "challenge": "xyz", "rp": { "name": "Example" } }),
            json!({ "id": "cred2", "type": "public-key" }),
        ),
        navigating_to("/welcome"),
    )
    .with_listener(log.clone());
    let mut event = SubmitEvent::new(FormData::from_iter([
        ("username", "alice"),
        ("displayName", "Alice"),
        ("residentKey", "required"),
    ]));

    let outcome = controller.signup(&mut event).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(
        log.names(),
        [
            "webauthn:creation:options",
            "webauthn:creation:response",
            "webauthn:creation:success"
        ]
    );
    assert!(log
        .events()
        .iter()
        .all(|event| event.ceremony() == Some(Ceremony::Creation)));
    assert_eq!(
        bodies.lock().unwrap()[0],
        json!({ "username": "alice", "displayName": "Alice", "residentKey": "required" })
    );
}

#[tokio::test]
async fn missing_error_message_is_a_failure() {
    let (transport, _) = relying_party(
        "https://example.com/request/options",
        json!({}),
        "https://example.com/request",
        json!({ "status": "ok" }),
    );
    let log = Arc::new(EventLog::new());
    let controller = CeremonyController::new(
        origin(),
        ControllerValues::default(),
        transport,
        authenticating(json!({}), json!({ "id": "cred1" })),
        not_navigating(),
    )
    .with_listener(log.clone());

    let outcome = controller.signin(&mut alice()).await.unwrap();

    assert_eq!(outcome, CeremonyOutcome::Failure(Value::Null));
    assert_eq!(log.names().last(), Some(&"webauthn:request:failure"));
}

#[tokio::test]
async fn custom_endpoints_resolve_against_origin() {
    let (transport, bodies) = relying_party(
        "https://auth.example.com/webauthn/login/options",
        json!({ "challenge": "abc" }),
        "https://example.com/account/verify",
        json!({ "errorMessage": "" }),
    );
    let controller = CeremonyController::new(
        origin(),
        ControllerValues::from_json(
            r#"{
                "requestOptionsUrl": "https://auth.example.com/webauthn/login/options",
                "requestResultUrl": "verify",
                "usernameField": "email"
            }"#,
        )
        .unwrap(),
        transport,
        authenticating(json!({ "challenge": "abc" }), json!({ "id": "cred1" })),
        not_navigating(),
    );
    let mut event = SubmitEvent::new(FormData::from_iter([("email", "alice@example.com")]));

    controller.signin(&mut event).await.unwrap();

    assert_eq!(
        bodies.lock().unwrap()[0],
        json!({ "username": "alice@example.com" })
    );
}

#[tokio::test]
async fn element_without_form_sends_empty_payload() {
    let (transport, bodies) = relying_party(
        "https://example.com/request/options",
        json!({ "challenge": "abc" }),
        "https://example.com/request",
        json!({ "errorMessage": "" }),
    );
    let controller = CeremonyController::new(
        origin(),
        ControllerValues::default(),
        transport,
        authenticating(json!({ "challenge": "abc" }), json!({ "id": "cred1" })),
        not_navigating(),
    );

    controller
        .signin(&mut SubmitEvent::without_form())
        .await
        .unwrap();

    assert_eq!(bodies.lock().unwrap()[0], json!({}));
}

#[tokio::test]
async fn options_request_failure_aborts_ceremony() {
    let mut transport = MockTransport::new();
    transport
        .expect_post_json()
        .times(1)
        .returning(|url, _, _| {
            Err(CeremonyError::Transport {
                url: url.to_string(),
                message: "connection refused".into(),
            })
        });
    let mut authenticator = MockNativeAuthenticator::new();
    authenticator.expect_start_authentication().never();
    let log = Arc::new(EventLog::new());
    let controller = CeremonyController::new(
        origin(),
        ControllerValues::default(),
        transport,
        authenticator,
        not_navigating(),
    )
    .with_listener(log.clone());

    let error = controller
        .signin(&mut alice())
        .await
        .expect_err("network failure should propagate");

    assert!(matches!(error, CeremonyError::Transport { .. }));
    assert_eq!(log.names(), ["webauthn:request:options"]);
}

#[tokio::test]
async fn authenticator_rejection_aborts_before_verification() {
    let mut transport = MockTransport::new();
    transport
        .expect_post_json()
        .times(1)
        .returning(|_, _, _| Ok(json!({ "challenge": "abc" })));
    let mut authenticator = MockNativeAuthenticator::new();
    authenticator
        .expect_start_registration()
        .times(1)
        .returning(|_| Err(CeremonyError::Authenticator("NotAllowedError".into())));
    let log = Arc::new(EventLog::new());
    let controller = CeremonyController::new(
        origin(),
        ControllerValues::default(),
        transport,
        authenticator,
        not_navigating(),
    )
    .with_listener(log.clone());

    let error = controller.signup(&mut alice()).await.unwrap_err();

    assert!(matches!(error, CeremonyError::Authenticator(ref m) if m == "NotAllowedError"));
    assert_eq!(log.names(), ["webauthn:creation:options"]);
}

#[tokio::test]
async fn unresolvable_endpoint_is_an_error() {
    let mut transport = MockTransport::new();
    transport.expect_post_json().never();
    let controller = CeremonyController::new(
        origin(),
        ControllerValues {
            request_options_url: Some("https://[oops/options".into()),
            ..Default::default()
        },
        transport,
        MockNativeAuthenticator::new(),
        not_navigating(),
    );

    let error = controller.signin(&mut alice()).await.unwrap_err();

    assert!(matches!(
        error,
        CeremonyError::InvalidEndpoint { ref endpoint, .. } if endpoint == "https://[oops/options"
    ));
}

#[tokio::test]
async fn location_history_follows_redirect() {
    let (transport, _) = relying_party(
        "https://example.com/creation/options",
        json!({ "challenge": "xyz" }),
        "https://example.com/creation",
        json!({ "errorMessage": "" }),
    );
    let controller = CeremonyController::new(
        origin(),
        ControllerValues {
            creation_success_redirect_uri: Some("/welcome".into()),
            ..Default::default()
        },
        transport,
        registering(json!({ "challenge": "xyz" }), json!({ "id": "cred2" })),
        LocationHistory::new(),
    );

    controller.signup(&mut alice()).await.unwrap();

    assert_eq!(controller.navigator().current().as_deref(), Some("/welcome"));
}

#[test]
fn only_an_empty_error_message_is_success() {
    assert!(CeremonyOutcome::from_verification(json!({ "errorMessage": "" })).is_success());
    assert_eq!(
        CeremonyOutcome::from_verification(json!({ "errorMessage": "expired" })),
        CeremonyOutcome::Failure(json!("expired"))
    );
    assert_eq!(
        CeremonyOutcome::from_verification(json!({ "errorMessage": null })),
        CeremonyOutcome::Failure(Value::Null)
    );
    assert_eq!(
        CeremonyOutcome::from_verification(json!(null)),
        CeremonyOutcome::Failure(Value::Null)
    );
}

#[test]
fn non_string_error_message_is_kept_as_sent() {
    let outcome = CeremonyOutcome::from_verification(json!({ "errorMessage": { "code": 1 } }));

    assert_eq!(outcome, CeremonyOutcome::Failure(json!({ "code": 1 })));
    assert_eq!(outcome.error_message(), None);
    assert_eq!(
        CeremonyOutcome::from_verification(json!({ "errorMessage": false })),
        CeremonyOutcome::Failure(json!(false))
    );
}

#[tokio::test]
async fn failure_event_detail_carries_raw_error_message() {
    let (transport, _) = relying_party(
        "https://example.com/creation/options",
        json!({ "challenge": "xyz" }),
        "https://example.com/creation",
        json!({ "errorMessage": { "code": 1 } }),
    );
    let log = Arc::new(EventLog::new());
    let controller = CeremonyController::new(
        origin(),
        ControllerValues::default(),
        transport,
        registering(json!({ "challenge": "xyz" }), json!({ "id": "cred2" })),
        not_navigating(),
    )
    .with_listener(log.clone());

    controller.signup(&mut alice()).await.unwrap();

    let events = log.events();
    let failure = events.last().unwrap();
    assert_eq!(failure.name(), "webauthn:creation:failure");
    assert_eq!(failure.detail(), json!({ "code": 1 }));
}
