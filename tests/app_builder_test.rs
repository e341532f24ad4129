//! Tests for App and AppBuilder configuration handling

use tidehook::testing::post;
use tidehook::webhooks::{GitHubReceiver, HmacReceiver, SignatureAlgorithm};
use tidehook::{App, ConfigBuilder, WebhookError};

const SECRET: &str = "s3cr3t_16_bytes!";

fn build_error(builder: tidehook::AppBuilder) -> WebhookError {
    match builder.build() {
        Ok(_) => panic!("expected a configuration error"),
        Err(e) => e,
    }
}

#[test]
fn test_receiver_without_secret_fails_to_build() {
    let err = build_error(App::builder().receiver(GitHubReceiver::new()));
    assert!(matches!(err, WebhookError::Configuration(_)));
    assert!(err.to_string().contains("github"));
}

#[test]
fn test_secret_outside_bounds_fails_to_build() {
    let config = ConfigBuilder::new()
        .with_receiver_secret("github", "too_short")
        .build()
        .unwrap();
    let err = build_error(App::builder().with_config(config).receiver(GitHubReceiver::new()));
    assert!(matches!(err, WebhookError::Configuration(_)));
    assert!(!err.to_string().contains("too_short"));

    let config = ConfigBuilder::new()
        .with_receiver_secret("github", "x".repeat(129))
        .build()
        .unwrap();
    let err = build_error(App::builder().with_config(config).receiver(GitHubReceiver::new()));
    assert!(matches!(err, WebhookError::Configuration(_)));
}

#[test]
fn test_malformed_secret_config_fails_to_build() {
    for secrets in ["=secret_value_12345", "tenant=", "a_default_secret_1, another_default_2"] {
        let config = ConfigBuilder::new()
            .with_receiver_secret("github", secrets)
            .build()
            .unwrap();
        let err = build_error(App::builder().with_config(config).receiver(GitHubReceiver::new()));
        assert!(matches!(err, WebhookError::Configuration(_)), "secrets {:?}", secrets);
    }
}

#[test]
fn test_invalid_receiver_names_fail_to_build() {
    let err = build_error(
        App::builder()
            .receiver(HmacReceiver::builder("My Hooks").build())
            .secrets("My Hooks", SECRET),
    );
    assert!(matches!(err, WebhookError::Configuration(_)));

    let err = build_error(
        App::builder()
            .receiver(GitHubReceiver::new())
            .receiver(HmacReceiver::builder("github").build())
            .secrets("github", SECRET),
    );
    assert!(err.to_string().contains("more than once"));
}

#[test]
fn test_secrets_for_unknown_receiver_are_ignored() {
    let config = ConfigBuilder::new()
        .with_receiver_secret("github", SECRET)
        .with_receiver_secret("bitbucket", "unused")
        .build()
        .unwrap();

    let app = App::builder()
        .with_config(config)
        .receiver(GitHubReceiver::new())
        .build()
        .unwrap();

    let receivers = app.receivers();
    let names: Vec<&str> = receivers.names().collect();
    assert_eq!(names, vec!["github"]);
}

#[tokio::test]
async fn test_code_secrets_override_config() {
    let config = ConfigBuilder::new()
        .with_receiver_secret("github", "config_secret_value")
        .build()
        .unwrap();

    let app = App::builder()
        .with_config(config)
        .receiver(GitHubReceiver::new())
        .secrets("github", SECRET)
        .build()
        .unwrap()
        .into_test_router();

    post(app.clone(), "/webhooks/incoming/github")
        .header("X-Github-Event", "ping")
        .raw_body("{}")
        .signed("X-Hub-Signature", SignatureAlgorithm::Sha1, SECRET)
        .execute()
        .await
        .assert_ok();

    post(app, "/webhooks/incoming/github")
        .header("X-Github-Event", "ping")
        .raw_body("{}")
        .signed("X-Hub-Signature", SignatureAlgorithm::Sha1, "config_secret_value")
        .execute()
        .await
        .assert_unauthorized();
}

#[test]
fn test_app_exposes_config() {
    let config = ConfigBuilder::new()
        .with_receiver_secret("github", SECRET)
        .with_port(9090)
        .build()
        .unwrap();

    let app = App::builder()
        .with_config(config)
        .receiver(GitHubReceiver::new())
        .build()
        .unwrap();

    assert_eq!(app.config().server.port, 9090);
    assert!(app.receivers().get("github").is_some());
    assert!(app.receivers().get("bitbucket").is_none());
}
