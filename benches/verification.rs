use axum::body::Body;
use axum::http::Request;
use axum::Router;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use secrecy::SecretString;
use tidehook::testing::sign;
use tidehook::webhooks::{GitHubReceiver, SignatureAlgorithm, SignatureVerifier};
use tidehook::{App, ConfigBuilder};
use tower::ServiceExt;

const SECRET: &str = "s3cr3t_16_bytes!";

fn payload(size: usize) -> Vec<u8> {
    format!(r#"{{"padding":"{}"}}"#, "x".repeat(size)).into_bytes()
}

fn benchmark_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify");
    let secret = SecretString::from(SECRET);

    for algorithm in [SignatureAlgorithm::Sha1, SignatureAlgorithm::Sha256] {
        let verifier = SignatureVerifier::new(algorithm, "X-Signature");
        for size in [256, 16 * 1024] {
            let body = payload(size);
            let header = sign(algorithm, SECRET, &body);
            group.bench_with_input(
                BenchmarkId::new(algorithm.tag(), size),
                &(body, header),
                |b, (body, header)| {
                    b.iter(|| verifier.verify(&secret, black_box(body), black_box(header)));
                },
            );
        }
    }

    group.finish();
}

fn github_router() -> Router {
    let config = ConfigBuilder::new()
        .with_receiver_secret("github", SECRET)
        .build()
        .unwrap();
    App::builder()
        .with_config(config)
        .receiver(GitHubReceiver::new())
        .build()
        .unwrap()
        .into_test_router()
}

async fn deliver(router: &Router, body: &[u8], signature: &str) {
    let req = Request::builder()
        .method("POST")
        .uri("/webhooks/incoming/github")
        .header("X-Github-Event", "push")
        .header("X-Hub-Signature", signature)
        .body(Body::from(body.to_vec()))
        .unwrap();

    let _response = router.clone().oneshot(req).await.unwrap();
}

fn benchmark_delivery(c: &mut Criterion) {
    let mut group = c.benchmark_group("delivery");

    let router = github_router();
    let body = payload(1024);
    let signature = sign(SignatureAlgorithm::Sha1, SECRET, &body);

    let rt = tokio::runtime::Runtime::new().unwrap();

    group.bench_function("github_push", |b| {
        b.iter(|| {
            rt.block_on(deliver(black_box(&router), &body, &signature));
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_verify, benchmark_delivery);
criterion_main!(benches);
