use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use http::header::{CACHE_CONTROL, ETAG, IF_NONE_MATCH};
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use pretty_assertions::assert_eq;
use revalid_backend::{Freshness, Strategy};
use revalid_core::{CancellationToken, Capability, FreshnessError};
use revalid_http::{CACHE_FOREVER, EvaluateError, Evaluator, Principal};
use revalid_test::{MockDatabase, MockSupplier};
use revalid_tower::ConditionalGet;
use tower::{Layer, Service, ServiceExt, service_fn};

const BUILD: &str = "638";

type Req = Request<Full<Bytes>>;
type Res = Response<Full<Bytes>>;

fn handler(
    calls: Arc<AtomicUsize>,
) -> impl Service<Req, Response = Res, Error = Infallible, Future: Send> + Clone + Send + 'static {
    service_fn(move |_request: Req| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, Infallible>(Response::new(Full::new(Bytes::from_static(b"companies")))) }
    })
}

fn get(if_none_match: Option<&str>) -> Req {
    let mut builder = Request::builder().method(Method::GET).uri("/companies");
    if let Some(value) = if_none_match {
        builder = builder.header(IF_NONE_MATCH, value);
    }
    builder.body(Full::default()).unwrap()
}

fn get_as(user: Option<&str>, if_none_match: Option<&str>) -> Req {
    let mut request = get(if_none_match);
    if let Some(user) = user {
        request.extensions_mut().insert(Principal::new(user));
    }
    request
}

fn layer(supplier: &Arc<MockSupplier>) -> ConditionalGet<Arc<MockSupplier>> {
    ConditionalGet::builder()
        .evaluator(Evaluator::builder(BUILD).build())
        .supplier(supplier.clone())
        .build()
}

/// Every family and capability combination with the strategy it resolves to.
fn databases() -> Vec<(MockDatabase, Strategy)> {
    vec![
        (
            MockDatabase::sql_server()
                .with(Capability::ServerStatePermission)
                .with(Capability::ChangeTracking),
            Strategy::SqlServerLogSequence,
        ),
        (
            MockDatabase::sql_server().with(Capability::ChangeTracking),
            Strategy::SqlServerRowVersion,
        ),
        (MockDatabase::sql_server(), Strategy::SqlServerCommitCounter),
        (
            MockDatabase::postgres().with(Capability::CommitTimestamps),
            Strategy::PostgresCommittedXact,
        ),
        (MockDatabase::postgres(), Strategy::PostgresCommitCounter),
        (
            MockDatabase::mysql().with(Capability::BinaryLog),
            Strategy::MySqlReplicationPosition,
        ),
        (MockDatabase::mysql(), Strategy::MySqlCommitCounter),
    ]
}

#[tokio::test]
async fn validate_revalidate_then_invalidate_on_every_backend() {
    for (database, expected) in databases() {
        let supplier = Arc::new(database.supplier());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut service = layer(&supplier).layer(handler(calls.clone()));

        // A: first visit
        let first = service.ready().await.unwrap().call(get(None)).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK, "{expected}");
        assert_eq!(first.headers()["x-no-304-reason"], "missing If-None-Match");
        let etag = first.headers()[ETAG].to_str().unwrap().to_owned();
        assert!(etag.starts_with("\"638-"), "{expected}: {etag}");

        // B: nothing written
        let second = service
            .ready()
            .await
            .unwrap()
            .call(get(Some(&etag)))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::NOT_MODIFIED, "{expected}");
        assert_eq!(second.headers()[CACHE_CONTROL], "no-cache");
        assert_eq!(second.headers()[ETAG], etag.as_str());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // C: a committed write
        database.write();
        let third = service
            .ready()
            .await
            .unwrap()
            .call(get(Some(&etag)))
            .await
            .unwrap();
        assert_eq!(third.status(), StatusCode::OK, "{expected}");
        assert_eq!(third.headers()["x-no-304-reason"], "If-None-Match != ETag");
        assert_ne!(third.headers()[ETAG], etag.as_str(), "{expected}");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert_eq!(supplier.freshness().cache().get(), Some(expected));
        assert_eq!(supplier.calls(), 3);
        assert_eq!(database.counters().token_reads(), 3);
        assert_eq!(database.counters().opens(), 3);
        assert_eq!(database.counters().closes(), 3);
    }
}

#[tokio::test]
async fn immutable_response_never_queries() {
    let database = MockDatabase::postgres();
    let supplier = database.supplier();
    let evaluator = Evaluator::builder(BUILD).build();

    let (request, _) = get(Some("\"638-741\"")).into_parts();
    let (mut response, ()) = Response::new(()).into_parts();
    response.headers.insert(CACHE_CONTROL, CACHE_FOREVER);

    let verdict = evaluator
        .evaluate(&request, &mut response, &supplier, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!verdict.is_not_modified());
    assert_eq!(verdict.reason().map(|reason| reason.code()), Some("immutable"));
    assert_eq!(response.status, StatusCode::OK);
    assert!(!response.headers.contains_key(ETAG));
    assert_eq!(supplier.calls(), 0);
    assert_eq!(database.counters().commands(), 0);
    assert_eq!(database.counters().opens(), 0);
}

#[tokio::test]
async fn probes_run_once_per_cache() {
    let database = MockDatabase::sql_server().with(Capability::ChangeTracking);
    let supplier = Arc::new(database.supplier());
    let service = layer(&supplier).layer(handler(Arc::new(AtomicUsize::new(0))));

    for _ in 0..5 {
        let response = service.clone().oneshot(get(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // two probes on the first request, then only token reads
    assert_eq!(database.counters().commands(), 2 + 5);
    assert_eq!(database.counters().token_reads(), 5);

    supplier.freshness().reset();
    database.counters().reset();
    service.clone().oneshot(get(None)).await.unwrap();
    assert_eq!(database.counters().commands(), 2 + 1);
}

#[tokio::test]
async fn suppliers_sharing_a_cache_resolve_once() {
    let database = MockDatabase::postgres().with(Capability::CommitTimestamps);
    let freshness = Freshness::new();
    let first = MockSupplier::new(database.clone(), freshness.clone());
    let second = MockSupplier::new(database.clone(), freshness.clone());
    let evaluator = Evaluator::builder(BUILD).build();

    for supplier in [&first, &second] {
        let (request, _) = get(None).into_parts();
        let (mut response, ()) = Response::new(()).into_parts();
        evaluator
            .evaluate(&request, &mut response, supplier, &CancellationToken::new())
            .await
            .unwrap();
    }

    // one probe, two reads
    assert_eq!(database.counters().commands(), 3);
    assert_eq!(
        freshness.cache().get(),
        Some(Strategy::PostgresCommittedXact)
    );
}

#[tokio::test]
async fn switching_databases_resolves_again() {
    let freshness = Freshness::new();
    let cancel = CancellationToken::new();
    let sql_server = MockDatabase::sql_server();
    let mysql = MockDatabase::mysql().with(Capability::BinaryLog);

    let token = freshness
        .token(&mut sql_server.connect(), None, &cancel)
        .await
        .unwrap();
    assert_eq!(token.as_str(), "2000");
    assert_eq!(freshness.cache().get(), Some(Strategy::SqlServerCommitCounter));

    let token = freshness
        .token(&mut mysql.connect(), None, &cancel)
        .await
        .unwrap();
    assert_eq!(token.as_str(), "binlog.000001-157");
    assert_eq!(
        freshness.cache().get(),
        Some(Strategy::MySqlReplicationPosition)
    );
}

#[tokio::test]
async fn revoked_log_permission_names_the_fix() {
    let database = MockDatabase::sql_server().with(Capability::ServerStatePermission);
    database.deny(Strategy::SqlServerLogSequence);
    let freshness = Freshness::new();

    let err = freshness
        .token(&mut database.connect(), None, &CancellationToken::new())
        .await
        .unwrap_err();

    let FreshnessError::QueryExecution {
        strategy, message, ..
    } = err
    else {
        panic!("expected a query failure, got {err:?}");
    };
    assert_eq!(strategy, "sqlserver.log_sequence");
    assert!(message.contains("VIEW SERVER STATE"));
    assert!(message.contains("change tracking"));
    assert_eq!(database.counters().opens(), database.counters().closes());
}

#[tokio::test]
async fn unreachable_database_is_a_server_error() {
    let database = MockDatabase::postgres();
    database.set_offline(true);
    let supplier = Arc::new(database.supplier());
    let calls = Arc::new(AtomicUsize::new(0));
    let service = layer(&supplier).layer(handler(calls.clone()));

    let response = service.oneshot(get(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!response.headers().contains_key(ETAG));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(database.counters().commands(), 0);
}

fn per_user(supplier: &Arc<MockSupplier>, allow_anonymous: bool) -> ConditionalGet<Arc<MockSupplier>> {
    let evaluator = Evaluator::builder(BUILD)
        .suffix(|request| Principal::from_request(request).map(|user| user.name().to_owned()))
        .allow_anonymous(allow_anonymous)
        .build();
    ConditionalGet::builder()
        .evaluator(evaluator)
        .supplier(supplier.clone())
        .build()
}

#[tokio::test]
async fn validators_are_scoped_per_user() {
    let database = MockDatabase::mysql();
    let supplier = Arc::new(database.supplier());
    let service = per_user(&supplier, false).layer(handler(Arc::new(AtomicUsize::new(0))));

    let alice = service
        .clone()
        .oneshot(get_as(Some("alice"), None))
        .await
        .unwrap();
    let etag = alice.headers()[ETAG].to_str().unwrap().to_owned();
    assert_eq!(etag, "\"638-0-alice\"");

    let again = service
        .clone()
        .oneshot(get_as(Some("alice"), Some(&etag)))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::NOT_MODIFIED);

    let bob = service
        .clone()
        .oneshot(get_as(Some("bob"), Some(&etag)))
        .await
        .unwrap();
    assert_eq!(bob.status(), StatusCode::OK);
    assert_eq!(bob.headers()[ETAG], "\"638-0-bob\"");
}

#[tokio::test]
async fn anonymous_request_with_a_user_suffix_fails_before_querying() {
    let database = MockDatabase::mysql();
    let supplier = Arc::new(database.supplier());
    let service = per_user(&supplier, false).layer(handler(Arc::new(AtomicUsize::new(0))));

    let response = service.oneshot(get_as(None, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(supplier.calls(), 0);
    assert_eq!(database.counters().opens(), 0);

    let evaluator = Evaluator::builder(BUILD)
        .suffix(|_| Some("tenant-7".to_owned()))
        .build();
    let (request, _) = get(None).into_parts();
    let (mut head, ()) = Response::new(()).into_parts();
    let err = evaluator
        .evaluate(&request, &mut head, supplier.as_ref(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EvaluateError::AuthenticationRequired { ref path } if path == "/companies"));
}

#[tokio::test]
async fn anonymous_requests_share_a_validator_when_allowed() {
    let database = MockDatabase::mysql();
    let supplier = Arc::new(database.supplier());
    let service = per_user(&supplier, true).layer(handler(Arc::new(AtomicUsize::new(0))));

    let response = service.clone().oneshot(get_as(None, None)).await.unwrap();
    assert_eq!(response.headers()[ETAG], "\"638-0\"");

    let response = service
        .oneshot(get_as(None, Some("\"638-0\"")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn repeated_reads_without_writes_are_stable() {
    let database = MockDatabase::postgres().with(Capability::CommitTimestamps);
    database.write();
    let supplier = Arc::new(database.supplier());
    let service = layer(&supplier).layer(handler(Arc::new(AtomicUsize::new(0))));

    let mut tags = Vec::new();
    for _ in 0..3 {
        let response = service.clone().oneshot(get(None)).await.unwrap();
        tags.push(response.headers()[ETAG].to_str().unwrap().to_owned());
    }

    assert_eq!(tags, vec!["\"638-741\""; 3]);
}

#[tokio::test]
async fn build_change_invalidates_every_validator() {
    let database = MockDatabase::postgres();
    let supplier = Arc::new(database.supplier());
    let calls = Arc::new(AtomicUsize::new(0));

    let before = layer(&supplier).layer(handler(calls.clone()));
    let response = before.oneshot(get(None)).await.unwrap();
    let etag = response.headers()[ETAG].to_str().unwrap().to_owned();

    let after = ConditionalGet::builder()
        .evaluator(Evaluator::builder("639").build())
        .supplier(supplier.clone())
        .build()
        .layer(handler(calls.clone()));
    let response = after.oneshot(get(Some(&etag))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[ETAG], "\"639-741:741:\"");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cold_requests_agree() {
    let database = MockDatabase::sql_server()
        .with(Capability::ServerStatePermission)
        .with(Capability::ChangeTracking);
    database.write();
    let supplier = Arc::new(database.supplier());
    let service = layer(&supplier).layer(handler(Arc::new(AtomicUsize::new(0))));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move {
                let response = service.oneshot(get(None)).await.unwrap();
                response.headers()[ETAG].to_str().unwrap().to_owned()
            })
        })
        .collect();

    let mut tags = Vec::new();
    for task in tasks {
        tags.push(task.await.unwrap());
    }

    assert!(tags.iter().all(|tag| tag == &tags[0]));
    assert_eq!(tags[0], "\"638-2026/10/19T08:00:00:001\"");
    assert!(!tags[0].contains(' '));
    assert_eq!(
        supplier.freshness().cache().get(),
        Some(Strategy::SqlServerLogSequence)
    );
    assert_eq!(database.counters().opens(), 16);
    assert_eq!(database.counters().closes(), 16);
}
