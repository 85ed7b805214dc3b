//! End-to-end flows over composite requests: scan, rewrite, commit.

use std::collections::BTreeSet;
use std::sync::Arc;

use request_scope::catalog::{Catalog, StaticClusterMetadata};
use request_scope::host::{HostRequest, HostSubRequest, RequestAdapter, SubRequestAdapter};
use request_scope::{Error, RequestInterceptor, SubRequestOutcome};
use tracing_subscriber::EnvFilter;

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("request_scope=debug"))
        .with_test_writer()
        .try_init();
}

fn interceptor() -> RequestInterceptor {
    let catalog = Catalog::builder()
        .index("a")
        .index("b")
        .index("c")
        .index("tenant-a-1")
        .index("tenant-a-2")
        .index("tenant-b-1")
        .build();
    RequestInterceptor::new(Arc::new(StaticClusterMetadata::new(catalog)))
}

fn abc_request(action: &str) -> RequestAdapter {
    RequestAdapter::composite(
        action,
        vec![
            SubRequestAdapter::new("search", ["a"]),
            SubRequestAdapter::new("search", ["b"]),
            SubRequestAdapter::new("search", ["c"]),
        ],
    )
}

fn targets(request: &RequestAdapter) -> Vec<BTreeSet<String>> {
    request.sub_requests().iter().map(|s| s.indices()).collect()
}

#[test]
fn dropping_a_sub_request_keeps_the_others_in_order() {
    init_logging();
    let interceptor = interceptor();
    let mut ctx = interceptor.context_for(abc_request("indices:data/read/msearch"), None);

    let seen = ctx
        .scan_sub_requests(|sub| {
            if sub.indices().contains("b") {
                Ok::<_, Error>(SubRequestOutcome::Drop)
            } else {
                Ok(SubRequestOutcome::Keep(sub))
            }
        })
        .unwrap();

    assert_eq!(seen, 3);
    assert_eq!(targets(ctx.request()), vec![set(&["a"]), set(&["c"])]);
    assert_eq!(ctx.sub_requests().len(), 2);
    assert_eq!(ctx.sub_requests()[1].position(), 2);
}

#[test]
fn sub_requests_inherit_classification_and_derive_ids() {
    let interceptor = interceptor();
    let mut ctx = interceptor.context_for(
        abc_request("indices:data/read/msearch"),
        Some("task-3".to_string()),
    );
    let parent_id = ctx.id().to_string();
    let request_part = parent_id.split('-').next().unwrap_or_default().to_string();

    ctx.scan_sub_requests(|sub| {
        assert!(sub.is_read_only());
        assert!(sub.involves_indices());
        assert!(!sub.is_delegated());
        assert!(sub.id().starts_with(&format!("{}.{}-", request_part, sub.position())));
        assert!(sub.id().ends_with("#task-3"));
        Ok::<_, Error>(SubRequestOutcome::Keep(sub))
    })
    .unwrap();

    assert!(ctx.sub_requests().iter().all(|sub| sub.is_delegated()));
}

#[test]
fn rewritten_sub_request_targets_reach_the_host() {
    let interceptor = interceptor();
    let mut ctx = interceptor.context_for(
        RequestAdapter::composite(
            "indices:data/read/msearch",
            vec![
                SubRequestAdapter::new("search", ["tenant-*"]),
                SubRequestAdapter::new("search", ["a"]),
            ],
        ),
        None,
    );

    ctx.scan_sub_requests(|mut sub| {
        if sub.position() == 0 {
            sub.set_indices(set(&["tenant-a-*"]))?;
        }
        Ok::<_, Error>(SubRequestOutcome::Keep(sub))
    })
    .unwrap();

    assert_eq!(
        targets(ctx.request()),
        vec![set(&["tenant-a-1", "tenant-a-2"]), set(&["a"])]
    );
    assert_eq!(ctx.sub_requests()[0].initial_indices(), &set(&["tenant-*"]));
}

#[test]
fn replacement_sub_request_takes_the_original_place() {
    let interceptor = interceptor();
    let mut ctx = interceptor.context_for(abc_request("indices:data/read/msearch"), None);

    ctx.scan_sub_requests(|sub| {
        if sub.position() == 1 {
            let replacement = sub.replaced_by(SubRequestAdapter::new("count", ["c"]));
            Ok::<_, Error>(SubRequestOutcome::Keep(replacement))
        } else {
            Ok(SubRequestOutcome::Keep(sub))
        }
    })
    .unwrap();

    let kinds: Vec<&str> = ctx.request().sub_requests().iter().map(|s| s.kind()).collect();
    assert_eq!(kinds, ["search", "count", "search"]);
    assert_eq!(
        targets(ctx.request()),
        vec![set(&["a"]), set(&["c"]), set(&["c"])]
    );
}

#[test]
fn failing_callback_aborts_and_restores_unprocessed_sub_requests() {
    init_logging();
    let interceptor = interceptor();
    let mut ctx = interceptor.context_for(
        RequestAdapter::composite(
            "indices:data/read/msearch",
            vec![
                SubRequestAdapter::new("search", ["a"]),
                SubRequestAdapter::new("search", ["b"]),
                SubRequestAdapter::new("search", ["c"]),
                SubRequestAdapter::new("search", ["tenant-b-1"]),
            ],
        ),
        None,
    );

    let mut visited = Vec::new();
    let err = ctx
        .scan_sub_requests(|sub| {
            visited.push(sub.position());
            match sub.position() {
                0 => Ok(SubRequestOutcome::Drop),
                1 => Ok(SubRequestOutcome::Keep(sub)),
                _ => Err("policy evaluation failed"),
            }
        })
        .unwrap_err();

    assert_eq!(visited, [0, 1, 2]);
    assert!(err.is_security_failure());
    match &err {
        Error::SubRequestRewrite { sub_request, source } => {
            assert_eq!(sub_request, "search[c]");
            assert_eq!(source.to_string(), "policy evaluation failed");
        }
        other => panic!("unexpected error: {other}"),
    }

    // The dropped one stays dropped; the failing and pending ones survive
    assert_eq!(
        targets(ctx.request()),
        vec![set(&["b"]), set(&["c"]), set(&["tenant-b-1"])]
    );
    assert_eq!(ctx.sub_requests().len(), 1);
}

#[test]
fn later_sub_request_rewrites_apply_on_commit() {
    let interceptor = interceptor();
    let mut ctx = interceptor.context_for(abc_request("indices:data/write/bulk"), None);

    ctx.scan_sub_requests(|sub| Ok::<_, Error>(SubRequestOutcome::Keep(sub)))
        .unwrap();
    assert!(!ctx.sub_requests()[0].is_read_only());

    ctx.sub_requests_mut()[0]
        .set_indices(set(&["tenant-a-1"]))
        .unwrap();
    assert_eq!(targets(ctx.request())[0], set(&["a"]));

    ctx.commit();

    assert_eq!(
        targets(ctx.request()),
        vec![set(&["tenant-a-1"]), set(&["b"]), set(&["c"])]
    );
}

#[test]
fn sub_request_empty_rewrite_is_refused() {
    let interceptor = interceptor();
    let mut ctx = interceptor.context_for(abc_request("indices:data/write/bulk"), None);

    let err = ctx
        .scan_sub_requests(|mut sub| {
            sub.set_indices(BTreeSet::new())?;
            Ok::<_, Error>(SubRequestOutcome::Keep(sub))
        })
        .unwrap_err();

    match err {
        Error::SubRequestRewrite { source, .. } => {
            let inner = source.downcast_ref::<Error>();
            assert!(matches!(inner, Some(Error::EmptyIndexSet { .. })));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ctx.request().sub_requests().len(), 3);
}

#[test]
fn sub_request_expansion_is_best_effort() {
    let interceptor = interceptor();
    let mut ctx = interceptor.context_for(
        RequestAdapter::composite(
            "indices:data/read/msearch",
            vec![SubRequestAdapter::new("search", ["tenant-a-*"])],
        ),
        None,
    );

    ctx.scan_sub_requests(|sub| {
        assert_eq!(sub.expanded_indices(None), set(&["tenant-a-1", "tenant-a-2"]));
        assert!(sub.expanded_indices(Some(&set(&["unknown"]))).is_empty());
        Ok::<_, Error>(SubRequestOutcome::Keep(sub))
    })
    .unwrap();
}

#[test]
fn composite_without_sub_requests_scans_nothing() {
    let interceptor = interceptor();
    let mut ctx = interceptor.context_for(
        RequestAdapter::composite("indices:data/read/msearch", Vec::new()),
        None,
    );

    assert!(!ctx.has_sub_requests());
    let seen = ctx
        .scan_sub_requests(|sub| Ok::<_, Error>(SubRequestOutcome::Keep(sub)))
        .unwrap();
    assert_eq!(seen, 0);
}

#[test]
fn commit_after_failed_scan_keeps_restored_sub_requests() {
    let interceptor = interceptor();
    let mut ctx = interceptor.context_for(abc_request("indices:data/write/bulk"), None);

    let result = ctx.scan_sub_requests(|sub| {
        if sub.position() == 0 {
            Ok(SubRequestOutcome::Keep(sub))
        } else {
            Err("rule lookup failed")
        }
    });
    assert!(result.is_err());
    assert_eq!(
        targets(ctx.request()),
        vec![set(&["a"]), set(&["b"]), set(&["c"])]
    );

    ctx.sub_requests_mut()[0].set_indices(set(&["c"])).unwrap();
    ctx.commit();

    assert_eq!(
        targets(ctx.request()),
        vec![set(&["c"]), set(&["b"]), set(&["c"])]
    );
    assert_eq!(ctx.indices().unwrap(), &set(&["b", "c"]));
}

#[test]
fn composite_targets_follow_kept_sub_requests() {
    let interceptor = interceptor();
    let mut ctx = interceptor.context_for(abc_request("indices:data/read/msearch"), None);
    assert_eq!(ctx.indices().unwrap(), &set(&["a", "b", "c"]));

    ctx.scan_sub_requests(|sub| {
        if sub.indices().contains("b") {
            Ok::<_, Error>(SubRequestOutcome::Drop)
        } else {
            Ok(SubRequestOutcome::Keep(sub))
        }
    })
    .unwrap();

    assert_eq!(ctx.indices().unwrap(), &set(&["a", "c"]));
    assert_eq!(ctx.initial_indices().unwrap(), &set(&["a", "b", "c"]));
}
