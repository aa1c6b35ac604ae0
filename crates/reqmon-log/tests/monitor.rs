//! End-to-end tests for `RequestMonitor` over a file-backed pool.

use std::collections::HashSet;
use std::thread;

use reqmon_db::{create_pool, DbRuntimeSettings};
use reqmon_ingest::{CaptureGate, RawRequest, SkipReason};
use reqmon_log::{LogFilter, MonitorError, Recorded, RequestMonitor, SearchRequest};
use reqmon_types::DeviceType;
use tempfile::TempDir;

const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
    AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

fn monitor() -> (RequestMonitor, TempDir) {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("reqmon.db");
    let pool = create_pool(
        path.to_str().expect("temp path should be utf-8"),
        DbRuntimeSettings::default(),
    )
    .expect("pool should be created");
    let monitor = RequestMonitor::new(pool, CaptureGate::default());
    monitor.on_enable().expect("enable should succeed");
    (monitor, dir)
}

fn page_view(path: &str) -> RawRequest {
    RawRequest::new("GET", path)
        .with_header("Host", "shop.example")
        .with_header("User-Agent", IPHONE_UA)
        .with_header("X-Forwarded-For", "10.0.0.1, 203.0.113.5")
        .with_remote_addr("127.0.0.1:40000")
}

fn stored_id(outcome: Recorded) -> i64 {
    match outcome {
        Recorded::Stored(id) => id,
        Recorded::Skipped(reason) => panic!("expected a stored record, skipped: {reason}"),
    }
}

#[test]
fn records_and_reads_back_a_classified_request() {
    let (monitor, _dir) = monitor();

    let id = stored_id(monitor.record(&page_view("/products/42?ref=mail")).unwrap());
    let record = monitor
        .details(id)
        .expect("lookup should succeed")
        .expect("record should exist");

    assert_eq!(record.method, "GET");
    assert_eq!(record.url, "http://shop.example/products/42?ref=mail");
    assert_eq!(record.ip_address, "203.0.113.5");
    assert_eq!(record.browser, "Safari 604.1");
    assert_eq!(record.device_type, DeviceType::Mobile);
    assert_eq!(record.referer, "Direct");
    assert_eq!(record.status_code, 200);
    assert_eq!(record.user_agent, IPHONE_UA);
}

#[test]
fn gate_skips_are_reported_and_not_stored() {
    let (monitor, _dir) = monitor();

    let mut signed_in = page_view("/");
    signed_in.authenticated = true;
    let xhr = page_view("/cart").with_header("X-Requested-With", "XMLHttpRequest");
    let admin = page_view("/admin/settings");

    assert_eq!(
        monitor.record(&signed_in).unwrap(),
        Recorded::Skipped(SkipReason::Authenticated)
    );
    assert_eq!(
        monitor.record(&xhr).unwrap(),
        Recorded::Skipped(SkipReason::Programmatic)
    );
    assert_eq!(
        monitor.record(&admin).unwrap(),
        Recorded::Skipped(SkipReason::ExcludedPath)
    );

    let page = monitor.search(&SearchRequest::default()).unwrap();
    assert_eq!(page.total, 0);
}

#[test]
fn invalid_descriptor_is_an_ingest_error() {
    let (monitor, _dir) = monitor();

    let err = monitor
        .record(&RawRequest::new("", "/"))
        .expect_err("empty method should fail");
    assert!(matches!(err, MonitorError::Ingest(_)), "got {err:?}");
}

#[test]
fn concurrent_appends_get_unique_ids() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 25;

    let (monitor, _dir) = monitor();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let monitor = monitor.clone();
            thread::spawn(move || {
                (0..PER_THREAD)
                    .map(|i| {
                        let outcome = monitor
                            .record(&page_view(&format!("/t{t}/r{i}")))
                            .expect("append should succeed");
                        stored_id(outcome)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        let thread_ids = handle.join().expect("worker should not panic");
        assert!(
            thread_ids.windows(2).all(|w| w[0] < w[1]),
            "ids seen by one writer should increase"
        );
        ids.extend(thread_ids);
    }

    assert_eq!(ids.len(), THREADS * PER_THREAD, "ids must be unique");
    let page = monitor.search(&SearchRequest::default()).unwrap();
    assert_eq!(page.total, (THREADS * PER_THREAD) as i64);
}

#[test]
fn search_through_the_monitor_filters_and_pages() {
    let (monitor, _dir) = monitor();
    for i in 0..25 {
        monitor.record(&page_view(&format!("/blog/{i}"))).unwrap();
    }
    monitor
        .record(
            &page_view("/pricing")
                .with_header("User-Agent", "curl/8.4.0")
                .with_header("Referer", "https://news.example/launch"),
        )
        .unwrap();

    let mobile = monitor
        .search(&SearchRequest {
            filter: LogFilter {
                device_type: Some(DeviceType::Mobile),
                ..LogFilter::default()
            },
            page: 2,
            ..SearchRequest::default()
        })
        .unwrap();
    assert_eq!(mobile.total, 25);
    assert_eq!(mobile.total_pages, 2);
    assert_eq!(mobile.logs.len(), 5);

    let launch = monitor
        .search(&SearchRequest {
            filter: LogFilter {
                search: Some("launch".to_string()),
                ..LogFilter::default()
            },
            ..SearchRequest::default()
        })
        .unwrap();
    assert_eq!(launch.total, 1);
    assert_eq!(launch.logs[0].browser, "Unknown");
    assert_eq!(launch.logs[0].device_type, DeviceType::Desktop);
}

#[test]
fn disable_keeps_log_unless_asked_to_clear() {
    let (monitor, _dir) = monitor();
    for i in 0..3 {
        monitor.record(&page_view(&format!("/p/{i}"))).unwrap();
    }

    monitor.on_disable(false).unwrap();
    monitor.on_enable().unwrap();
    assert_eq!(monitor.search(&SearchRequest::default()).unwrap().total, 3);

    monitor.on_disable(true).unwrap();
    assert_eq!(monitor.search(&SearchRequest::default()).unwrap().total, 0);
}

#[test]
fn enable_is_idempotent_and_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reqmon.db");
    let path = path.to_str().unwrap();

    let first = RequestMonitor::new(
        create_pool(path, DbRuntimeSettings::default()).unwrap(),
        CaptureGate::default(),
    );
    assert!(first.on_enable().unwrap() > 0);
    assert_eq!(first.on_enable().unwrap(), 0);
    let id = stored_id(first.record(&page_view("/kept")).unwrap());
    drop(first);

    let second = RequestMonitor::new(
        create_pool(path, DbRuntimeSettings::default()).unwrap(),
        CaptureGate::default(),
    );
    assert_eq!(second.on_enable().unwrap(), 0);
    assert!(second.details(id).unwrap().is_some());
}

#[test]
fn clear_all_reports_removed_count() {
    let (monitor, _dir) = monitor();
    for i in 0..4 {
        monitor.record(&page_view(&format!("/c/{i}"))).unwrap();
    }
    assert_eq!(monitor.clear_all().unwrap(), 4);
    assert_eq!(monitor.clear_all().unwrap(), 0);
}
