//! End-to-end orchestration behaviour: retries, failover, cooldowns,
//! quota and emergency fallback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use std::sync::atomic::{AtomicU32, Ordering};

use url::Url;

use textgen_gateway::backends::http::HttpCompletionBackend;
use textgen_gateway::backends::mock::ScriptedBackend;
use textgen_gateway::backends::{
    BackendDescriptor, BackendErrorKind, CompletionBackend, DisableReason,
};
use textgen_gateway::clock::{Clock, ManualClock};
use textgen_gateway::emergency::EmergencyTemplates;
use textgen_gateway::orchestrator::{GenerationRequest, EMERGENCY_BACKEND};
use textgen_gateway::quality::ContentValidator;
use textgen_gateway::resilience::{FailureKind, RetryPolicy};

mod common;
use common::{orchestrator, registry, rich_text, scripted};

#[tokio::test]
async fn test_rate_limited_backend_retried_then_next_backend() {
    let clock = Arc::new(ManualClock::new());
    let p1 = Arc::new(ScriptedBackend::failing(BackendErrorKind::RateLimited));
    let p2 = Arc::new(ScriptedBackend::replying(rich_text("avatar")));
    let p3 = Arc::new(ScriptedBackend::replying(rich_text("avatar")));
    let orch = orchestrator(registry(
        &clock,
        vec![scripted("P1", 1, &p1), scripted("P2", 2, &p2), scripted("P3", 3, &p3)],
    ));

    let result = orch.generate(GenerationRequest::new("describe", "avatar")).await;

    assert_eq!(result.backend_used, "P2");
    assert_eq!(result.attempts, 4);
    assert!(!result.emergency_mode);
    assert_eq!(p1.calls(), 3);
    assert_eq!(p2.calls(), 1);
    assert_eq!(p3.calls(), 0);

    // Two backoff pauses: base 2 s, then 4 s, each with up to 10% jitter.
    let sleeps = clock.sleeps();
    assert_eq!(sleeps.len(), 2);
    assert!(sleeps[0] >= Duration::from_secs(2) && sleeps[0] <= Duration::from_millis(2200));
    assert!(sleeps[1] >= Duration::from_secs(4) && sleeps[1] <= Duration::from_millis(4400));

    // Third consecutive failure opened P1's circuit.
    let p1_state = orch.registry().get("P1").unwrap().snapshot();
    assert!(!p1_state.available);
    assert_eq!(p1_state.disabled_reason, Some(DisableReason::Failures));
}

#[tokio::test]
async fn test_all_quota_exceeded_falls_back_to_emergency_template() {
    let clock = Arc::new(ManualClock::new());
    let a = Arc::new(ScriptedBackend::failing(BackendErrorKind::QuotaExceeded));
    let b = Arc::new(ScriptedBackend::failing(BackendErrorKind::QuotaExceeded));
    let orch = orchestrator(registry(&clock, vec![scripted("a", 1, &a), scripted("b", 2, &b)]));

    let request = GenerationRequest::new("describe", "sales_funnel")
        .with_context("product", "FocusApp")
        .with_context("niche", "productivity");
    let result = orch.generate(request.clone()).await;

    assert!(result.emergency_mode);
    assert_eq!(result.backend_used, EMERGENCY_BACKEND);
    assert_eq!(result.model, None);
    assert_eq!(result.attempts, 2);
    assert!(!result.text.trim().is_empty());
    assert_eq!(
        result.text,
        EmergencyTemplates::new().render("sales_funnel", &request.context)
    );
    // Quota failures are not retried on the same backend.
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
    assert!(clock.sleeps().is_empty());

    let status = orch.get_status();
    assert_eq!(status.available_backends, 0);
    assert_eq!(
        status.backends["a"].disabled_reason,
        Some(DisableReason::QuotaExceeded)
    );
}

#[tokio::test]
async fn test_too_short_output_moves_to_next_backend() {
    let clock = Arc::new(ManualClock::new());
    let terse = Arc::new(ScriptedBackend::replying("Forty characters of text, nothing else."));
    let thorough = Arc::new(ScriptedBackend::replying(rich_text("analysis")));
    let orch = orchestrator(registry(
        &clock,
        vec![scripted("terse", 1, &terse), scripted("thorough", 2, &thorough)],
    ));

    let result = orch.generate(GenerationRequest::new("analyse", "analysis")).await;

    assert_eq!(result.backend_used, "thorough");
    assert_eq!(result.attempts, 2);
    assert_eq!(terse.calls(), 1);

    // A single rejection is a light penalty: counted, but no streak yet.
    let state = orch.registry().get("terse").unwrap().snapshot();
    assert_eq!(state.error_count, 1);
    assert_eq!(state.consecutive_failures, 0);
    assert!(state.available);
}

#[tokio::test]
async fn test_repetitive_output_is_rejected() {
    let repetitive = (0..100)
        .map(|i| format!("term{}", i % 15))
        .collect::<Vec<_>>()
        .join(" ");

    let verdict = ContentValidator::default().validate(&repetitive, "avatar");
    assert!(!verdict.passed);
    assert_eq!(verdict.reason.unwrap().label(), "repetitive");

    let clock = Arc::new(ManualClock::new());
    let backend = Arc::new(ScriptedBackend::replying(repetitive));
    let orch = orchestrator(registry(&clock, vec![scripted("echo", 1, &backend)]));

    let result = orch.generate(GenerationRequest::new("describe", "avatar")).await;
    assert!(result.emergency_mode);
    assert_eq!(result.attempts, 1);
}

#[tokio::test]
async fn test_circuit_stays_open_until_cooldown_elapses() {
    let clock = Arc::new(ManualClock::new());
    let flaky = Arc::new(ScriptedBackend::failing(BackendErrorKind::Transient));
    let orch = orchestrator(registry(&clock, vec![scripted("flaky", 1, &flaky)]));

    let result = orch.generate(GenerationRequest::new("p", "avatar")).await;
    assert!(result.emergency_mode);
    assert_eq!(flaky.calls(), 3);

    let entry = orch.registry().get("flaky").unwrap().clone();
    let state = entry.snapshot();
    assert!(!state.available);
    assert_eq!(state.consecutive_failures, 3);
    let until = state.disabled_until.unwrap();

    let remaining = until.duration_since(clock.now()).unwrap();
    clock.advance(remaining - Duration::from_secs(1));
    assert!(orch.registry().candidates("avatar").is_empty());
    assert!(!orch.is_available());

    let again = orch.generate(GenerationRequest::new("p", "avatar")).await;
    assert!(again.emergency_mode);
    assert_eq!(again.attempts, 0);
    assert_eq!(flaky.calls(), 3);

    clock.advance(Duration::from_secs(1));
    assert_eq!(orch.registry().candidates("avatar").len(), 1);
    let state = entry.snapshot();
    assert!(state.available);
    assert_eq!(state.consecutive_failures, 0);
    assert_eq!(state.disabled_until, None);
}

#[tokio::test]
async fn test_success_resets_failure_streak() {
    let clock = Arc::new(ManualClock::new());
    let backend = Arc::new(
        ScriptedBackend::replying(rich_text("avatar")).then_fail(BackendErrorKind::RateLimited, 2),
    );
    let orch = orchestrator(registry(&clock, vec![scripted("b", 1, &backend)]));

    let result = orch.generate(GenerationRequest::new("p", "avatar")).await;

    assert_eq!(result.backend_used, "b");
    assert_eq!(result.attempts, 3);
    let state = orch.registry().get("b").unwrap().snapshot();
    assert_eq!(state.consecutive_failures, 0);
    assert_eq!(state.error_count, 2);
    assert_eq!(state.last_success_at, Some(clock.now()));
}

#[tokio::test]
async fn test_quota_window_blocks_then_resets() {
    let clock = Arc::new(ManualClock::new());
    let backend = Arc::new(ScriptedBackend::replying(rich_text("avatar")));
    let descriptor = BackendDescriptor::new("hourly", "m", 1).with_hourly_limit(2);
    let registry = registry(&clock, vec![(descriptor, backend.clone() as Arc<dyn CompletionBackend>)]);
    let orch = orchestrator(registry);
    let entry = orch.registry().get("hourly").unwrap().clone();
    let quota = orch.registry().quota();

    assert!(quota.can_consume(&entry));
    orch.generate(GenerationRequest::new("p", "avatar")).await;
    orch.generate(GenerationRequest::new("p", "avatar")).await;
    assert!(!quota.can_consume(&entry));
    assert_eq!(quota.remaining(&entry), Some(0));
    assert!(quota.consume(&entry).is_err());

    // Exhausted backends are not candidates.
    let blocked = orch.generate(GenerationRequest::new("p", "avatar")).await;
    assert!(blocked.emergency_mode);
    assert_eq!(backend.calls(), 2);

    clock.advance(Duration::from_secs(3600));
    assert!(quota.can_consume(&entry));
    assert_eq!(quota.remaining(&entry), Some(2));
    let resumed = orch.generate(GenerationRequest::new("p", "avatar")).await;
    assert_eq!(resumed.backend_used, "hourly");
}

#[tokio::test]
async fn test_emergency_when_every_backend_disabled() {
    let clock = Arc::new(ManualClock::new());
    let a = Arc::new(ScriptedBackend::replying(rich_text("avatar")));
    let b = Arc::new(ScriptedBackend::replying(rich_text("avatar")));
    let orch = orchestrator(registry(&clock, vec![scripted("a", 1, &a), scripted("b", 2, &b)]));

    for name in ["a", "b"] {
        let entry = orch.registry().get(name).unwrap().clone();
        orch.registry()
            .breaker()
            .record_failure(&entry, FailureKind::QuotaExceeded);
    }

    let result = orch.generate(GenerationRequest::new("p", "unknown_component")).await;
    assert!(result.emergency_mode);
    assert!(!result.text.trim().is_empty());
    assert_eq!(result.attempts, 0);
    assert_eq!(a.calls() + b.calls(), 0);
}

#[tokio::test]
async fn test_quota_cooldown_reactivates_before_next_selection() {
    let clock = Arc::new(ManualClock::new());
    let backend = Arc::new(
        ScriptedBackend::replying(rich_text("competition")).then_fail(BackendErrorKind::QuotaExceeded, 1),
    );
    let orch = orchestrator(registry(&clock, vec![scripted("only", 1, &backend)]));

    let first = orch.generate(GenerationRequest::new("p", "competition")).await;
    assert!(first.emergency_mode);
    assert!(!orch.get_status().backends["only"].available);

    clock.advance(Duration::from_secs(3601));
    let second = orch.generate(GenerationRequest::new("p", "competition")).await;
    assert_eq!(second.backend_used, "only");
    assert!(orch.get_status().backends["only"].available);
}

#[tokio::test(start_paused = true)]
async fn test_slow_backend_times_out_as_transient() {
    let clock = Arc::new(ManualClock::new());
    let slow = Arc::new(
        ScriptedBackend::replying(rich_text("avatar")).with_delay(Duration::from_secs(120)),
    );
    let fast = Arc::new(ScriptedBackend::replying(rich_text("avatar")));
    let orch = orchestrator(registry(&clock, vec![scripted("slow", 1, &slow), scripted("fast", 2, &fast)]))
        .with_attempt_timeout(Duration::from_secs(60));

    let result = orch.generate(GenerationRequest::new("p", "avatar")).await;

    assert_eq!(result.backend_used, "fast");
    assert_eq!(slow.calls(), 3);
    assert_eq!(result.attempts, 4);
    assert_eq!(orch.registry().get("slow").unwrap().snapshot().consecutive_failures, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_never_exceed_quota() {
    let clock = Arc::new(ManualClock::new());
    let limited = Arc::new(ScriptedBackend::replying(rich_text("avatar")).with_delay(Duration::from_millis(5)));
    let spare = Arc::new(ScriptedBackend::replying(rich_text("avatar")));
    let registry = registry(
        &clock,
        vec![
            (
                BackendDescriptor::new("limited", "m", 1).with_hourly_limit(5),
                limited.clone() as Arc<dyn CompletionBackend>,
            ),
            scripted("spare", 2, &spare),
        ],
    );
    let orch = Arc::new(orchestrator(registry));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let orch = orch.clone();
            tokio::spawn(async move { orch.generate(GenerationRequest::new("p", "avatar")).await })
        })
        .collect();

    let mut used = HashMap::new();
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(!result.emergency_mode);
        *used.entry(result.backend_used).or_insert(0) += 1;
    }

    assert_eq!(used.get("limited"), Some(&5));
    assert_eq!(used.get("spare"), Some(&5));
    assert_eq!(limited.calls(), 5);
    let entry = orch.registry().get("limited").unwrap().clone();
    assert_eq!(orch.registry().quota().remaining(&entry), Some(0));
}

#[tokio::test]
async fn test_require_tools_skips_plain_backends() {
    let clock = Arc::new(ManualClock::new());
    let plain = Arc::new(ScriptedBackend::replying(rich_text("avatar")));
    let tooled = Arc::new(ScriptedBackend::replying(rich_text("avatar")));
    let orch = orchestrator(registry(
        &clock,
        vec![
            scripted("plain", 1, &plain),
            (
                BackendDescriptor::new("tooled", "m", 2).with_tools(),
                tooled.clone() as Arc<dyn CompletionBackend>,
            ),
        ],
    ));

    let with_tools = orch
        .generate(GenerationRequest::new("p", "avatar").requiring_tools())
        .await;
    assert_eq!(with_tools.backend_used, "tooled");
    assert_eq!(plain.calls(), 0);

    let without = orch.generate(GenerationRequest::new("p", "avatar")).await;
    assert_eq!(without.backend_used, "plain");
}

#[tokio::test]
async fn test_component_priority_map_overrides_default_rank() {
    let clock = Arc::new(ManualClock::new());
    let a = Arc::new(ScriptedBackend::replying(rich_text("avatar")));
    let b = Arc::new(ScriptedBackend::replying(rich_text("avatar")));
    let mut registry = registry(&clock, vec![scripted("a", 1, &a), scripted("b", 2, &b)]);
    registry
        .set_priorities("avatar", vec!["b".to_string(), "a".to_string()])
        .unwrap();
    let orch = orchestrator(registry);

    assert_eq!(orch.generate(GenerationRequest::new("p", "avatar")).await.backend_used, "b");
    assert_eq!(orch.generate(GenerationRequest::new("p", "analysis")).await.backend_used, "a");
}

#[tokio::test]
async fn test_http_backend_rate_limit_then_success() {
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    let reply = serde_json::json!({ "text": rich_text("avatar") }).to_string();
    let addr = common::start_completion_backend(move || {
        let counter = counter.clone();
        let reply = reply.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                (429, r#"{"error": "slow down"}"#.to_string())
            } else {
                (200, reply)
            }
        }
    })
    .await;

    let endpoint = Url::parse(&format!("http://{addr}/complete")).unwrap();
    let backend = HttpCompletionBackend::new(endpoint, "large", None, Duration::from_secs(2)).unwrap();
    let clock = Arc::new(ManualClock::new());
    let orch = orchestrator(registry(
        &clock,
        vec![(
            BackendDescriptor::new("remote", "large", 1),
            Arc::new(backend) as Arc<dyn CompletionBackend>,
        )],
    ))
    .with_retry_policy(RetryPolicy {
        base_delay: Duration::from_millis(10),
        ..RetryPolicy::default()
    });

    let result = orch.generate(GenerationRequest::new("p", "avatar")).await;

    assert_eq!(result.backend_used, "remote");
    assert_eq!(result.model.as_deref(), Some("large"));
    assert_eq!(result.attempts, 2);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_http_backend_payment_required_disables_for_quota_cooldown() {
    let addr = common::start_completion_backend(|| async {
        (402, r#"{"error": "insufficient credits"}"#.to_string())
    })
    .await;

    let endpoint = Url::parse(&format!("http://{addr}/complete")).unwrap();
    let backend = HttpCompletionBackend::new(endpoint, "large", None, Duration::from_secs(2)).unwrap();
    let clock = Arc::new(ManualClock::new());
    let orch = orchestrator(registry(
        &clock,
        vec![(
            BackendDescriptor::new("remote", "large", 1),
            Arc::new(backend) as Arc<dyn CompletionBackend>,
        )],
    ));

    let result = orch.generate(GenerationRequest::new("p", "avatar")).await;
    assert!(result.emergency_mode);
    assert_eq!(result.attempts, 1);

    let status = &orch.get_status().backends["remote"];
    assert_eq!(status.disabled_reason, Some(DisableReason::QuotaExceeded));
    assert!(!status.available);
}
