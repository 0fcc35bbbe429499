//! Walks through the breaker + retrier composition used for downstream calls

use hookgate_resilience::{
    with_timeout, BreakerError, CircuitBreaker, CircuitBreakerConfig, RateLimiter, Retrier,
    RetryLabels, RetryPolicy,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::main]
async fn main() {
    println!("Resilience Patterns Demo");
    println!("========================\n");

    demo_retry().await;
    println!();
    demo_circuit_breaker().await;
    println!();
    demo_rate_limiter();
    println!();
    demo_timeout().await;
}

async fn demo_retry() {
    println!("1. Retrier (decorrelated jitter)");
    println!("--------------------------------");

    let retrier = Retrier::new(
        RetryPolicy::new(4)
            .with_base_delay(Duration::from_millis(50))
            .with_max_delay(Duration::from_millis(200)),
    );
    let labels = RetryLabels::new("demo-tenant", "downstream");
    let attempts = AtomicUsize::new(0);

    let result = retrier
        .execute(&labels, || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            println!("  Attempt {}", attempt);
            if attempt < 3 {
                Err("downstream returned 503")
            } else {
                Ok("delivered")
            }
        })
        .await;

    match result {
        Ok(value) => println!("  ✓ {} after {} attempts", value, attempts.load(Ordering::SeqCst)),
        Err(e) => println!("  ✗ {}", e),
    }
}

async fn demo_circuit_breaker() {
    println!("2. Circuit Breaker");
    println!("------------------");

    let breaker = CircuitBreaker::new(CircuitBreakerConfig::new(3, Duration::from_millis(100)))
        .with_name("downstream");

    for i in 1..=5 {
        let result: Result<(), BreakerError<&str>> =
            breaker.call(|| async { Err("connection refused") }).await;
        match result {
            Err(BreakerError::Open(e)) => println!("  Call {}: rejected ({})", i, e),
            Err(BreakerError::Inner(e)) => println!("  Call {}: failed ({})", i, e),
            Ok(()) => println!("  Call {}: ok", i),
        }
        println!("    state: {}", breaker.state().as_str());
    }

    println!("  Waiting for reset timeout...");
    tokio::time::sleep(Duration::from_millis(150)).await;

    let trial: Result<(), BreakerError<&str>> = breaker.call(|| async { Ok(()) }).await;
    println!(
        "  Trial call: {} → state {}",
        if trial.is_ok() { "ok" } else { "failed" },
        breaker.state().as_str()
    );
}

fn demo_rate_limiter() {
    println!("3. Rate Limiter (fixed window, per key)");
    println!("---------------------------------------");

    let limiter = RateLimiter::new(3, Duration::from_secs(60));
    for i in 1..=5 {
        let allowed = limiter.is_allowed("tenant-a:10.0.0.1");
        println!(
            "  Request {}: {} (remaining {})",
            i,
            if allowed { "allowed" } else { "denied" },
            limiter.remaining("tenant-a:10.0.0.1")
        );
    }
    println!(
        "  Other key allowed: {}",
        limiter.is_allowed("tenant-b:10.0.0.1")
    );
}

async fn demo_timeout() {
    println!("4. Timeout");
    println!("----------");

    let fast = with_timeout(Duration::from_millis(100), async { "pong" }).await;
    println!("  Fast ping: {:?}", fast);

    let slow = with_timeout(Duration::from_millis(50), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        "pong"
    })
    .await;
    println!("  Slow ping: {:?}", slow.map_err(|e| e.to_string()));
}
