//! # Orchestrator Tests
//!
//! The run loop must stop only through the interrupt latch, and must never
//! stop while a critical section is open.

use corral::config::OrchestratorConfig;
use corral::orchestrator::Orchestrator;
use corral_core::{Cluster, Corral, Persistent, Resource};
use std::sync::Arc;
use std::time::Duration;

fn fast() -> OrchestratorConfig {
    OrchestratorConfig { tick_ms: 5 }
}

/// 1. A raised interrupt stops the loop and flushes live resources.
#[tokio::test]
async fn interrupt_stops_the_loop() {
    let corral = Arc::new(Corral::in_memory().expect("context"));
    Cluster::make(&corral, "edge", None).expect("cluster");

    let orchestrator = Orchestrator::new(Arc::clone(&corral), &fast());
    let latch = Arc::clone(corral.interrupts());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        latch.raise();
    });

    let report = tokio::time::timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .expect("loop stopped")
        .expect("run");

    assert!(report.ticks >= 1);
    assert_eq!(report.flushed, 1);
    assert_eq!(corral.interrupts().delivered(), 1);
}

/// 2. An interrupt raised inside a critical section is held until it closes.
#[tokio::test]
async fn interrupt_waits_for_critical_section() {
    let corral = Arc::new(Corral::in_memory().expect("context"));
    let orchestrator = Orchestrator::new(Arc::clone(&corral), &fast());

    {
        let _section = corral.interrupts().enter();
        corral.interrupts().raise();
        assert!(corral.interrupts().is_pending());
        assert_eq!(corral.interrupts().delivered(), 0);
    }
    assert_eq!(corral.interrupts().delivered(), 1);

    let report = tokio::time::timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .expect("loop stopped")
        .expect("run");
    assert_eq!(report.flushed, 0);
}

/// 3. Resources stay usable after the loop has shut the context down.
#[tokio::test]
async fn context_survives_shutdown() {
    let corral = Arc::new(Corral::in_memory().expect("context"));
    let cluster = Cluster::make(&corral, "edge", None).expect("cluster");

    let orchestrator = Orchestrator::new(Arc::clone(&corral), &fast());
    corral.interrupts().raise();
    orchestrator.run().await.expect("run");

    cluster.set_name("core").expect("rename");
    let reloaded: Arc<Persistent<Cluster>> = corral.get(cluster.id()).expect("lookup");
    assert_eq!(reloaded.read(|c| c.name().to_string()), "core");
}
