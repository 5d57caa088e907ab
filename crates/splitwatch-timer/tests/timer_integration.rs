//! ---
//! sw_section: "01-core-functionality"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Stopwatch state machine and elapsed-time engine."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use splitwatch_common::{SystemClock, TimerConfig};
use splitwatch_store::{RecordStore, RouterSettings, StoreRouter};
use splitwatch_timer::{StopwatchSession, TimerEngine, TimerPhase, WatchSink};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wall_clock_run_is_saved_through_router() -> anyhow::Result<()> {
    let (sink, mut display) = WatchSink::channel();
    let engine = TimerEngine::from_config(SystemClock::shared(), &TimerConfig::default(), sink)?;
    let router = Arc::new(StoreRouter::new(RouterSettings::default(), None));
    let session = StopwatchSession::new(engine, router.clone());

    session.engine().start();
    let mut observed = 0;
    while observed < 3 {
        tokio::time::timeout(Duration::from_secs(2), display.changed()).await??;
        observed += 1;
    }
    tokio::time::sleep(Duration::from_millis(30)).await;
    session.engine().stop();

    let frozen = session.engine().elapsed_ms();
    assert!(frozen >= 30, "elapsed {frozen} shorter than the sleep");
    assert_eq!(*display.borrow(), frozen);
    assert_eq!(session.engine().phase(), TimerPhase::Stopped);

    let record = session.save(None).await?;
    assert_eq!(record.duration_ms, frozen);
    assert_eq!(router.list(None).await?, vec![record]);

    assert!(session.engine().reset());
    assert_eq!(*display.borrow(), 0);
    Ok(())
}
