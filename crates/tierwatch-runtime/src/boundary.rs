//! Outermost loop boundary
//!
//! A loop body either returns `Ok(())` (a deliberate stop), returns an error,
//! or panics. Errors and panics are logged, reported as a crash, and the body
//! is started again after a cool-down. The owning task never dies from them.

use crate::report::ReportSink;
use futures::FutureExt;
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Cool-down applied after a crash unless the caller picks another
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Run `body` until it returns `Ok(())`, resurrecting it after every failure
pub async fn run_resilient<F, Fut, E>(
    source: &'static str,
    cooldown: Duration,
    sink: Arc<dyn ReportSink>,
    mut body: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    loop {
        let failure = match AssertUnwindSafe(body()).catch_unwind().await {
            Ok(Ok(())) => {
                tracing::info!(source, "loop stopped");
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("panic: {}", panic_message(payload.as_ref())),
        };

        tracing::error!(
            source,
            error = %failure,
            cooldown_secs = cooldown.as_secs(),
            "loop crashed, resurrecting after cool-down"
        );
        sink.crash(source, &failure).await;
        tokio::time::sleep(cooldown).await;
    }
}

/// Best-effort text of a panic payload
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
