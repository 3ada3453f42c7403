// Background sweep of expired authorization codes.
//
// Codes expire after ten minutes; the sweeper deletes dead rows on the
// same cadence so the table stays bounded. Consumption correctness never
// depends on this: expiry is checked on every exchange.

use std::sync::Arc;
use std::time::Duration;

use verigate_core::context::RequestContext;
use verigate_core::logger::Logger;
use verigate_core::store::AuthCodeStore;

const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// Run forever, deleting expired authorization codes every ten minutes.
pub async fn run(codes: Arc<dyn AuthCodeStore>, logger: Logger) {
    let ctx = RequestContext::anonymous();
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    // The first tick fires immediately; skip it so startup stays quiet.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match codes.delete_expired(&ctx).await {
            Ok(0) => {}
            Ok(n) => logger.debug(&format!("swept {n} expired authorization codes")),
            Err(err) => logger.warn(&format!("authorization code sweep failed: {err}")),
        }
    }
}
