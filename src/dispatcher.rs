use tracing::{debug, warn};

use crate::platform::{Outbound, Platform};

/// Outcome of delivering one reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub failed: usize,
}

/// Send each item in order. A failed send is logged and does not stop the
/// ones after it.
pub async fn dispatch<P>(platform: &P, chat_id: i64, sends: Vec<Outbound>) -> DeliveryReport
where
    P: Platform + ?Sized,
{
    let mut report = DeliveryReport::default();

    for outbound in &sends {
        report.attempted += 1;
        match platform.send(chat_id, outbound).await {
            Ok(()) => debug!("{} to chat {} delivered", outbound.method(), chat_id),
            Err(e) => {
                report.failed += 1;
                warn!("Telegram {} to chat {} failed: {}", outbound.method(), chat_id, e);
            }
        }
    }

    report
}
