use std::sync::mpsc;

use anyhow::{Context, Result};

/// Sends `value` on `sender`, logging a warning if it fails to send.
pub fn send_or_log_warning<T>(sender: &mpsc::SyncSender<T>, description: &str, value: T) {
    if sender.send(value).is_err() {
        log::warn!("Failed to send {} on channel.", description);
    }
}

/// Sends a request built around a fresh rendezvous response channel, and waits for the response.
///
/// `make_request` receives the sending half of the response channel, which the serving side is
/// expected to reply on exactly once.
pub fn request_response<Req, Resp>(
    request_sender: &mpsc::SyncSender<Req>,
    description: &str,
    make_request: impl FnOnce(mpsc::SyncSender<Resp>) -> Req,
) -> Result<Resp> {
    let (response_sender, response_receiver) = mpsc::sync_channel(0);
    request_sender
        .send(make_request(response_sender))
        .map_err(|_| anyhow::anyhow!("request channel closed"))
        .with_context(|| format!("sending {} request", description))?;
    response_receiver
        .recv()
        .with_context(|| format!("receiving {} response", description))
}
