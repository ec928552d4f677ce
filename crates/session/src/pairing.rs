//! Terminal rendering of pairing payloads.

use {
    qrcode::{QrCode, render::unicode},
    tracing::{info, warn},
};

/// Render a pairing payload as a scannable QR block in the log output.
pub fn print_to_terminal(payload: &str) {
    match QrCode::new(payload.as_bytes()) {
        Ok(code) => {
            let rendered = code.render::<unicode::Dense1x2>().quiet_zone(true).build();
            info!("scan the pairing code below\n{rendered}");
        },
        Err(e) => {
            warn!(error = %e, "failed to render pairing code");
        },
    }
}
