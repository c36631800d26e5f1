use anyhow::{anyhow, bail, Context, Result};
use log::info;

use cip_dissect::lookup::NoopServiceDecoder;
use cip_dissect::session::ServiceOutcome;
use cip_dissect::utils::hex_to_bytes;
use cip_dissect::{DecoderConfig, MessageContext, MessageRef, Session};

/// Decode a trace of hex-encoded CIP messages, one per line, and print
/// each decoded message as JSON. Lines starting with `#` are comments.
fn main() -> Result<()> {
    let config = DecoderConfig::load()?;

    env_logger::builder()
        .filter_level(config.get_log_level())
        .init();

    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => bail!("usage: cip-dissect <trace-file>"),
    };

    let trace = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read trace file {}", path))?;

    let mut session = Session::new(config);
    let mut hook = NoopServiceDecoder;

    let mut frame = 0u64;
    for line in trace.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        frame += 1;

        let data = hex_to_bytes(line)
            .map_err(|err| anyhow!("Trace line {}: {}", frame, err))?;

        // One logical channel per trace; the frame number doubles as the
        // transport sequence so each request/response pair shares it via
        // the pairing convention below
        let ctx = MessageContext::new(MessageRef(frame), 0, (frame + 1) / 2);
        let outcome =
            ServiceOutcome::from(session.decode_message(&ctx, &data, &mut hook));
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to serialize message")?
        );
    }

    info!(
        "Decoded {} message(s), {} connection triad(s) observed",
        frame,
        session.connections().len()
    );
    Ok(())
}
