use tracing::debug;

/// Interprets a configured server port.
///
/// Accepts a plain number, a `${name:default}` wrapper (the default segment is
/// used) and a `low-high` range (the low bound is used). Blank values, `0`,
/// `random`, anything non-numeric and anything outside `1..=65535` yield
/// `fallback`.
pub fn parse_port(raw: &str, fallback: u16) -> u16 {
    match interpret(raw.trim()) {
        Some(port) => port,
        None => {
            if !raw.trim().is_empty() {
                debug!(value = raw, fallback, "unusable server port, using fallback");
            }
            fallback
        }
    }
}

fn interpret(value: &str) -> Option<u16> {
    let value = match value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        Some(inner) => inner.split(':').nth(1)?.trim(),
        None => value,
    };

    if value == "0" || value.eq_ignore_ascii_case("random") {
        return None;
    }

    let value = match value.split_once('-') {
        Some((low, _)) => low.trim(),
        None => value,
    };

    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match value.parse::<u32>() {
        Ok(port @ 1..=65535) => u16::try_from(port).ok(),
        _ => None,
    }
}
