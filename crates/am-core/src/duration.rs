//! Human-readable duration tokens.

/// Parse a `<integer><unit>` duration token into whole seconds.
///
/// Unit is one of `s`, `m`, `h`, `d`; a bare integer is taken as seconds.
/// This feeds the quick-test request-shaping heuristics, so unparseable
/// input degrades to `1` second instead of failing the call.
pub fn parse_duration_secs(s: &str) -> u64 {
    let s = s.trim();
    if s.is_empty() {
        return 1;
    }

    let (num_str, multiplier) = match s.as_bytes()[s.len() - 1] {
        b's' => (&s[..s.len() - 1], 1),
        b'm' => (&s[..s.len() - 1], 60),
        b'h' => (&s[..s.len() - 1], 3_600),
        b'd' => (&s[..s.len() - 1], 86_400),
        _ => (s, 1),
    };

    match num_str.parse::<u64>() {
        Ok(n) => n.saturating_mul(multiplier),
        Err(_) => 1,
    }
}
