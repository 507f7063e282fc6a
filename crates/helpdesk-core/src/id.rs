//! ID generation for helpdesk tickets and messages
//!
//! Ticket IDs are sequence-derived and human readable.
//! Format: PREFIX-NNN (e.g. TKT-001), zero padded to a configurable width.

/// Format a ticket ID from a sequence number
pub fn ticket_id(prefix: &str, width: usize, seq: u64) -> String {
    format!("{}-{:0width$}", prefix, seq, width = width)
}

/// Extract the sequence number from a ticket ID with the given prefix
pub fn parse_seq(prefix: &str, id: &str) -> Option<u64> {
    id.strip_prefix(prefix)?.strip_prefix('-')?.parse().ok()
}

/// Next free sequence number given the IDs already in use
///
/// IDs with a foreign prefix are ignored.
pub fn next_seq<'a>(prefix: &str, ids: impl IntoIterator<Item = &'a str>) -> u64 {
    ids.into_iter()
        .filter_map(|id| parse_seq(prefix, id))
        .max()
        .unwrap_or(0)
        + 1
}

/// Message ID for the nth (1-based) entry of a thread
pub fn message_id(position: usize) -> String {
    format!("msg-{}", position)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_id() {
        assert_eq!(ticket_id("TKT", 3, 1), "TKT-001");
        assert_eq!(ticket_id("TKT", 3, 1234), "TKT-1234");
        assert_eq!(ticket_id("SUP", 5, 42), "SUP-00042");
    }

    #[test]
    fn test_parse_seq() {
        assert_eq!(parse_seq("TKT", "TKT-007"), Some(7));
        assert_eq!(parse_seq("TKT", "SUP-007"), None);
        assert_eq!(parse_seq("TKT", "TKT007"), None);
        assert_eq!(parse_seq("TKT", "TKT-abc"), None);
    }

    #[test]
    fn test_next_seq() {
        assert_eq!(next_seq("TKT", Vec::<&str>::new()), 1);
        assert_eq!(next_seq("TKT", ["TKT-001", "TKT-004", "OLD-099"]), 5);
    }
}
