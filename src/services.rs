//! Service naming from port number and banner content.

/// Well-known TCP ports and the service usually found there.
const WELL_KNOWN: &[(u16, &str)] = &[
    (21, "FTP"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (80, "HTTP"),
    (110, "POP3"),
    (111, "RPCbind"),
    (135, "MSRPC"),
    (139, "NetBIOS"),
    (143, "IMAP"),
    (389, "LDAP"),
    (443, "HTTPS"),
    (445, "SMB"),
    (465, "SMTPS"),
    (587, "SMTP"),
    (993, "IMAPS"),
    (995, "POP3S"),
    (1433, "MSSQL"),
    (1521, "Oracle"),
    (1883, "MQTT"),
    (2049, "NFS"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (5432, "PostgreSQL"),
    (5672, "AMQP"),
    (5900, "VNC"),
    (6379, "Redis"),
    (8000, "HTTP"),
    (8080, "HTTP"),
    (8443, "HTTPS"),
    (9200, "Elasticsearch"),
    (11211, "Memcached"),
    (27017, "MongoDB"),
];

/// Static table lookup.
pub fn service_for_port(port: u16) -> Option<&'static str> {
    WELL_KNOWN
        .binary_search_by_key(&port, |&(p, _)| p)
        .ok()
        .map(|i| WELL_KNOWN[i].1)
}

/// Protocol recognised from an unprompted greeting, if any.
pub fn service_from_banner(banner: &str) -> Option<&'static str> {
    let b = banner.trim_start();
    if b.is_empty() {
        return None;
    }
    if b.starts_with("SSH-") {
        return Some("SSH");
    }
    if b.starts_with("HTTP/") {
        return Some("HTTP");
    }
    if b.starts_with("+OK") {
        return Some("POP3");
    }
    if b.starts_with("* OK") {
        return Some("IMAP");
    }
    if b.starts_with("RFB ") {
        return Some("VNC");
    }
    if b.starts_with("220") {
        let lower = b.to_ascii_lowercase();
        // SMTP greetings often carry an `ftp.` or `mail.` host name, so the
        // protocol token is checked before either host-name hint.
        if lower.contains("smtp") {
            return Some("SMTP");
        }
        if lower.contains("ftp") {
            return Some("FTP");
        }
        if lower.contains("mail") {
            return Some("SMTP");
        }
        return None;
    }
    if is_mysql_handshake(banner) {
        return Some("MySQL");
    }
    None
}

/// MySQL initial handshake as sanitized text: a 3-byte little-endian length
/// (high bytes zero), sequence id 0, then protocol version 10.
fn is_mysql_handshake(banner: &str) -> bool {
    // The low length byte may be any value, possibly escaped.
    let rest = if let Some(tail) = banner.strip_prefix("\\x") {
        tail.get(2..)
    } else if let Some(tail) = banner.strip_prefix('\\') {
        tail.get(1..)
    } else {
        let mut chars = banner.chars();
        chars.next();
        Some(chars.as_str())
    };
    rest.is_some_and(|r| r.starts_with("\\x00\\x00\\x00\\x0a"))
}

/// Name the service behind `port`. A recognised banner wins over the port table.
///
/// An ambiguous `220` greeting keeps the table entry for FTP/SMTP ports.
pub fn classify(port: u16, banner: &str) -> Option<&'static str> {
    service_from_banner(banner).or_else(|| service_for_port(port))
}
