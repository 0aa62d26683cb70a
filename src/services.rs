//! Static lookup from well-known port numbers to service labels.

/// Returns the service label for a well-known port, `"Unknown"` otherwise.
///
/// The table is fixed and the function does no I/O — labels are only ever
/// used for display and CSV export, never for fingerprinting.
#[must_use]
pub fn lookup(port: u16) -> &'static str {
    match port {
        20 => "FTP Data",
        21 => "FTP",
        22 => "SSH",
        23 => "Telnet",
        25 => "SMTP",
        53 => "DNS",
        80 => "HTTP",
        110 => "POP3",
        139 => "NetBIOS",
        143 => "IMAP",
        443 => "HTTPS",
        445 => "SMB",
        3306 => "MySQL",
        3389 => "RDP",
        8080 => "HTTP-Alt",
        _ => "Unknown",
    }
}
