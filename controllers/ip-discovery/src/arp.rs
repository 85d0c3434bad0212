//! Parser for the kernel neighbour table (`/proc/net/arp` format).
//!
//! ```text
//! IP address       HW type     Flags       HW address            Mask     Device
//! 192.168.1.17     0x1         0x2         06:fe:1a:2b:3c:4d     *        br0
//! ```

use crds::ArpEntry;

/// Parses `contents`, keeping only entries on `bridge`.
///
/// The header line and rows that do not have exactly six fields are skipped.
pub fn parse_arp_table(contents: &str, bridge: &str) -> Vec<ArpEntry> {
    contents
        .lines()
        .filter(|line| !line.starts_with("IP"))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [ip, hw_type, flags, hw_address, mask, device] = fields.as_slice() else {
                return None;
            };
            (*device == bridge).then(|| ArpEntry {
                ip: (*ip).to_string(),
                hw_type: (*hw_type).to_string(),
                flags: (*flags).to_string(),
                hw_address: (*hw_address).to_string(),
                mask: (*mask).to_string(),
                device: (*device).to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
IP address       HW type     Flags       HW address            Mask     Device
192.168.1.17     0x1         0x2         06:fe:1a:2b:3c:4d     *        br0
10.0.0.1         0x1         0x2         52:54:00:12:34:56     *        ens33
192.168.1.18     0x1         0x0         00:00:00:00:00:00     *
192.168.1.19     0x1         0x2         06:fe:aa:bb:cc:dd     *        br0
";

    #[test]
    fn test_keeps_bridge_entries_only() {
        let table = parse_arp_table(SAMPLE, "br0");
        assert_eq!(table.len(), 2);
        assert_eq!(
            table[0],
            ArpEntry {
                ip: "192.168.1.17".to_string(),
                hw_type: "0x1".to_string(),
                flags: "0x2".to_string(),
                hw_address: "06:fe:1a:2b:3c:4d".to_string(),
                mask: "*".to_string(),
                device: "br0".to_string(),
            }
        );
        assert_eq!(table[1].ip, "192.168.1.19");
    }

    #[test]
    fn test_other_bridge() {
        let table = parse_arp_table(SAMPLE, "ens33");
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].hw_address, "52:54:00:12:34:56");
    }

    #[test]
    fn test_empty_and_header_only() {
        assert!(parse_arp_table("", "br0").is_empty());
        assert!(parse_arp_table("IP address HW type Flags HW address Mask Device\n", "br0").is_empty());
    }
}
