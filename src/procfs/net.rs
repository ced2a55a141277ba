use std::io::BufRead;

/// Byte counters summed over every non-loopback interface in `/proc/net/dev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetDevStat {
    /// Bytes received.
    pub rx_bytes: u64,
    /// Bytes transmitted.
    pub tx_bytes: u64,
}

impl std::ops::AddAssign for NetDevStat {
    fn add_assign(&mut self, rhs: Self) {
        self.rx_bytes += rhs.rx_bytes;
        self.tx_bytes += rhs.tx_bytes;
    }
}

const LOOPBACK_INTERFACE: &str = "lo";

/// Column of `tx_bytes` after the interface name; the receive side has eight columns.
const TX_BYTES_COLUMN: usize = 8;

/// Splits `  eth0: 1 2 3 ...` into the interface name and its counter columns.
fn parse_interface_line(line: &str) -> Option<(&str, impl Iterator<Item = &str>)> {
    let (iface, data) = line.trim().split_once(':')?;
    Some((iface.trim(), data.split_whitespace()))
}

/// Reads receive/transmit counters from the columns of one interface.
///
/// Returns `None` if the row is too short to reach `tx_bytes`.
/// Unparsable values count as zero.
fn stats_from_fields<'a>(fields: impl Iterator<Item = &'a str>) -> Option<NetDevStat> {
    let columns: Vec<&str> = fields.take(TX_BYTES_COLUMN + 1).collect();
    if columns.len() <= TX_BYTES_COLUMN {
        return None;
    }
    let value = |idx: usize| columns[idx].parse::<u64>().unwrap_or(0);
    Some(NetDevStat {
        rx_bytes: value(0),
        tx_bytes: value(TX_BYTES_COLUMN),
    })
}

impl NetDevStat {
    /// Sums the counters of every interface except loopback.
    ///
    /// The two header lines are skipped; malformed rows are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading from `buf` fails.
    pub fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut stat = NetDevStat::default();
        let mut line = String::new();

        for _ in 0..2 {
            buf.read_line(&mut line)?;
            line.clear();
        }

        while buf.read_line(&mut line)? != 0 {
            if let Some((iface, fields)) = parse_interface_line(&line) {
                if iface != LOOPBACK_INTERFACE {
                    if let Some(s) = stats_from_fields(fields) {
                        stat += s;
                    }
                }
            }
            line.clear();
        }

        Ok(stat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
";

    fn parse(body: &str) -> NetDevStat {
        let data = format!("{HEADER}{body}");
        NetDevStat::from_reader(&mut data.as_bytes()).unwrap()
    }

    #[test]
    fn test_empty_input() {
        let stat = NetDevStat::from_reader(&mut "".as_bytes()).unwrap();
        assert_eq!(stat, NetDevStat::default());
    }

    #[test]
    fn test_loopback_is_excluded() {
        let stat = parse(
            "    lo: 422198341   75815    0    0    0     0          0         0 422198341   75815    0    0    0     0       0          0
  eth0: 10240    100     0    0    0     0          0         0  20480   200     0    0    0     0       0          0
",
        );
        assert_eq!(
            stat,
            NetDevStat {
                rx_bytes: 10240,
                tx_bytes: 20480,
            }
        );
    }

    #[test]
    fn test_bridge_and_veth_interfaces_are_counted() {
        let stat = parse(
            " docker0: 100 1 0 0 0 0 0 0 200 2 0 0 0 0 0 0
 veth12ab: 10 1 0 0 0 0 0 0 20 2 0 0 0 0 0 0
",
        );
        assert_eq!(stat.rx_bytes, 110);
        assert_eq!(stat.tx_bytes, 220);
    }

    #[test]
    fn test_malformed_line_too_few_fields() {
        let stat = parse(" badif: 123 456\n");
        assert_eq!(stat, NetDevStat::default());
    }

    #[test]
    fn test_unparsable_values() {
        let stat = parse("  eth0: xyz abc 0 0 0 0 0 0  20480 200 0 0 0 0 0 0\n");
        assert_eq!(stat.rx_bytes, 0);
        assert_eq!(stat.tx_bytes, 20480);
    }

    #[test]
    fn test_row_ending_at_tx_bytes() {
        let stat = parse("  eth0: 100 1 0 0 0 0 0 0 300\n  eth1: 100 1 0 0 0 0 0 0\n");
        assert_eq!(stat.rx_bytes, 100);
        assert_eq!(stat.tx_bytes, 300);
    }

    #[test]
    fn test_no_space_after_colon() {
        let stat = parse("eth0:100 1 0 0 0 0 0 0 300 3 0 0 0 0 0 0\n");
        assert_eq!(stat.rx_bytes, 100);
        assert_eq!(stat.tx_bytes, 300);
    }
}
