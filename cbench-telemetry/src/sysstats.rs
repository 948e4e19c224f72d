//! Local OS counter collection from /proc.
//!
//! Devices never read /proc directly; they go through these helpers, which
//! degrade to `None` on any platform or permission problem so a missing
//! counter costs a data point instead of the run. Each reader has a
//! content-level parse function that is testable without a live /proc.

use std::collections::BTreeSet;

/// Read/write byte counters from one snapshot source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Per-process I/O counters from `/proc/<pid>/io`.
///
/// Returns `None` when the file is unreadable: foreign pid permissions, a
/// process that already exited, or a non-Linux host.
pub fn process_io_counters(pid: u32) -> Option<IoCounters> {
    let content = std::fs::read_to_string(format!("/proc/{}/io", pid)).ok()?;
    parse_process_io(&content)
}

/// Parse `/proc/<pid>/io` content.
pub fn parse_process_io(content: &str) -> Option<IoCounters> {
    let mut read_bytes = None;
    let mut write_bytes = None;

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("read_bytes:") {
            read_bytes = rest.trim().parse().ok();
        } else if let Some(rest) = line.strip_prefix("write_bytes:") {
            write_bytes = rest.trim().parse().ok();
        }
    }

    Some(IoCounters {
        read_bytes: read_bytes?,
        write_bytes: write_bytes?,
    })
}

/// Whole-disk I/O counters summed over all physical disks.
///
/// The coarse fallback when per-process counters are unavailable; includes
/// every process's disk activity, not just the benchmarked one.
pub fn disk_io_counters() -> Option<IoCounters> {
    let content = std::fs::read_to_string("/proc/diskstats").ok()?;
    Some(parse_diskstats_totals(&content))
}

/// Parse `/proc/diskstats` content into whole-disk byte totals.
///
/// Format (kernel 4.18+):
/// ```text
/// major minor name rd_ios rd_merges rd_sectors rd_ticks wr_ios wr_merges wr_sectors wr_ticks ...
/// ```
pub fn parse_diskstats_totals(content: &str) -> IoCounters {
    let mut totals = IoCounters::default();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue; // Skip malformed or truncated lines
        }
        if !is_physical_disk(parts[2]) {
            continue;
        }

        let sectors_read: u64 = parts[5].parse().unwrap_or(0);
        let sectors_written: u64 = parts[9].parse().unwrap_or(0);
        // Sectors in /proc/diskstats are always 512 bytes regardless of the
        // device's logical block size.
        totals.read_bytes += sectors_read * 512;
        totals.write_bytes += sectors_written * 512;
    }

    totals
}

/// Whether a /proc/diskstats device name is a whole physical disk.
///
/// Partitions and virtual devices must be excluded or the totals would count
/// the same bytes more than once.
fn is_physical_disk(name: &str) -> bool {
    const VIRTUAL_PREFIXES: [&str; 6] = ["loop", "ram", "zram", "dm-", "md", "sr"];
    if VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return false;
    }

    // nvme0n1p1 / mmcblk0p2 are partitions of nvme0n1 / mmcblk0
    if name.starts_with("nvme") || name.starts_with("mmcblk") {
        return match name.rfind('p') {
            Some(idx) if idx + 1 < name.len() => {
                !name[idx + 1..].bytes().all(|b| b.is_ascii_digit())
            }
            _ => true,
        };
    }

    // Classic sdX / vdX / hdX names: a trailing digit marks a partition
    !name.chars().last().is_some_and(|c| c.is_ascii_digit())
}

/// Cumulative CPU time of a process in clock ticks (utime + stime), from
/// `/proc/<pid>/stat`.
pub fn process_cpu_ticks(pid: u32) -> Option<u64> {
    let content = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    parse_stat_cpu_ticks(&content)
}

/// Parse utime + stime out of `/proc/<pid>/stat` content.
///
/// The comm field is parenthesized and may itself contain spaces or parens,
/// so fields are counted from the final closing paren, not the line start.
pub fn parse_stat_cpu_ticks(content: &str) -> Option<u64> {
    let rest = &content[content.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // After comm: state is field 0, utime is field 11, stime is field 12
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(utime + stime)
}

/// Kernel clock ticks per second, for converting /proc stat fields to time.
#[allow(unsafe_code)]
pub fn clock_ticks_per_second() -> u64 {
    // SAFETY: sysconf is a plain value query with no pointer arguments.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 { ticks as u64 } else { 100 }
}

/// Number of logical CPU cores, from `/proc/cpuinfo`.
pub fn logical_cpu_cores() -> Option<u32> {
    let content = std::fs::read_to_string("/proc/cpuinfo").ok()?;
    parse_cpuinfo_logical_cores(&content)
}

/// Count `processor` entries in `/proc/cpuinfo` content.
pub fn parse_cpuinfo_logical_cores(content: &str) -> Option<u32> {
    let count = content
        .lines()
        .filter(|line| line.starts_with("processor"))
        .count() as u32;
    (count > 0).then_some(count)
}

/// Number of physical CPU cores, from `/proc/cpuinfo`.
pub fn physical_cpu_cores() -> Option<u32> {
    let content = std::fs::read_to_string("/proc/cpuinfo").ok()?;
    parse_cpuinfo_physical_cores(&content)
}

/// Count distinct (physical id, core id) pairs in `/proc/cpuinfo` content.
///
/// Returns `None` when the kernel does not report the topology fields
/// (common on ARM and in some virtualized guests).
pub fn parse_cpuinfo_physical_cores(content: &str) -> Option<u32> {
    let mut package_core_pairs = BTreeSet::new();
    let mut physical_id: Option<u32> = None;
    let mut core_id: Option<u32> = None;

    for line in content.lines() {
        if line.trim().is_empty() {
            // Blank line ends one processor block
            if let (Some(package), Some(core)) = (physical_id.take(), core_id.take()) {
                package_core_pairs.insert((package, core));
            }
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "physical id" => physical_id = value.trim().parse().ok(),
            "core id" => core_id = value.trim().parse().ok(),
            _ => {}
        }
    }
    if let (Some(package), Some(core)) = (physical_id, core_id) {
        package_core_pairs.insert((package, core));
    }

    (!package_core_pairs.is_empty()).then(|| package_core_pairs.len() as u32)
}

/// CPU model string, from the first `model name` entry in `/proc/cpuinfo`.
pub fn cpu_model_name() -> Option<String> {
    let content = std::fs::read_to_string("/proc/cpuinfo").ok()?;
    parse_cpuinfo_model_name(&content)
}

/// Extract the first `model name` value from `/proc/cpuinfo` content.
pub fn parse_cpuinfo_model_name(content: &str) -> Option<String> {
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim() == "model name" {
            return Some(value.trim().to_string());
        }
    }
    None
}

/// Operating system name, from `/proc/sys/kernel/ostype`.
pub fn os_name() -> Option<String> {
    read_kernel_string("/proc/sys/kernel/ostype")
}

/// Operating system (kernel) version, from `/proc/sys/kernel/osrelease`.
pub fn os_version() -> Option<String> {
    read_kernel_string("/proc/sys/kernel/osrelease")
}

fn read_kernel_string(path: &str) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let value = content.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{Level, info};
    use tracing_subscriber::fmt;

    fn init_test_logging() {
        let _ = fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    const SAMPLE_DISKSTATS: &str = "\
   8       0 sda 5472 1928 1000 2154 2972 3024 2000 1337 0 2160 3494 0 0 0 0 0 0
   8       1 sda1 5176 1765 400000 2023 2561 2941 500000 1275 0 1970 3300 0 0 0 0 0 0
 259       0 nvme0n1 1240 10 10 30 880 20 20 40 0 60 70 0 0 0 0 0 0
 259       1 nvme0n1p1 1200 10 90000 29 850 20 90000 39 0 58 68 0 0 0 0 0 0
   7       0 loop0 50 0 70000 1 0 0 0 0 0 1 1 0 0 0 0 0 0
 253       0 dm-0 7000 0 80000 4000 5000 0 80000 2500 0 4000 6500 0 0 0 0 0 0";

    #[test]
    fn test_parse_diskstats_totals_skips_partitions_and_virtual() {
        init_test_logging();
        info!("TEST START: test_parse_diskstats_totals_skips_partitions_and_virtual");

        let totals = parse_diskstats_totals(SAMPLE_DISKSTATS);
        info!("RESULT: {:?}", totals);

        // Only sda (1000/2000 sectors) and nvme0n1 (10/20 sectors) count
        assert_eq!(totals.read_bytes, (1000 + 10) * 512);
        assert_eq!(totals.write_bytes, (2000 + 20) * 512);

        info!("TEST PASS: test_parse_diskstats_totals_skips_partitions_and_virtual");
    }

    #[test]
    fn test_parse_diskstats_totals_empty_content() {
        init_test_logging();
        let totals = parse_diskstats_totals("");
        assert_eq!(totals, IoCounters::default());
    }

    #[test]
    fn test_is_physical_disk() {
        init_test_logging();
        info!("TEST START: test_is_physical_disk");

        assert!(is_physical_disk("sda"));
        assert!(is_physical_disk("vdb"));
        assert!(is_physical_disk("nvme0n1"));
        assert!(is_physical_disk("mmcblk0"));

        assert!(!is_physical_disk("sda1"));
        assert!(!is_physical_disk("nvme0n1p2"));
        assert!(!is_physical_disk("mmcblk0p1"));
        assert!(!is_physical_disk("loop7"));
        assert!(!is_physical_disk("ram0"));
        assert!(!is_physical_disk("zram0"));
        assert!(!is_physical_disk("dm-3"));
        assert!(!is_physical_disk("md127"));
        assert!(!is_physical_disk("sr0"));

        info!("TEST PASS: test_is_physical_disk");
    }

    const SAMPLE_PROC_IO: &str = "\
rchar: 4292774
wchar: 323911
syscr: 2899
syscw: 803
read_bytes: 5455872
write_bytes: 323584
cancelled_write_bytes: 0";

    #[test]
    fn test_parse_process_io() {
        init_test_logging();
        info!("TEST START: test_parse_process_io");

        let counters = parse_process_io(SAMPLE_PROC_IO).unwrap();
        info!("RESULT: {:?}", counters);
        assert_eq!(counters.read_bytes, 5455872);
        assert_eq!(counters.write_bytes, 323584);

        info!("TEST PASS: test_parse_process_io");
    }

    #[test]
    fn test_parse_process_io_missing_fields() {
        init_test_logging();
        assert!(parse_process_io("rchar: 123\nwchar: 456").is_none());
    }

    #[test]
    fn test_parse_process_io_ignores_cancelled_writes() {
        init_test_logging();
        // cancelled_write_bytes must not be mistaken for write_bytes
        let content = "write_bytes: 100\ncancelled_write_bytes: 999\nread_bytes: 50";
        let counters = parse_process_io(content).unwrap();
        assert_eq!(counters.write_bytes, 100);
        assert_eq!(counters.read_bytes, 50);
    }

    #[test]
    fn test_parse_stat_cpu_ticks() {
        init_test_logging();
        info!("TEST START: test_parse_stat_cpu_ticks");

        // utime = 939 (field 14), stime = 184 (field 15)
        let content = "12345 (data-server) S 1 12345 12345 0 -1 4194560 \
                       12034 0 13 0 939 184 0 0 20 0 57 0 3578 2385387520 \
                       31809 18446744073709551615 1 1 0 0 0 0 0 4096 134235650 0 0 0 17 3 0 0 0 0 0";
        let ticks = parse_stat_cpu_ticks(content).unwrap();
        info!("RESULT: {} ticks", ticks);
        assert_eq!(ticks, 939 + 184);

        info!("TEST PASS: test_parse_stat_cpu_ticks");
    }

    #[test]
    fn test_parse_stat_cpu_ticks_comm_with_spaces_and_parens() {
        init_test_logging();

        // Fields after comm are positioned from the *last* closing paren
        let content = "999 (web server (v2)) R 1 999 999 0 -1 4194560 \
                       100 0 0 0 50 25 0 0 20 0 4 0 100 1000000 \
                       200 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0";
        assert_eq!(parse_stat_cpu_ticks(content), Some(75));
    }

    #[test]
    fn test_parse_stat_cpu_ticks_truncated() {
        init_test_logging();
        assert!(parse_stat_cpu_ticks("1 (x) S 1 2 3").is_none());
        assert!(parse_stat_cpu_ticks("no parens here").is_none());
    }

    #[test]
    fn test_clock_ticks_per_second_is_positive() {
        init_test_logging();
        assert!(clock_ticks_per_second() >= 1);
    }

    const SAMPLE_CPUINFO: &str = "\
processor\t: 0
vendor_id\t: GenuineIntel
model name\t: Intel(R) Core(TM) i7-4870HQ CPU @ 2.50GHz
physical id\t: 0
core id\t\t: 0

processor\t: 1
vendor_id\t: GenuineIntel
model name\t: Intel(R) Core(TM) i7-4870HQ CPU @ 2.50GHz
physical id\t: 0
core id\t\t: 1

processor\t: 2
vendor_id\t: GenuineIntel
model name\t: Intel(R) Core(TM) i7-4870HQ CPU @ 2.50GHz
physical id\t: 0
core id\t\t: 0

processor\t: 3
vendor_id\t: GenuineIntel
model name\t: Intel(R) Core(TM) i7-4870HQ CPU @ 2.50GHz
physical id\t: 0
core id\t\t: 1
";

    #[test]
    fn test_parse_cpuinfo_core_counts() {
        init_test_logging();
        info!("TEST START: test_parse_cpuinfo_core_counts");

        // 4 hyperthreads over 2 physical cores
        assert_eq!(parse_cpuinfo_logical_cores(SAMPLE_CPUINFO), Some(4));
        assert_eq!(parse_cpuinfo_physical_cores(SAMPLE_CPUINFO), Some(2));

        info!("TEST PASS: test_parse_cpuinfo_core_counts");
    }

    #[test]
    fn test_parse_cpuinfo_model_name() {
        init_test_logging();
        assert_eq!(
            parse_cpuinfo_model_name(SAMPLE_CPUINFO).as_deref(),
            Some("Intel(R) Core(TM) i7-4870HQ CPU @ 2.50GHz")
        );
    }

    #[test]
    fn test_parse_cpuinfo_without_topology_fields() {
        init_test_logging();
        // ARM-style cpuinfo reports no physical id / core id
        let content = "processor\t: 0\nBogoMIPS\t: 48.00\n\nprocessor\t: 1\nBogoMIPS\t: 48.00\n";
        assert_eq!(parse_cpuinfo_logical_cores(content), Some(2));
        assert_eq!(parse_cpuinfo_physical_cores(content), None);
        assert_eq!(parse_cpuinfo_model_name(content), None);
    }
}
