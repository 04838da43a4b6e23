use crate::error::{MonitorError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Tag that marks a per-CPU counter line in `/proc/stat`.
pub const CPU_TAG: &str = "cpu";

/// Label of the line summing all logical cores.
pub const AGGREGATE_LABEL: &str = "cpu";

/// user nice system idle iowait irq softirq steal guest guest_nice
pub const MAX_FIELDS: usize = 10;

/// One counter line: a label and up to ten cumulative tick buckets.
///
/// Buckets the kernel did not report are zero; `nfields` records how many
/// were actually parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub label: String,
    pub fields: [u64; MAX_FIELDS],
    pub nfields: usize,
}

impl CounterSnapshot {
    pub fn new(label: impl Into<String>, values: &[u64]) -> Self {
        let mut fields = [0u64; MAX_FIELDS];
        let nfields = values.len().min(MAX_FIELDS);
        fields[..nfields].copy_from_slice(&values[..nfields]);
        Self {
            label: label.into(),
            fields,
            nfields,
        }
    }

    /// idle + iowait
    pub fn idle(&self) -> u64 {
        self.fields[3].saturating_add(self.fields[4])
    }

    /// user + nice + system + irq + softirq + steal
    pub fn non_idle(&self) -> u64 {
        [0, 1, 2, 5, 6, 7]
            .iter()
            .fold(0u64, |acc, &i| acc.saturating_add(self.fields[i]))
    }

    pub fn total(&self) -> u64 {
        self.idle().saturating_add(self.non_idle())
    }

    pub fn is_aggregate(&self) -> bool {
        self.label == AGGREGATE_LABEL
    }
}

/// All counter lines from one read, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotSet {
    entries: Vec<CounterSnapshot>,
}

impl SnapshotSet {
    pub fn new(entries: Vec<CounterSnapshot>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CounterSnapshot] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&CounterSnapshot> {
        self.entries.get(index)
    }

    pub fn has_aggregate(&self) -> bool {
        self.entries.first().is_some_and(CounterSnapshot::is_aggregate)
    }

    pub fn aggregate(&self) -> Option<&CounterSnapshot> {
        self.entries.first().filter(|e| e.is_aggregate())
    }

    /// Per-core entries, i.e. everything after the aggregate line.
    pub fn cores(&self) -> &[CounterSnapshot] {
        if self.has_aggregate() {
            &self.entries[1..]
        } else {
            &self.entries
        }
    }

    pub fn core_count(&self) -> usize {
        self.cores().len()
    }
}

/// Parse one line. Returns `None` when the line is not a CPU counter line.
///
/// Field parsing stops at the first token that is not an unsigned integer
/// or after [`MAX_FIELDS`] values. A line with no numeric fields is kept
/// with all buckets at zero.
pub fn parse_line(line: &str) -> Option<CounterSnapshot> {
    let mut tokens = line.split_whitespace();
    let label = tokens.next()?;
    if !label.starts_with(CPU_TAG) {
        return None;
    }

    let mut fields = [0u64; MAX_FIELDS];
    let mut nfields = 0;
    for token in tokens.take(MAX_FIELDS) {
        match token.parse::<u64>() {
            Ok(value) => {
                fields[nfields] = value;
                nfields += 1;
            }
            Err(_) => break,
        }
    }

    Some(CounterSnapshot {
        label: label.to_string(),
        fields,
        nfields,
    })
}

/// Parse the full text of a counter source.
pub fn parse_counters(content: &str) -> SnapshotSet {
    SnapshotSet::new(content.lines().filter_map(parse_line).collect())
}

/// Read and parse the counter source at `path`.
pub fn read_counters(path: &Path) -> Result<SnapshotSet> {
    let unavailable = |source| MonitorError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(unavailable)?;
    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(unavailable)?;
        if let Some(snapshot) = parse_line(&line) {
            entries.push(snapshot);
        }
    }

    Ok(SnapshotSet::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_STAT: &str = "\
cpu  4705 356 584 3699176 23060 0 277 0 0 0
cpu0 1393 280 290 924237 3510 0 96 0 0 0
cpu1 1100 12 95 925211 6540 0 45 0 0 0
intr 114930548 113199788 3 0 5 263 0 4 [... lots more numbers ...]
ctxt 1990473
btime 1062191376
processes 2915
procs_running 1
procs_blocked 0
softirq 183433 0 21755 12 39 0 0 0 0 0 0
";

    #[test]
    fn keeps_only_cpu_lines_in_order() {
        let set = parse_counters(PROC_STAT);
        let labels: Vec<_> = set.entries().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, ["cpu", "cpu0", "cpu1"]);
        assert!(set.has_aggregate());
        assert_eq!(set.core_count(), 2);
    }

    #[test]
    fn label_digits_are_not_counted_as_fields() {
        let set = parse_counters(PROC_STAT);
        let cpu0 = &set.entries()[1];
        assert_eq!(cpu0.fields[0], 1393);
        assert_eq!(cpu0.fields[3], 924237);
        assert_eq!(cpu0.nfields, 10);
    }

    #[test]
    fn short_line_pads_with_zeros() {
        let snapshot = parse_line("cpu3 10 20 30").unwrap();
        assert_eq!(snapshot.nfields, 3);
        assert_eq!(&snapshot.fields[..3], &[10, 20, 30]);
        assert!(snapshot.fields[3..].iter().all(|&f| f == 0));
    }

    #[test]
    fn stops_at_first_non_numeric_token() {
        let snapshot = parse_line("cpu 1 2 x 4 5").unwrap();
        assert_eq!(snapshot.nfields, 2);
        assert_eq!(snapshot.fields[3], 0);
    }

    #[test]
    fn caps_at_ten_fields() {
        let snapshot = parse_line("cpu 1 2 3 4 5 6 7 8 9 10 11 12").unwrap();
        assert_eq!(snapshot.nfields, MAX_FIELDS);
        assert_eq!(snapshot.fields[9], 10);
    }

    #[test]
    fn line_without_fields_is_retained() {
        let set = parse_counters("cpu\ncpu0 garbage\n");
        assert_eq!(set.len(), 2);
        assert!(set.entries().iter().all(|e| e.nfields == 0 && e.total() == 0));
    }

    #[test]
    fn set_without_aggregate_counts_every_line() {
        let set = parse_counters("cpu0 1 2 3 4\ncpu1 1 2 3 4\n");
        assert!(!set.has_aggregate());
        assert!(set.aggregate().is_none());
        assert_eq!(set.core_count(), 2);
    }

    #[test]
    fn missing_source_is_unavailable() {
        let err = read_counters(Path::new("/nonexistent/cpu-pulse/stat")).unwrap_err();
        assert!(matches!(err, MonitorError::SourceUnavailable { .. }));
    }

    #[test]
    fn saturating_totals_do_not_overflow() {
        let snapshot = CounterSnapshot::new("cpu", &[u64::MAX, u64::MAX, 0, u64::MAX]);
        assert_eq!(snapshot.total(), u64::MAX);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn matches_procfs_view_of_proc_stat() {
        use procfs::{CurrentSI, KernelStats};

        let ours = read_counters(Path::new("/proc/stat")).unwrap();
        let stats = KernelStats::current().unwrap();
        assert!(ours.has_aggregate());
        assert_eq!(ours.core_count(), stats.cpu_time.len());
    }
}
