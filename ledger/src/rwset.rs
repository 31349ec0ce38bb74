// ledger/src/rwset.rs
use std::collections::BTreeMap;

/// A committed value together with the version it was committed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    pub value: Vec<u8>,
    pub version: u64,
}

/// How a buffered write must be applied at commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition {
    /// Key was observed absent; insert only if it is still absent.
    Absent,
    /// Key was observed at this version; update only if it is unchanged.
    Version(u64),
    /// Key was never read by this transaction.
    Blind,
}

/// Reads and buffered writes of one transaction.
///
/// Reads keep the first version observed for a key. Writes keep only the
/// last value per key.
#[derive(Debug, Default, Clone)]
pub struct ReadWriteSet {
    reads: BTreeMap<String, Option<u64>>,
    writes: BTreeMap<String, Vec<u8>>,
}

impl ReadWriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&mut self, key: &str, version: Option<u64>) {
        self.reads.entry(key.to_string()).or_insert(version);
    }

    pub fn write(&mut self, key: &str, value: Vec<u8>) {
        self.writes.insert(key.to_string(), value);
    }

    /// Value written earlier in this transaction, if any.
    pub fn pending(&self, key: &str) -> Option<&[u8]> {
        self.writes.get(key).map(Vec::as_slice)
    }

    pub fn reads(&self) -> impl Iterator<Item = (&str, Option<u64>)> {
        self.reads.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Keys read but not written; these only need their version re-checked.
    pub fn read_only_keys(&self) -> impl Iterator<Item = (&str, Option<u64>)> {
        self.reads()
            .filter(|(key, _)| !self.writes.contains_key(*key))
    }

    /// Buffered writes with the condition each must satisfy at commit.
    pub fn writes(&self) -> impl Iterator<Item = (&str, &[u8], WriteCondition)> {
        self.writes.iter().map(|(key, value)| {
            let condition = match self.reads.get(key) {
                Some(None) => WriteCondition::Absent,
                Some(Some(version)) => WriteCondition::Version(*version),
                None => WriteCondition::Blind,
            };
            (key.as_str(), value.as_slice(), condition)
        })
    }

    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_read_version_wins() {
        let mut rwset = ReadWriteSet::new();
        rwset.record_read("D001", Some(1));
        rwset.record_read("D001", Some(2));
        assert_eq!(rwset.reads().collect::<Vec<_>>(), vec![("D001", Some(1))]);
    }

    #[test]
    fn test_last_write_wins() {
        let mut rwset = ReadWriteSet::new();
        rwset.write("D001", b"a".to_vec());
        rwset.write("D001", b"b".to_vec());
        assert_eq!(rwset.pending("D001"), Some(&b"b"[..]));
        assert_eq!(rwset.writes().count(), 1);
    }

    #[test]
    fn test_write_conditions_follow_reads() {
        let mut rwset = ReadWriteSet::new();
        rwset.record_read("new", None);
        rwset.record_read("old", Some(4));
        rwset.record_read("seen", Some(2));
        rwset.write("new", b"1".to_vec());
        rwset.write("old", b"2".to_vec());
        rwset.write("blind", b"3".to_vec());

        let conditions: Vec<(&str, WriteCondition)> =
            rwset.writes().map(|(k, _, c)| (k, c)).collect();
        assert_eq!(
            conditions,
            vec![
                ("blind", WriteCondition::Blind),
                ("new", WriteCondition::Absent),
                ("old", WriteCondition::Version(4)),
            ]
        );
        assert_eq!(
            rwset.read_only_keys().collect::<Vec<_>>(),
            vec![("seen", Some(2))]
        );
    }

    #[test]
    fn test_read_only() {
        let mut rwset = ReadWriteSet::new();
        rwset.record_read("D001", None);
        assert!(rwset.is_read_only());
        rwset.write("D001", Vec::new());
        assert!(!rwset.is_read_only());
    }
}
