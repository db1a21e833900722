use std::collections::BTreeMap;

use log::{debug, warn};

use crate::messages::{MessageRecord, StorageIndex};

/// Parts of one concatenated message seen so far.
#[derive(Debug)]
struct FragmentSet {
    /// Part count announced by the first part seen
    count: u8,
    parts: Vec<MessageRecord>,
}

impl FragmentSet {
    fn is_complete(&self) -> bool {
        self.parts.len() == usize::from(self.count)
    }

    /// Join the parts in sequence order, parts sharing a sequence number in
    /// the order they were ingested. Metadata comes from the last part.
    fn join(mut self) -> Option<(MessageRecord, Vec<StorageIndex>)> {
        self.parts.sort_by_key(|p| p.fragment.map(|f| f.sequence));
        let slots = self.parts.iter().map(|p| p.slot).collect();
        let text: String = self.parts.iter().map(|p| p.text.as_str()).collect();
        let last = self.parts.pop()?;
        Some((
            MessageRecord {
                text,
                fragment: None,
                ..last
            },
            slots,
        ))
    }
}

/// Groups the parts of concatenated messages by their reference.
///
/// A set is complete once it holds as many parts as the first part seen
/// announced. Every ingested part counts, so two parts reporting the same
/// sequence number are both joined and both slots released.
#[derive(Debug, Default)]
pub struct Reassembler {
    sets: BTreeMap<u16, FragmentSet>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `record` if it is a part of a concatenated message, otherwise hand
    /// it back.
    pub fn ingest(&mut self, record: MessageRecord) -> Option<MessageRecord> {
        let Some(info) = record.fragment else {
            return Some(record);
        };

        let set = self.sets.entry(info.reference).or_insert_with(|| FragmentSet {
            count: info.count,
            parts: Vec::new(),
        });

        if info.count != set.count {
            warn!(
                "Part {} of message {} announces {} parts, keeping {}",
                info.sequence, info.reference, info.count, set.count
            );
        }

        let seen = set
            .parts
            .iter()
            .any(|p| p.fragment.map(|f| f.sequence) == Some(info.sequence));
        if seen {
            debug!(
                "Part {} of message {} seen twice, keeping both",
                info.sequence, info.reference
            );
        }
        set.parts.push(record);
        None
    }

    /// Remove every complete set, returning the joined messages and the slots
    /// of all their parts. Incomplete sets stay.
    pub fn drain_complete(&mut self) -> (Vec<MessageRecord>, Vec<StorageIndex>) {
        let complete: Vec<u16> = self
            .sets
            .iter()
            .filter(|(_, set)| set.is_complete())
            .map(|(reference, _)| *reference)
            .collect();

        let mut messages = Vec::with_capacity(complete.len());
        let mut slots = Vec::new();
        for reference in complete {
            let joined = self.sets.remove(&reference).and_then(FragmentSet::join);
            if let Some((message, set_slots)) = joined {
                messages.push(message);
                slots.extend(set_slots);
            }
        }
        (messages, slots)
    }

    /// Number of sets still waiting for parts
    pub fn pending(&self) -> usize {
        self.sets.len()
    }
}
