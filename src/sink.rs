use crate::backend::SinkRecord;
use crate::volume::ChannelVolumes;

/// Point-in-time view of one sink.
///
/// Nothing ties a snapshot back to the server: once the sink changes
/// server-side the snapshot is stale, re-query for fresh values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sink {
    pub index: u32,
    pub name: String,
    pub description: String,
    pub volume: ChannelVolumes,
    /// Average of `volume` as a percentage of full scale.
    pub volume_percent: i32,
    pub mute: bool,
}

impl Sink {
    pub fn from_record(record: &SinkRecord) -> Self {
        let volume = ChannelVolumes::new(record.volume.values().iter().copied());
        Self {
            index: record.index,
            name: record.name.clone(),
            description: record.description.clone(),
            volume_percent: volume.percent(),
            volume,
            mute: record.mute,
        }
    }

    pub fn is_muted(&self) -> bool {
        self.mute
    }
}

impl From<SinkRecord> for Sink {
    fn from(record: SinkRecord) -> Self {
        Self::from_record(&record)
    }
}

impl From<&SinkRecord> for Sink {
    fn from(record: &SinkRecord) -> Self {
        Self::from_record(record)
    }
}
