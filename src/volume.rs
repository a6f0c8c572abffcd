/// Largest channel count the audio server accepts for a volume vector.
pub const MAX_CHANNELS: usize = 32;

/// A volume in the audio server's native unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Volume(pub u32);

impl Volume {
    pub const MUTED: Self = Self(0);
    /// Full scale, 100 %.
    pub const NORM: Self = Self(0x10000);
    pub const MAX: Self = Self(u32::MAX / 2);

    /// Converts a percentage of `NORM` to a native volume.
    ///
    /// Negative percentages clamp to `MUTED`, values past the server maximum
    /// saturate at `MAX`. Rounds half away from zero.
    pub fn from_percent(percent: i32) -> Self {
        let raw = (f64::from(percent) * f64::from(Self::NORM.0) / 100.0)
            .max(0.0)
            .round();
        Self(raw.min(f64::from(Self::MAX.0)) as u32)
    }

    pub fn as_percent(self) -> i32 {
        (f64::from(self.0) * 100.0 / f64::from(Self::NORM.0)).round() as i32
    }

    pub fn is_muted(self) -> bool {
        self == Self::MUTED
    }
}

/// Per-channel volumes of one sink.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChannelVolumes {
    values: Vec<Volume>,
}

impl ChannelVolumes {
    /// Builds a vector from raw channel values, keeping at most `MAX_CHANNELS`.
    pub fn new(values: impl IntoIterator<Item = Volume>) -> Self {
        Self {
            values: values.into_iter().take(MAX_CHANNELS).collect(),
        }
    }

    pub fn uniform(channels: usize, volume: Volume) -> Self {
        Self::new(std::iter::repeat(volume).take(channels))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Volume] {
        &self.values
    }

    /// Integer mean across channels, the way the server averages.
    pub fn avg(&self) -> Volume {
        if self.values.is_empty() {
            return Volume::MUTED;
        }
        let sum: u64 = self.values.iter().map(|v| u64::from(v.0)).sum();
        Volume((sum / self.values.len() as u64) as u32)
    }

    pub fn percent(&self) -> i32 {
        self.avg().as_percent()
    }

    /// Whether the server would accept this vector: at least one channel and
    /// no channel above `Volume::MAX`.
    pub fn is_valid(&self) -> bool {
        !self.values.is_empty() && self.values.iter().all(|v| *v <= Volume::MAX)
    }

    /// Overwrites every channel with `volume`; the channel count is unchanged.
    pub fn set_all(&mut self, volume: Volume) -> &mut Self {
        for value in &mut self.values {
            *value = volume;
        }
        self
    }
}
