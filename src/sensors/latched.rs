use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;

use super::{ReadError, SensorReadout};
use crate::config::ChannelConfig;

/// Single-slot hand-off from an interrupt handler or a background task.
///
/// The producer overwrites the slot with every new value; the sampling pass takes whatever is
/// there. Taking empties the slot, so a producer that has gone quiet shows up as `NotReady`
/// instead of repeating an old value forever.
pub struct LatchedReadout<'a, M: RawMutex> {
    slot: &'a Signal<M, f32>,
}

impl<'a, M: RawMutex> LatchedReadout<'a, M> {
    pub fn new(slot: &'a Signal<M, f32>) -> Self {
        Self { slot }
    }
}

impl<M: RawMutex> SensorReadout for LatchedReadout<'_, M> {
    async fn read(&mut self, _channel: &ChannelConfig) -> Result<f32, ReadError> {
        self.slot.try_take().ok_or(ReadError::NotReady)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelKind;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    const SOUND: ChannelConfig = ChannelConfig {
        name: "sound",
        kind: ChannelKind::Sound,
        pin: 35,
    };

    #[test]
    fn test_latest_value_wins() {
        let slot = Signal::<CriticalSectionRawMutex, f32>::new();
        let mut readout = LatchedReadout::new(&slot);

        slot.signal(10.0);
        slot.signal(12.5);
        assert_eq!(block_on(readout.read(&SOUND)), Ok(12.5));
    }

    #[test]
    fn test_empty_slot_is_not_ready() {
        let slot = Signal::<CriticalSectionRawMutex, f32>::new();
        let mut readout = LatchedReadout::new(&slot);

        assert_eq!(block_on(readout.read(&SOUND)), Err(ReadError::NotReady));

        slot.signal(3.0);
        assert_eq!(block_on(readout.read(&SOUND)), Ok(3.0));
        assert_eq!(block_on(readout.read(&SOUND)), Err(ReadError::NotReady));
    }
}
