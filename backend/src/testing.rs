// Shared fixtures for service tests.

use crate::config::StationSettings;

/// A small, fast pipeline: 2 channels, 16-row ticks every 5 ms, 32-row windows.
pub(crate) fn small_settings() -> StationSettings {
    settings_with(&[])
}

pub(crate) fn settings_with(overrides: &[(&str, &str)]) -> StationSettings {
    let defaults = [
        ("HTTP_PORT", "0"),
        ("RING_CAPACITY", "256"),
        ("RING_CHANNELS", "2"),
        ("RING_HISTORY", "32"),
        ("RING_READ_WAIT_MS", "200"),
        ("RING_BLOCK_SIZE", "16"),
        ("SOURCE_ROWS_PER_TICK", "16"),
        ("SOURCE_TICK_MS", "5"),
        ("CONSUMER_WINDOW", "32"),
    ];
    StationSettings::from_lookup(|key| {
        overrides
            .iter()
            .chain(defaults.iter())
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.to_string())
    })
    .unwrap()
}
