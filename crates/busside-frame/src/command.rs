//! Command identifiers understood by the BUSSide firmware.

/// Liveness probe: empty payload, empty reply.
pub const PROBE: u32 = 0;

/// SPI passthrough: argument block plus write bytes; reply carries read bytes.
pub const SPI_PASSTHROUGH: u32 = 43;

/// Returns a human-readable name for a command ID.
pub fn command_name(id: u32) -> &'static str {
    match id {
        PROBE => "PROBE",
        SPI_PASSTHROUGH => "SPI_PASSTHROUGH",
        _ => "UNKNOWN",
    }
}
