use derive_builder::Builder;

/// Runtime options recognized by the packet subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(default)]
pub struct Config {
    /// Newly generated keys are v5 (SHA-256 fingerprint) instead of v4.
    pub v5_keys: bool,
    /// Secret-key protection uses AEAD (s2k usage 253) instead of CFB + SHA-1 (254).
    pub aead_protect: bool,
    /// Iteration-count coded byte for freshly created S2K specifiers.
    pub s2k_iteration_count_byte: u8,
    /// Skip unparseable non-streaming packets instead of aborting the list.
    pub tolerant: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            v5_keys: false,
            aead_protect: false,
            s2k_iteration_count_byte: 224,
            tolerant: true,
        }
    }
}
