pub mod scenarios;
pub mod valuation;

use serde_json::Value;

/// What a command hands to the output layer.
pub struct CommandOutput {
    /// Full result envelope, used by the json/table/minimal formats
    pub value: Value,
    /// Fixed-layout CSV export, when the command has one
    pub csv: Option<String>,
}
