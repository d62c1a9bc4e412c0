pub mod decay;
pub mod evaluate;
pub mod history;
pub mod init;
pub mod recover;
pub mod rules;
pub mod run;
pub mod score;
pub mod verify;

use credo_core::Did;

/// Parse a DID argument, rejecting malformed identifiers up front.
pub fn parse_did(raw: &str) -> anyhow::Result<Did> {
    Ok(Did::parse(raw)?)
}
