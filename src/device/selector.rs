use tracing::{debug, info};

use crate::bluetooth::Discovery;
use crate::error::ControlError;

/// Resolve the single device to command.
///
/// An explicit address wins without consulting discovery. Otherwise exactly
/// one eligible device must be connected; with several we refuse to guess.
pub async fn select_device<D: Discovery>(
    explicit: Option<&str>,
    discovery: &D,
) -> Result<String, ControlError> {
    if let Some(address) = explicit {
        info!("Using explicitly given device {}", address);
        return Ok(address.to_string());
    }

    let candidates = discovery.eligible_devices().await?;
    debug!("Eligible devices: {:?}", candidates);
    let address = choose(candidates)?;
    info!("Selected device {}", address);
    Ok(address)
}

fn choose(mut candidates: Vec<String>) -> Result<String, ControlError> {
    match candidates.len() {
        0 => Err(ControlError::NoEligibleDevice),
        1 => Ok(candidates.remove(0)),
        count => Err(ControlError::AmbiguousDevice { count }),
    }
}
