use std::time::Duration;

use tracing::debug;

use crate::{Error, Result};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Try to open every serial port of the system at `baud`.
pub fn probe_ports(baud: u32) -> Result<Vec<(String, Result<()>)>> {
    let ports = tokio_serial::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|info| {
            let opened = tokio_serial::new(&info.port_name, baud)
                .timeout(PROBE_TIMEOUT)
                .open()
                .map(|_| ())
                .map_err(Error::from);
            debug!("probing {}: {:?}", info.port_name, opened);
            (info.port_name, opened)
        })
        .collect())
}

/// The first serial port that opens at `baud`.
pub fn find_port(baud: u32) -> Result<String> {
    probe_ports(baud)?
        .into_iter()
        .find(|(_, opened)| opened.is_ok())
        .map(|(name, _)| name)
        .ok_or(Error::NoPortFound { baud })
}
