//! Peer lookup handler shared by every listener.

use std::fmt;
use std::sync::Arc;

use crate::lookup::device::{DeviceControl, DeviceError};
use crate::lookup::types::{LookupRequest, LookupResponse};

/// Answers lookups against the peer table of one device.
///
/// Holds no per-request state; one instance serves all listeners.
#[derive(Clone)]
pub struct LookupService {
    device: String,
    control: Arc<dyn DeviceControl>,
}

impl LookupService {
    pub fn new(device: impl Into<String>, control: Arc<dyn DeviceControl>) -> Self {
        Self {
            device: device.into(),
            control,
        }
    }

    /// Name of the device this service answers for.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Look up every requested peer.
    ///
    /// Unknown identifiers are answered with an empty [`PeerRecord`]
    /// rather than an error, so the response always has one entry per
    /// distinct requested identifier.
    ///
    /// [`PeerRecord`]: crate::lookup::PeerRecord
    pub fn find(&self, request: &LookupRequest) -> Result<LookupResponse, DeviceError> {
        let table = self.control.device(&self.device)?;

        let mut response = LookupResponse::default();
        let mut hits = 0usize;
        for id in request {
            let record = match table.get(id) {
                Some(record) => {
                    hits += 1;
                    record.clone()
                }
                None => Default::default(),
            };
            response.peers.insert(*id, record);
        }

        tracing::debug!(
            device = %self.device,
            requested = request.len(),
            found = hits,
            "Lookup served"
        );

        Ok(response)
    }
}

impl fmt::Debug for LookupService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupService")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}
