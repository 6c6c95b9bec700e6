// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Creation and removal of per-connection interfaces

use crate::api::retval;
use crate::{ControlChannel, DataplaneError, InterfaceHandle, InterfaceKind, Request};
use std::sync::Arc;
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// Creates and deletes interfaces in the engine
#[derive(Clone)]
pub struct InterfaceManager {
    channel: Arc<dyn ControlChannel>,
}

impl InterfaceManager {
    #[must_use]
    pub fn new(channel: Arc<dyn ControlChannel>) -> Self {
        Self { channel }
    }

    /// Create an interface and return the handle the engine assigned to it
    pub async fn create_interface(
        &self,
        kind: InterfaceKind,
        name: &str,
    ) -> Result<InterfaceHandle, DataplaneError> {
        const OP: &str = "create_interface";
        let request = Request::CreateInterface {
            kind,
            name: name.to_owned(),
        };
        let reply = self
            .channel
            .invoke(request)
            .await
            .map_err(|source| DataplaneError::Transport {
                op: OP,
                arg: name.to_owned(),
                source,
            })?;
        if reply.retval != retval::OK {
            error!("Failed to create {kind} interface {name}: error code {}", reply.retval);
            return Err(DataplaneError::Retval {
                op: OP,
                arg: name.to_owned(),
                retval: reply.retval,
            });
        }
        if !reply.handle.is_valid() {
            return Err(DataplaneError::InvalidHandle(name.to_owned()));
        }
        debug!("Created {kind} interface {name} with handle {}", reply.handle);
        Ok(reply.handle)
    }

    /// Delete an interface. Deleting an interface that no longer exists succeeds.
    pub async fn delete_interface(&self, handle: InterfaceHandle) -> Result<(), DataplaneError> {
        const OP: &str = "delete_interface";
        let reply = self
            .channel
            .invoke(Request::DeleteInterface { handle })
            .await
            .map_err(|source| DataplaneError::Transport {
                op: OP,
                arg: handle.to_string(),
                source,
            })?;
        match reply.retval {
            retval::OK => {
                debug!("Deleted interface {handle}");
                Ok(())
            }
            retval::INVALID_SW_IF_INDEX => {
                debug!("Interface {handle} was already gone");
                Ok(())
            }
            retval => Err(DataplaneError::Retval {
                op: OP,
                arg: handle.to_string(),
                retval,
            }),
        }
    }
}
