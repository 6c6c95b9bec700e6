// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Rendezvous for interface handles. The stage that creates the interface of a side stores
//! its handle in the connection's metadata scope; stages further down load it. Values are
//! not checked here.

use crate::NatError;
use chain::Context;
use chain::metadata::Side;
use dplane::InterfaceHandle;

/// Publish the interface handle of a side for the connection of `ctx`
pub fn store(ctx: &Context, side: Side, handle: InterfaceHandle) -> Result<(), NatError> {
    let metadata = ctx
        .metadata()
        .ok_or(NatError::NoMetadata(side))?;
    metadata.side(side).store(handle);
    Ok(())
}

/// The interface handle of a side, if one was published for the connection of `ctx`
#[must_use]
pub fn load(ctx: &Context, side: Side) -> Option<InterfaceHandle> {
    ctx.metadata()
        .and_then(|metadata| metadata.side(side).load::<InterfaceHandle>())
}

/// Forget the interface handle of a side, returning it if there was one
pub fn delete(ctx: &Context, side: Side) -> Option<InterfaceHandle> {
    ctx.metadata()
        .and_then(|metadata| metadata.side(side).delete::<InterfaceHandle>())
}
