// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Wire format of control-plane messages. Requests and replies share the same framing:
//!    |length(4)|msg-id(2)|context(4)|payload(length)|
//! where the numbers indicate the number of octets. All integers are in network byte order.
//! The context of a reply is the one of the request it answers.
//!
//! Request payloads:
//!    interface feature: |is-add(1)|flags(1)|sw-if-index(4)|
//!    address range:     |is-add(1)|first(4)|last(4)|vrf-id(4)|
//!    port range:        |start(2)|end(2)|
//!    create interface:  |kind(1)|name-len(1)|name(name-len)|
//!    delete interface:  |sw-if-index(4)|
//!
//! Reply payload: |retval(4)|sw-if-index(4)|

use crate::api::{InterfaceKind, NatRole, Reply, Request, RequestKind};
use crate::{InterfaceHandle, TransportError};
use bytes::{Buf, BufMut, BytesMut};
use std::net::Ipv4Addr;

/// Upper bound on the payload of any message, to reject garbage early
pub(crate) const MAX_PAYLOAD: usize = 512;

const REPLY_PAYLOAD_LEN: usize = 8;

/// Header of a control-plane frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub len: u32,
    pub msg_id: u16,
    pub context: u32,
}

impl FrameHeader {
    pub const LEN: usize = 10;

    #[must_use]
    pub fn decode(buf: [u8; Self::LEN]) -> Self {
        let mut buf = &buf[..];
        Self {
            len: buf.get_u32(),
            msg_id: buf.get_u16(),
            context: buf.get_u32(),
        }
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_u32(self.len);
        out.put_u16(self.msg_id);
        out.put_u32(self.context);
    }

    /// Length of the payload that follows, rejecting oversized frames
    pub fn payload_len(&self) -> Result<usize, TransportError> {
        let len =
            usize::try_from(self.len).map_err(|_| TransportError::DecodeError("bad length"))?;
        if len > MAX_PAYLOAD {
            return Err(TransportError::DecodeError("frame too large"));
        }
        Ok(len)
    }
}

fn frame(msg_id: u16, context: u32, payload: &[u8]) -> Result<BytesMut, TransportError> {
    let len = u32::try_from(payload.len())
        .map_err(|_| TransportError::EncodeError("payload too large"))?;
    let mut out = BytesMut::with_capacity(FrameHeader::LEN + payload.len());
    FrameHeader {
        len,
        msg_id,
        context,
    }
    .encode(&mut out);
    out.extend_from_slice(payload);
    Ok(out)
}

/// Build the wire frame for a [`Request`]
pub fn encode_request(context: u32, request: &Request) -> Result<BytesMut, TransportError> {
    let mut payload = BytesMut::with_capacity(16);
    match request {
        Request::InterfaceFeature {
            is_add,
            handle,
            role,
        } => {
            payload.put_u8(u8::from(*is_add));
            payload.put_u8(role.flags());
            payload.put_u32(handle.index());
        }
        Request::AddressRange {
            is_add,
            first,
            last,
            vrf_id,
        } => {
            payload.put_u8(u8::from(*is_add));
            payload.put_slice(&first.octets());
            payload.put_slice(&last.octets());
            payload.put_u32(*vrf_id);
        }
        Request::PortRange { start, end } => {
            payload.put_u16(*start);
            payload.put_u16(*end);
        }
        Request::CreateInterface { kind, name } => {
            let len = u8::try_from(name.len())
                .map_err(|_| TransportError::EncodeError("interface name too long"))?;
            payload.put_u8(kind.code());
            payload.put_u8(len);
            payload.put_slice(name.as_bytes());
        }
        Request::DeleteInterface { handle } => payload.put_u32(handle.index()),
    }
    frame(request.kind().msg_id(), context, &payload)
}

fn need(buf: &[u8], len: usize) -> Result<(), TransportError> {
    if buf.len() < len {
        return Err(TransportError::DecodeError("truncated payload"));
    }
    Ok(())
}

fn get_ipv4(buf: &mut &[u8]) -> Ipv4Addr {
    let mut octets = [0u8; 4];
    buf.copy_to_slice(&mut octets);
    Ipv4Addr::from(octets)
}

/// Parse the payload of a request with the given message id
pub fn decode_request(msg_id: u16, payload: &[u8]) -> Result<Request, TransportError> {
    let kind = RequestKind::from_msg_id(msg_id)
        .ok_or(TransportError::DecodeError("unknown message id"))?;
    let mut buf = payload;
    let request = match kind {
        RequestKind::InterfaceFeature => {
            need(buf, 6)?;
            let is_add = buf.get_u8() != 0;
            let role = NatRole::from_flags(buf.get_u8())
                .ok_or(TransportError::DecodeError("bad NAT flags"))?;
            let handle = InterfaceHandle::new(buf.get_u32());
            Request::InterfaceFeature {
                is_add,
                handle,
                role,
            }
        }
        RequestKind::AddressRange => {
            need(buf, 13)?;
            let is_add = buf.get_u8() != 0;
            let first = get_ipv4(&mut buf);
            let last = get_ipv4(&mut buf);
            let vrf_id = buf.get_u32();
            Request::AddressRange {
                is_add,
                first,
                last,
                vrf_id,
            }
        }
        RequestKind::PortRange => {
            need(buf, 4)?;
            Request::PortRange {
                start: buf.get_u16(),
                end: buf.get_u16(),
            }
        }
        RequestKind::CreateInterface => {
            need(buf, 2)?;
            let kind = InterfaceKind::from_code(buf.get_u8())
                .ok_or(TransportError::DecodeError("bad interface kind"))?;
            let len = usize::from(buf.get_u8());
            need(buf, len)?;
            let name = std::str::from_utf8(&buf[..len])
                .map_err(|_| TransportError::DecodeError("interface name is not utf-8"))?
                .to_owned();
            buf.advance(len);
            Request::CreateInterface { kind, name }
        }
        RequestKind::DeleteInterface => {
            need(buf, 4)?;
            Request::DeleteInterface {
                handle: InterfaceHandle::new(buf.get_u32()),
            }
        }
    };
    if buf.has_remaining() {
        return Err(TransportError::DecodeError("trailing octets in payload"));
    }
    Ok(request)
}

/// Build the wire frame for a [`Reply`] to a request with the given message id and context
pub fn encode_reply(msg_id: u16, context: u32, reply: &Reply) -> Result<BytesMut, TransportError> {
    let mut payload = BytesMut::with_capacity(REPLY_PAYLOAD_LEN);
    payload.put_i32(reply.retval);
    payload.put_u32(reply.handle.index());
    frame(msg_id, context, &payload)
}

/// Parse the payload of a reply
pub fn decode_reply(payload: &[u8]) -> Result<Reply, TransportError> {
    if payload.len() != REPLY_PAYLOAD_LEN {
        return Err(TransportError::DecodeError("bad reply length"));
    }
    let mut buf = payload;
    Ok(Reply {
        retval: buf.get_i32(),
        handle: InterfaceHandle::new(buf.get_u32()),
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn split(frame: &BytesMut) -> (FrameHeader, &[u8]) {
        let mut head = [0u8; FrameHeader::LEN];
        head.copy_from_slice(&frame[..FrameHeader::LEN]);
        (FrameHeader::decode(head), &frame[FrameHeader::LEN..])
    }

    #[test]
    fn interface_feature_layout() {
        let request = Request::InterfaceFeature {
            is_add: true,
            handle: InterfaceHandle::new(7),
            role: NatRole::Outside,
        };
        let frame = encode_request(0x0102_0304, &request).unwrap();
        assert_eq!(
            &frame[..],
            &[0, 0, 0, 6, 0, 1, 1, 2, 3, 4, 1, 0x10, 0, 0, 0, 7][..]
        );
        let (header, payload) = split(&frame);
        assert_eq!(header.context, 0x0102_0304);
        assert_eq!(decode_request(header.msg_id, payload).unwrap(), request);
    }

    #[test]
    fn create_interface_carries_name() {
        let request = Request::CreateInterface {
            kind: InterfaceKind::Memif,
            name: "memif-c1".to_owned(),
        };
        let frame = encode_request(1, &request).unwrap();
        let (header, payload) = split(&frame);
        assert_eq!(header.payload_len().unwrap(), 10);
        assert_eq!(decode_request(header.msg_id, payload).unwrap(), request);

        let long = Request::CreateInterface {
            kind: InterfaceKind::Tap,
            name: "x".repeat(300),
        };
        assert!(matches!(
            encode_request(1, &long),
            Err(TransportError::EncodeError(_))
        ));
    }

    #[test]
    fn reply_layout() {
        let frame = encode_reply(4, 9, &Reply::created(InterfaceHandle::new(3))).unwrap();
        let (header, payload) = split(&frame);
        assert_eq!(header.msg_id, 4);
        assert_eq!(header.context, 9);
        assert_eq!(
            decode_reply(payload).unwrap(),
            Reply::created(InterfaceHandle::new(3))
        );

        let frame = encode_reply(1, 1, &Reply::with_retval(-17)).unwrap();
        let (_, payload) = split(&frame);
        assert_eq!(decode_reply(payload).unwrap().retval, -17);
    }

    #[test]
    fn reject_malformed_payloads() {
        assert!(decode_request(99, &[]).is_err());
        assert!(decode_request(RequestKind::PortRange.msg_id(), &[0, 1]).is_err());
        let bad_flags = [1, 0x33, 0, 0, 0, 1];
        assert!(decode_request(RequestKind::InterfaceFeature.msg_id(), &bad_flags).is_err());
        let trailing = [0, 0, 0, 1, 0];
        assert!(decode_request(RequestKind::DeleteInterface.msg_id(), &trailing).is_err());
        assert!(decode_reply(&[0, 0, 0]).is_err());

        let header = FrameHeader {
            len: 100_000,
            msg_id: 1,
            context: 0,
        };
        assert!(header.payload_len().is_err());
    }
}
