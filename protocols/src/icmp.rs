//! ICMPv4 echo request/reply (RFC 792).

use anyhow::Context;
use pnet::packet::Packet;
use pnet::packet::icmp::{
    self, IcmpCode, IcmpPacket, IcmpTypes,
    echo_reply::EchoReplyPacket,
    echo_request::MutableEchoRequestPacket,
};

const ICMP_ECHO_HDR_LEN: usize = 8;

/// Identifier and sequence number carried by an echo reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EchoId {
    pub identifier: u16,
    pub sequence: u16,
}

pub fn create_echo_request(id: EchoId, payload: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut buffer: Vec<u8> = vec![0u8; ICMP_ECHO_HDR_LEN + payload.len()];
    {
        let mut echo = MutableEchoRequestPacket::new(&mut buffer)
            .context("creating echo request packet")?;
        echo.set_icmp_type(IcmpTypes::EchoRequest);
        echo.set_icmp_code(IcmpCode(0));
        echo.set_identifier(id.identifier);
        echo.set_sequence_number(id.sequence);
        echo.set_payload(payload);
        echo.set_checksum(0);
    }

    let checksum = {
        let icmp_pkt = IcmpPacket::new(&buffer).context("creating ICMP packet")?;
        icmp::checksum(&icmp_pkt)
    };
    let mut echo = MutableEchoRequestPacket::new(&mut buffer).context("creating echo request packet")?;
    echo.set_checksum(checksum);

    Ok(buffer)
}

/// Returns the echo id if `bytes` is a well-formed echo reply.
pub fn parse_echo_reply(bytes: &[u8]) -> Option<EchoId> {
    let icmp_pkt = IcmpPacket::new(bytes)?;
    if icmp_pkt.get_icmp_type() != IcmpTypes::EchoReply {
        return None;
    }
    if icmp::checksum(&icmp_pkt) != icmp_pkt.get_checksum() {
        return None;
    }

    let reply = EchoReplyPacket::new(icmp_pkt.packet())?;
    Some(EchoId {
        identifier: reply.get_identifier(),
        sequence: reply.get_sequence_number(),
    })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
