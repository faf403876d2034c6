//! Wire formats built and parsed by hand on top of `pnet` packet types.

pub mod icmp;
