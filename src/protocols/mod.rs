// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Wire formats for the snooped control protocols
//!
//! - **IGMP v1/v2 (RFC 2236)**: queries and reports are matched against
//!   expectations; general queries and reports are also originated
//! - **PIM v2 (RFC 7761)**: only the Hello header is inspected
//!
//! All messages travel in 802.1Q-tagged Ethernet frames; `frame` builds them.
//!
//! | Packet Type | IP protocol | Destination |
//! |-------------|-------------|-------------|
//! | IGMP general query | 2 | 224.0.0.1 |
//! | IGMP report | 2 | the reported group |
//! | PIM Hello | 103 | 224.0.0.13 |

pub mod frame;
pub mod igmp;
pub mod pim;

/// IP protocol number for IGMP
pub const IPPROTO_IGMP: u8 = 2;
/// IP protocol number for PIM
pub const IPPROTO_PIM: u8 = 103;

/// Common trait for protocol packet builders
pub trait PacketBuilder {
    /// Build a packet for transmission
    fn build(&self) -> Vec<u8>;

    /// Calculate checksum for the packet
    fn calculate_checksum(&self, data: &[u8]) -> u16 {
        internet_checksum(data)
    }
}

/// RFC 1071 one's-complement sum of 16-bit words, before complementing
fn ones_complement_sum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum = sum.wrapping_add(u16::from_be_bytes([word[0], word[1]]) as u32);
    }
    if let [last] = chunks.remainder() {
        sum = sum.wrapping_add((*last as u32) << 8);
    }
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}

/// Checksum to store in a header whose checksum field is currently zero
pub fn internet_checksum(data: &[u8]) -> u16 {
    !ones_complement_sum(data)
}

/// A received message is intact when its sum, checksum included, folds to all-ones
pub fn checksum_valid(data: &[u8]) -> bool {
    ones_complement_sum(data) == 0xFFFF
}

/// Write `internet_checksum(data)` into `data[offset..offset + 2]`
pub(crate) fn fill_checksum(data: &mut [u8], offset: usize) {
    data[offset] = 0;
    data[offset + 1] = 0;
    let checksum = internet_checksum(data);
    data[offset..offset + 2].copy_from_slice(&checksum.to_be_bytes());
}
