//! Selection and ordering of the metadata segments copied to the output.

use crate::codec::{APP1, APP2, APP13, Marker, MarkerRetention};
use crate::core::StripFlags;

pub const EXIF_SIGNATURE: &[u8] = b"Exif\0\0";
pub const XMP_SIGNATURE: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
pub const ICC_SIGNATURE: &[u8] = b"ICC_PROFILE\0";
pub const IPTC_SIGNATURE: u8 = 0x1c;

/// Marker classes the decoder has to keep for the given flags.
pub fn retention_for(flags: StripFlags) -> MarkerRetention {
    let mut retention = MarkerRetention::NONE;
    if !flags.contains(StripFlags::STRIP_METADATA) {
        retention = retention.keep(APP1).keep(APP13);
    }
    if !flags.contains(StripFlags::STRIP_ICC) {
        retention = retention.keep(APP2);
    }
    retention
}

fn has_signature(payload: &[u8], signature: &[u8]) -> bool {
    payload.len() > signature.len() && payload.starts_with(signature)
}

pub fn is_exif(marker: &Marker) -> bool {
    marker.code == APP1 && has_signature(&marker.payload, EXIF_SIGNATURE)
}

/// Picks the markers to keep and stable-sorts them by code.
///
/// Once an ICC chunk has been kept, every later APP2 segment is treated as a
/// continuation chunk and kept as well.
pub fn filter_markers(markers: &[Marker], flags: StripFlags) -> Vec<&Marker> {
    let strip_metadata = flags.contains(StripFlags::STRIP_METADATA);
    let strip_icc = flags.contains(StripFlags::STRIP_ICC);
    let mut saw_icc = false;

    let mut retained: Vec<&Marker> = markers
        .iter()
        .filter(|marker| match marker.code {
            APP1 if !strip_metadata => {
                has_signature(&marker.payload, EXIF_SIGNATURE)
                    || has_signature(&marker.payload, XMP_SIGNATURE)
            }
            APP2 if !strip_icc => {
                if saw_icc || has_signature(&marker.payload, ICC_SIGNATURE) {
                    saw_icc = true;
                }
                saw_icc
            }
            APP13 if !strip_metadata => {
                marker.payload.len() > 1 && marker.payload[0] == IPTC_SIGNATURE
            }
            _ => false,
        })
        .collect();

    retained.sort_by_key(|marker| marker.code);
    retained
}
