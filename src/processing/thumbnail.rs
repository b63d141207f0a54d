//! Removal of embedded EXIF thumbnails.
//!
//! The EXIF codec is a pluggable collaborator: anything implementing
//! [`MetadataCodec`] can be handed to the optimizer as a
//! [`ThumbnailStripping`] capability. Without one, stripping thumbnails is
//! rejected up front.

use std::fmt::Display;

use tracing::{debug, warn};

use super::markers::EXIF_SIGNATURE;

/// Parses, edits and re-serializes EXIF tag structures.
pub trait MetadataCodec: Send + Sync {
    type Tags;
    type Error: Display;

    fn version(&self) -> &str;

    /// Reads the EXIF block of a complete JPEG stream.
    fn parse(&self, jpeg: &[u8]) -> Result<Self::Tags, Self::Error>;

    /// Drops the embedded thumbnail. Returns `false` if there was none.
    fn strip_thumbnail(&self, tags: &mut Self::Tags) -> bool;

    /// Serializes the tags as a TIFF structure, without the APP1 signature.
    fn serialize(&self, tags: &Self::Tags) -> Result<Vec<u8>, Self::Error>;
}

/// Object-safe view of a [`MetadataCodec`] used by the pipeline.
pub trait ThumbnailStripping: Send + Sync {
    fn version(&self) -> &str;

    /// A complete APP1 payload to use in place of the input's EXIF segment,
    /// or `None` when the input carries no thumbnail or cannot be parsed.
    fn replacement_exif(&self, jpeg: &[u8]) -> Option<Vec<u8>>;
}

impl<C: MetadataCodec> ThumbnailStripping for C {
    fn version(&self) -> &str {
        MetadataCodec::version(self)
    }

    fn replacement_exif(&self, jpeg: &[u8]) -> Option<Vec<u8>> {
        let mut tags = match self.parse(jpeg) {
            Ok(tags) => tags,
            Err(e) => {
                debug!("No usable EXIF data: {}", e);
                return None;
            }
        };
        if !self.strip_thumbnail(&mut tags) {
            debug!("EXIF data has no thumbnail");
            return None;
        }
        match self.serialize(&tags) {
            Ok(tiff) => {
                let mut payload = Vec::with_capacity(EXIF_SIGNATURE.len() + tiff.len());
                payload.extend_from_slice(EXIF_SIGNATURE);
                payload.extend_from_slice(&tiff);
                Some(payload)
            }
            Err(e) => {
                warn!("Re-serializing EXIF data failed, keeping original: {}", e);
                None
            }
        }
    }
}

#[cfg(feature = "exif")]
pub use kamadak::{ExifTags, KamadakExif};

#[cfg(feature = "exif")]
mod kamadak {
    use std::io::Cursor;

    use exif::experimental::Writer;
    use exif::{Exif, In, Reader, Tag};
    use tracing::debug;

    use super::MetadataCodec;

    /// [`MetadataCodec`] backed by the `kamadak-exif` crate.
    ///
    /// Serialization lays the TIFF structure out anew, so field data moves.
    /// Vendor maker notes often address their own data with offsets into
    /// that structure, so EXIF blocks carrying a `MakerNote` are left as
    /// they are and keep their thumbnail.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct KamadakExif;

    pub struct ExifTags {
        exif: Exif,
        keep_thumbnail: bool,
    }

    impl ExifTags {
        pub fn exif(&self) -> &Exif {
            &self.exif
        }

        pub fn has_thumbnail(&self) -> bool {
            self.keep_thumbnail && thumbnail(&self.exif).is_some()
        }
    }

    fn thumbnail(exif: &Exif) -> Option<&[u8]> {
        let offset = exif
            .get_field(Tag::JPEGInterchangeFormat, In::THUMBNAIL)?
            .value
            .get_uint(0)? as usize;
        let len = exif
            .get_field(Tag::JPEGInterchangeFormatLength, In::THUMBNAIL)?
            .value
            .get_uint(0)? as usize;
        exif.buf().get(offset..offset.checked_add(len)?)
    }

    impl MetadataCodec for KamadakExif {
        type Tags = ExifTags;
        type Error = exif::Error;

        fn version(&self) -> &str {
            "kamadak-exif 0.5"
        }

        fn parse(&self, jpeg: &[u8]) -> Result<ExifTags, exif::Error> {
            let exif = Reader::new().read_from_container(&mut Cursor::new(jpeg))?;
            Ok(ExifTags {
                exif,
                keep_thumbnail: true,
            })
        }

        fn strip_thumbnail(&self, tags: &mut ExifTags) -> bool {
            if tags.exif.get_field(Tag::MakerNote, In::PRIMARY).is_some() {
                debug!("EXIF data has a maker note, keeping thumbnail");
                return false;
            }
            let present = tags
                .exif
                .get_field(Tag::JPEGInterchangeFormat, In::THUMBNAIL)
                .is_some();
            if present {
                tags.keep_thumbnail = false;
            }
            present
        }

        fn serialize(&self, tags: &ExifTags) -> Result<Vec<u8>, exif::Error> {
            let mut writer = Writer::new();
            for field in tags.exif.fields() {
                if field.ifd_num == In::PRIMARY || tags.keep_thumbnail {
                    writer.push_field(field);
                }
            }
            if tags.keep_thumbnail {
                if let Some(jpeg) = thumbnail(&tags.exif) {
                    writer.set_jpeg(jpeg, In::THUMBNAIL);
                }
            }
            let mut out = Cursor::new(Vec::new());
            writer.write(&mut out, tags.exif.little_endian())?;
            Ok(out.into_inner())
        }
    }
}
