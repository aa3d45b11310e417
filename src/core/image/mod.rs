mod augment;
mod codec;

pub use augment::AugmentParams;
pub use codec::{decode_checked, encode_canonical, extension_of, has_extension, ImageOpError};
