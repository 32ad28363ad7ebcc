//! File encoding modules.

pub mod file_encoder;
pub mod media_type;

pub use file_encoder::{
    EncodedFile, FileEncoder, FileReader, FileRef, FsFileReader, ReadFuture, SharedEncode,
    UNTITLED_FILE_NAME,
};
pub use media_type::{DEFAULT_MEDIA_TYPE, media_type_for};
