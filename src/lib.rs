//! Fill missing IPTC headline and date fields in a photo archive from the
//! names of the directories the files live in.

pub mod args;
pub mod checkpoint;
pub mod exif;
pub mod label;
pub mod media;
pub mod merge;
pub mod metadata;
pub mod processor;
pub mod supervisor;
pub mod template;
