//! Generation, storage and inspection of saturation ICC profiles.
//!
//! The crate wraps the external ICC toolchain behind typed errors and keeps
//! generated profiles in a timestamp-keyed directory so "the current profile"
//! is a well-defined query.
mod generate;
mod inspect;
mod profile;
mod store;
mod target;
mod tool;

pub use generate::{ArgyllGenerator, GenerateError, ProfileSource, DEFAULT_GENERATOR};
pub use inspect::{inspect_latest, InspectError, Inspection, DEFAULT_DUMP_TOOL, DEFAULT_INSPECT_LINES};
pub use profile::{
    profile_description, profile_timestamp, verify_icc, ColorProfile, ICC_HEADER_LEN,
    ICC_SIGNATURE,
};
pub use store::{
    ListingIter, ProfileListing, ProfileStore, StoreError, StoredProfile, PROFILE_EXTENSION,
    PROFILE_PREFIX,
};
pub use target::DEFAULT_GRID_STEPS;
pub use tool::{ToolCommand, ToolError, ToolOutput};

#[cfg(test)]
pub(crate) mod testing {
    use std::fs;
    use std::path::{Path, PathBuf};

    use crate::profile::{ICC_HEADER_LEN, ICC_SIGNATURE};

    /// Header-only profile that passes the well-formedness check.
    pub fn fake_icc_bytes() -> Vec<u8> {
        let mut bytes = vec![0u8; ICC_HEADER_LEN];
        bytes[0..4].copy_from_slice(&(ICC_HEADER_LEN as u32).to_be_bytes());
        bytes[36..40].copy_from_slice(ICC_SIGNATURE);
        bytes
    }

    #[cfg(unix)]
    pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Stand-in for `colprof` writing a minimal signed profile to the `-O` path.
    #[cfg(unix)]
    pub fn write_fake_colprof(dir: &Path) -> PathBuf {
        write_script(
            dir,
            "colprof",
            "while [ \"$1\" != \"-O\" ]; do shift; done\n\
             out=\"$2\"\n\
             head -c 36 /dev/zero > \"$out\"\n\
             printf 'acsp' >> \"$out\"\n\
             head -c 88 /dev/zero >> \"$out\"\n",
        )
    }
}
