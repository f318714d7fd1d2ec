//! Remote compiler cache (sccache) provisioning
//!
//! Resolution and installation of the shared compilation cache used by the
//! compile and verify stages. Unconfigured environments get a no-op
//! provisioner; a checksum mismatch on the downloaded tool aborts the run.

pub mod provisioner;
pub mod release;

pub use provisioner::{apply_present, Provisioner, SccacheConfig, WRAPPER_PATH};
pub use release::{Release, ReleaseAsset, ResolvedTool};
