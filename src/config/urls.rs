//! Koji service URLs

/// Fedora Koji hub (XML-RPC endpoint used by the koji CLI)
pub const KOJI_HUB: &str = "https://koji.fedoraproject.org/kojihub";

/// Fedora Koji package download root
pub const KOJI_TOPDIR: &str = "https://kojipkgs.fedoraproject.org";
