use sha2::{Digest, Sha256};

/// Derive the stable dedup identity for a feed entry.
///
/// The feed's native guid wins when present; otherwise the entry link is
/// used. The chosen string is hashed so identities are fixed-length and
/// comparable by equality regardless of how long or strange the upstream
/// guid is. Deterministic across processes and restarts.
///
/// An entry with neither guid nor link hashes the empty string, which
/// merges all such entries into one identity. That is an upstream feed
/// defect we do not try to correct.
pub fn identify(guid: Option<&str>, link: Option<&str>) -> String {
    let basis = match guid.map(str::trim) {
        Some(g) if !g.is_empty() => g,
        _ => link.map(str::trim).unwrap_or(""),
    };

    let hash = Sha256::digest(basis.as_bytes());
    format!("{:x}", hash)
}
