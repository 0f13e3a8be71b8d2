// src/watch/hash.rs

use std::fmt;

use blake3::Hasher;

/// Content fingerprint of a manifest, used to skip reloads when an editor
/// touches the file without changing it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(contents: &str) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(contents.as_bytes());
        Fingerprint(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex()[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_same_fingerprint() {
        assert_eq!(Fingerprint::of("a = 1\n"), Fingerprint::of("a = 1\n"));
        assert_ne!(Fingerprint::of("a = 1\n"), Fingerprint::of("a = 2\n"));
        assert_eq!(Fingerprint::of("").to_hex().len(), 64);
    }
}
