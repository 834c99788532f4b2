//! Identity matching against the enrolled gallery.

use crate::backend::{FaceEncoder, FaceEncoding, GalleryEntry};

/// Decide which enrolled identity, if any, a probe encoding belongs to.
///
/// The similarity decision is delegated to the encoder's comparator, which
/// yields one boolean verdict per gallery entry at its own fixed threshold;
/// there is no score to rank by, so the first entry flagged as a match
/// wins and enrollment order breaks ties. An empty gallery never matches.
///
/// Callers only invoke this once a probe encoding exists — a frame with
/// zero detected faces never reaches the matcher.
pub fn match_probe<'a>(
    encoder: &dyn FaceEncoder,
    gallery: &'a [GalleryEntry],
    probe: &FaceEncoding,
) -> Option<&'a str> {
    if gallery.is_empty() {
        return None;
    }

    let encodings: Vec<FaceEncoding> = gallery.iter().map(|e| e.encoding.clone()).collect();
    let verdicts = encoder.compare(&encodings, probe);

    gallery
        .iter()
        .zip(verdicts)
        .find(|(_, matched)| *matched)
        .map(|(entry, _)| entry.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FaceBox, Frame};

    /// Encoder double whose comparator flags gallery entries with the same
    /// leading value as the probe.
    struct LeadingValueEncoder;

    impl FaceEncoder for LeadingValueEncoder {
        fn locate(&mut self, _rgb: &Frame) -> Vec<FaceBox> {
            Vec::new()
        }

        fn encode(&mut self, _rgb: &Frame, _faces: &[FaceBox]) -> Vec<FaceEncoding> {
            Vec::new()
        }

        fn compare(&self, gallery: &[FaceEncoding], probe: &FaceEncoding) -> Vec<bool> {
            gallery
                .iter()
                .map(|g| g.values()[0] == probe.values()[0])
                .collect()
        }
    }

    fn entry(name: &str, leading: f32) -> GalleryEntry {
        GalleryEntry {
            name: name.to_string(),
            encoding: FaceEncoding::new(vec![leading, 0.0, 0.0]),
        }
    }

    #[test]
    fn test_empty_gallery_never_matches() {
        let probe = FaceEncoding::new(vec![1.0]);
        assert_eq!(match_probe(&LeadingValueEncoder, &[], &probe), None);
    }

    #[test]
    fn test_no_match_returns_none() {
        let gallery = [entry("alice", 1.0), entry("bob", 2.0)];
        let probe = FaceEncoding::new(vec![9.0, 0.0, 0.0]);
        assert_eq!(match_probe(&LeadingValueEncoder, &gallery, &probe), None);
    }

    #[test]
    fn test_matches_by_name() {
        let gallery = [entry("alice", 1.0), entry("bob", 2.0)];
        let probe = FaceEncoding::new(vec![2.0, 0.0, 0.0]);
        assert_eq!(
            match_probe(&LeadingValueEncoder, &gallery, &probe),
            Some("bob")
        );
    }

    #[test]
    fn test_first_match_wins() {
        // Two entries both satisfy the comparator: the lower index wins
        let gallery = [
            entry("alice", 1.0),
            entry("alice-again", 1.0),
            entry("bob", 2.0),
        ];
        let probe = FaceEncoding::new(vec![1.0, 0.0, 0.0]);
        assert_eq!(
            match_probe(&LeadingValueEncoder, &gallery, &probe),
            Some("alice")
        );
    }
}
