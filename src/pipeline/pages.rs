//! Page counting over raw PDF bytes.
//!
//! Chrome writes each page dictionary uncompressed with `/Type /Page`, so a
//! byte scan is enough; no PDF parser is pulled in for one number. The page
//! tree root (`/Type /Pages`) is excluded by the word boundary.

use once_cell::sync::Lazy;
use regex::bytes::Regex;

static RE_PAGE_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)/Type\s*/Page\b").unwrap());

/// Number of page objects in `pdf`; at least 1.
pub fn count_pages(pdf: &[u8]) -> usize {
    RE_PAGE_OBJECT.find_iter(pdf).count().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_pages_not_page_tree() {
        let pdf = b"%PDF-1.4\n1 0 obj <</Type /Pages /Count 2>>\n2 0 obj <</Type /Page>>\n3 0 obj <</Type/Page /Parent 1 0 R>>\n%%EOF";
        assert_eq!(count_pages(pdf), 2);
    }

    #[test]
    fn test_no_markers_means_one_page() {
        assert_eq!(count_pages(b""), 1);
        assert_eq!(count_pages(b"%PDF-1.7 garbage \xff\xfe"), 1);
    }
}
