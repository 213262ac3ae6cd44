//! Splitting story content into display pages.

/// Separator between paragraphs, and therefore between pages.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Split content into pages on blank-line boundaries.
///
/// Pages are trimmed and empty pages are dropped.
pub fn split_into_pages(content: &str) -> Vec<String> {
    content
        .split(PAGE_SEPARATOR)
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join edited pages back into story content.
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}

/// Replace one page and return the rejoined content.
///
/// Returns `None` when `index` is out of range.
pub fn replace_page(content: &str, index: usize, text: &str) -> Option<String> {
    let mut pages = split_into_pages(content);
    let page = pages.get_mut(index)?;
    *page = text.trim().to_string();
    Some(join_pages(&pages))
}
