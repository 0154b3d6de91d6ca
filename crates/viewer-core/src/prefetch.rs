/// Order in which pages around `current` get rendered after a viewport
/// change.
///
/// The current page comes first, then every following page that is still
/// visible, then `look_ahead` pages past the visible edge, then up to
/// `look_behind` pages before the current one, nearest first.
pub fn render_ahead_order(
    current: usize,
    page_count: usize,
    is_visible: impl Fn(usize) -> bool,
    look_ahead: usize,
    look_behind: usize,
) -> Vec<usize> {
    if current >= page_count {
        return Vec::new();
    }

    let mut order = vec![current];

    let mut next = current + 1;
    while next < page_count && is_visible(next) {
        order.push(next);
        next += 1;
    }

    order.extend((next..page_count).take(look_ahead));
    order.extend((1..=look_behind).filter_map(|distance| current.checked_sub(distance)));

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_then_visible_then_ahead_then_behind() {
        let order = render_ahead_order(3, 10, |page| page <= 5, 1, 2);
        assert_eq!(order, vec![3, 4, 5, 6, 2, 1]);
    }

    #[test]
    fn stops_at_document_edges() {
        assert_eq!(render_ahead_order(0, 2, |_| true, 1, 2), vec![0, 1]);
        assert_eq!(render_ahead_order(1, 2, |_| false, 1, 2), vec![1, 0]);
        assert!(render_ahead_order(4, 2, |_| true, 1, 2).is_empty());
    }

    #[test]
    fn zero_windows_render_only_visible_pages() {
        assert_eq!(render_ahead_order(2, 5, |page| page == 3, 0, 0), vec![2, 3]);
    }
}
