//! Integration tests for the input stream and `document.write()` insertion points.

use weir_input::{InputStream, TextPosition};

/// Stream holding `text` with the first `consumed` characters already consumed.
fn stream_with(text: &str, consumed: usize) -> InputStream {
    let mut stream = InputStream::new();
    stream.append_to_end(text);
    let _ = stream.current_mut().advance_by(consumed);
    stream
}

#[test]
fn test_append_without_insertion_point_feeds_current() {
    let mut stream = InputStream::new();
    stream.append_to_end("<p>");
    stream.append_to_end("hi");
    assert!(!stream.has_insertion_point());
    assert_eq!(stream.current().to_text(), "<p>hi");
}

#[test]
fn test_written_text_is_parsed_before_queued_input() {
    // "<script>w</script>" has been consumed; "<div>" is still queued.
    let mut stream = stream_with("<script>w</script><div>", 18);
    assert_eq!(stream.current().current_position(), TextPosition::new(0, 18));

    let record = stream.open_insertion_point();
    assert!(stream.has_insertion_point());
    assert_eq!(record.depth(), 1);
    assert_eq!(record.position(), TextPosition::new(0, 18));
    assert!(stream.current().is_empty());

    stream.insert_at_insertion_point("<p>");
    assert_eq!(stream.current().to_text(), "<p>");
    assert_eq!(stream.current_mut().advance_by(3), "<p>");
    assert_eq!(stream.current().current_position(), TextPosition::new(0, 21));

    stream.close_insertion_point(record);
    assert!(!stream.has_insertion_point());
    assert_eq!(stream.current().to_text(), "<div>");
    // The queued input keeps the position it had before the write.
    assert_eq!(stream.current().current_position(), TextPosition::new(0, 18));
}

#[test]
fn test_unconsumed_written_text_is_requeued_ahead_of_remainder() {
    let mut stream = stream_with("<script></script></div>", 17);
    let record = stream.open_insertion_point();
    stream.insert_at_insertion_point("<b");
    stream.close_insertion_point(record);
    assert_eq!(stream.current().to_text(), "<b</div>");
    // Two leftover characters precede the column the remainder started at.
    assert_eq!(stream.current().current_position(), TextPosition::new(0, 15));
    let _ = stream.current_mut().advance_by(2);
    assert_eq!(stream.current().current_position(), TextPosition::new(0, 17));
}

#[test]
fn test_written_newlines_do_not_shift_document_lines() {
    let mut stream = stream_with("a\nb\nc", 2);
    assert_eq!(stream.current().current_position(), TextPosition::new(1, 0));
    let record = stream.open_insertion_point();
    stream.insert_at_insertion_point("x\ny\n");
    let _ = stream.current_mut().advance_by(4);
    assert_eq!(stream.current().current_line(), 1);
    stream.close_insertion_point(record);
    assert_eq!(stream.current().current_position(), TextPosition::new(1, 0));
    let _ = stream.current_mut().advance_by(2);
    assert_eq!(stream.current().current_position(), TextPosition::new(2, 0));
}

#[test]
fn test_network_input_goes_to_tail_while_insertion_point_open() {
    let mut stream = stream_with("<script></script>rest", 17);
    let record = stream.open_insertion_point();
    stream.append_to_end("-tail");
    stream.insert_at_insertion_point("w");
    assert_eq!(stream.current().to_text(), "w");
    stream.close_insertion_point(record);
    assert_eq!(stream.current().to_text(), "wrest-tail");
}

#[test]
fn test_nested_insertion_points() {
    let mut stream = stream_with("<s></s>after", 7);
    let outer = stream.open_insertion_point();
    stream.insert_at_insertion_point("x");
    let inner = stream.open_insertion_point();
    assert_eq!(inner.depth(), 2);
    assert_eq!(stream.insertion_depth(), 2);
    stream.insert_at_insertion_point("y");
    assert_eq!(stream.current().to_text(), "y");
    stream.close_insertion_point(inner);
    assert_eq!(stream.current().to_text(), "yx");
    stream.close_insertion_point(outer);
    assert_eq!(stream.current().to_text(), "yxafter");
    assert_eq!(stream.insertion_depth(), 0);
}

#[test]
#[should_panic(expected = "insertion points must be closed innermost first")]
fn test_closing_outer_before_inner_panics() {
    let mut stream = stream_with("abc", 1);
    let outer = stream.open_insertion_point();
    let _inner = stream.open_insertion_point();
    stream.close_insertion_point(outer);
}

#[test]
fn test_end_of_file_marked_on_tail_while_insertion_point_open() {
    let mut stream = stream_with("ab", 1);
    let record = stream.open_insertion_point();
    stream.mark_end_of_file();
    assert!(stream.have_seen_end_of_file());
    assert!(!stream.current().is_closed());
    stream.insert_at_insertion_point("w");
    stream.close_insertion_point(record);
    assert!(stream.current().is_closed());
    assert_eq!(stream.current_mut().advance_by(2), "wb");
    assert!(stream.current().at_end_of_file());
}

#[test]
fn test_end_of_file_without_insertion_point() {
    let mut stream = InputStream::new();
    assert!(!stream.have_seen_end_of_file());
    stream.append_to_end("z");
    stream.mark_end_of_file();
    assert!(stream.have_seen_end_of_file());
    assert!(stream.current().is_closed());
}

#[test]
fn test_scoped_insertion_point_closes_on_drop() {
    let mut stream = stream_with("<script></script>!", 17);
    {
        let mut point = stream.insertion_point();
        assert!(point.has_insertion_point());
        point.insert_at_insertion_point("hello ");
    }
    assert!(!stream.has_insertion_point());
    assert_eq!(stream.current().to_text(), "hello !");
}

#[test]
#[should_panic(expected = "SegmentedBuffer closed twice")]
fn test_end_of_file_marked_twice_panics() {
    let mut stream = InputStream::new();
    stream.append_to_end("<p>");
    stream.mark_end_of_file();
    stream.mark_end_of_file();
}

#[test]
#[should_panic(expected = "SegmentedBuffer closed twice")]
fn test_end_of_file_marked_twice_across_insertion_point_panics() {
    let mut stream = stream_with("<script></script><p>", 17);
    stream.mark_end_of_file();
    let record = stream.open_insertion_point();
    stream.close_insertion_point(record);
    stream.mark_end_of_file();
}
