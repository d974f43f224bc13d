use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_buffer_println_appends_newline() {
    let handler = BufferPrintHandler::new();
    handler.println("hello");
    assert_eq!(handler.get_output(), "hello\n");
}

#[test]
fn test_buffer_print_keeps_text_verbatim() {
    let handler = BufferPrintHandler::new();
    handler.print("x = ");
    handler.print("1");
    handler.println(";");
    assert_eq!(handler.get_output(), "x = 1;\n");
}

#[test]
fn test_buffer_clear() {
    let handler = buffer_handler();
    handler.println("hello");
    handler.clear();
    assert_eq!(handler.get_output(), "");
}

#[test]
fn test_stdout_captures_nothing() {
    let handler = stdout_handler();
    handler.clear();
    assert_eq!(handler.get_output(), "");
}

#[test]
fn test_silent_discards_output() {
    let handler = silent_handler();
    handler.println("hello");
    handler.print("world");
    assert_eq!(handler.get_output(), "");
}

#[test]
fn test_shared_handle_sees_same_buffer() {
    let handler = buffer_handler();
    let other = std::sync::Arc::clone(&handler);
    other.print("from a clone");
    assert_eq!(handler.get_output(), "from a clone");
}
