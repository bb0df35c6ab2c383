//! Source rules for duel-core

use architectural_enforcement::{assert_clean, core_src, scan};

#[test]
fn no_blocking_sleep_in_core() {
    let violations = scan(&core_src(), &["std::thread::sleep", "thread::sleep("]);
    assert_clean("blocking sleep", &violations);
}

#[test]
fn no_printing_in_core() {
    let violations = scan(&core_src(), &["println!", "eprintln!", "print!(", "dbg!("]);
    assert_clean("direct printing", &violations);
}

#[test]
fn no_unwrap_in_core() {
    let violations = scan(&core_src(), &[".unwrap()", ".expect("]);
    assert_clean("unwrap/expect outside tests", &violations);
}

#[test]
fn no_blocking_http_client() {
    let violations = scan(&core_src(), &["reqwest::blocking"]);
    assert_clean("blocking HTTP client", &violations);
}
