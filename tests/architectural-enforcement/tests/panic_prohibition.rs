//! Integration Test: Panic Prohibition
//!
//! **Policy**: Production code propagates errors with `?` or logs and
//! continues. It MUST NOT call `unwrap()` or `expect()`.
//! **Exceptions**: test code, `unwrap_or*` combinators

use architectural_enforcement::find_violations;

fn is_panicking_call(code: &str) -> bool {
    code.contains(".unwrap()") || code.contains(".expect(")
}

/// Test that production code does not unwrap
#[test]
fn test_no_unwrap_in_production_code() {
    let violations = find_violations(is_panicking_call);

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: unwrap()/expect() found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Return a Result, or log with tracing and continue.");

        panic!(
            "\nFound {} unwrap/expect violation(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_panicking_call_detection() {
    assert!(is_panicking_call("let x = y.unwrap();"));
    assert!(is_panicking_call("let x = y.expect(\"present\");"));
    assert!(!is_panicking_call("let x = y.unwrap_or_default();"));
    assert!(!is_panicking_call("let x = y.unwrap_or(0);"));
}
